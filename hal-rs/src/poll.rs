use core::fmt;
use core::hint;

/// Why a wait for the FIFO was given up.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PollAbort {
  TimedOut { polls: u64 },
  Cancelled { polls: u64 },
}

impl PollAbort {
  #[must_use]
  pub const fn polls(self) -> u64 {
    match self {
      PollAbort::TimedOut { polls } | PollAbort::Cancelled { polls } => polls,
    }
  }
}

impl fmt::Display for PollAbort {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PollAbort::TimedOut { polls } => write!(f, "rng not ready after {} status polls", polls),
      PollAbort::Cancelled { polls } => write!(f, "rng read cancelled after {} status polls", polls),
    }
  }
}

impl core::error::Error for PollAbort {}

/// How a read waits while STATUS reports an empty FIFO.
pub trait Poll {
  /// Called once before the first STATUS read of every wait.
  fn start(&mut self) {}

  /// Called after each STATUS read that found no word. `polls` counts the
  /// STATUS reads of the current wait so far.
  fn idle(&mut self, polls: u64) -> Result<(), PollAbort>;
}

/// Busy-waits until the hardware is ready, however long that takes.
#[derive(Debug, Default, Copy, Clone)]
pub struct Spin;

impl Poll for Spin {
  #[inline]
  fn idle(&mut self, _polls: u64) -> Result<(), PollAbort> {
    hint::spin_loop();
    Ok(())
  }
}

/// Spins, but gives up after a fixed number of STATUS reads.
#[derive(Debug, Copy, Clone)]
pub struct Bounded {
  max_polls: u64,
}

impl Bounded {
  #[must_use]
  pub const fn new(max_polls: u64) -> Self {
    Self { max_polls }
  }
}

impl Poll for Bounded {
  fn idle(&mut self, polls: u64) -> Result<(), PollAbort> {
    if polls >= self.max_polls {
      return Err(PollAbort::TimedOut { polls });
    }
    hint::spin_loop();
    Ok(())
  }
}
