use std::hint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bcmrng_hal::{Poll, PollAbort};
use minstant::Instant;
use tracing::warn;

/// Shared flag that makes pending and future reads give up.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::Release);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Acquire)
  }
}

/// How long a read may wait for the hardware.
///
/// The default spins without a bound, exactly like the kernel driver.
#[derive(Debug, Clone, Default)]
pub struct PollOptions {
  /// Pause between STATUS reads. Zero means spin.
  pub interval: Duration,
  pub max_wait: Option<Duration>,
  pub cancel: Option<CancelToken>,
}

impl PollOptions {
  #[must_use]
  pub fn interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  #[must_use]
  pub fn max_wait(mut self, max_wait: Duration) -> Self {
    self.max_wait = Some(max_wait);
    self
  }

  #[must_use]
  pub fn cancel(mut self, token: CancelToken) -> Self {
    self.cancel = Some(token);
    self
  }
}

#[derive(Debug)]
pub struct TimedPoll {
  options: PollOptions,
  started: Option<Instant>,
}

impl TimedPoll {
  pub fn new(options: PollOptions) -> Self {
    Self { options, started: None }
  }

  pub fn options(&self) -> &PollOptions {
    &self.options
  }
}

impl Poll for TimedPoll {
  fn start(&mut self) {
    self.started = self.options.max_wait.map(|_| Instant::now());
  }

  fn idle(&mut self, polls: u64) -> Result<(), PollAbort> {
    if self.options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
      return Err(PollAbort::Cancelled { polls });
    }

    if let (Some(max_wait), Some(started)) = (self.options.max_wait, self.started) {
      if started.elapsed() >= max_wait {
        warn!("rng not ready after {:?} ({} polls)", max_wait, polls);
        return Err(PollAbort::TimedOut { polls });
      }
    }

    if self.options.interval.is_zero() {
      hint::spin_loop();
    } else {
      thread::sleep(self.options.interval);
    }
    Ok(())
  }
}
