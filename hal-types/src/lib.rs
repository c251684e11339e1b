#![no_std]

use core::fmt;

pub mod regs;

pub use regs::*;

/// BCM2708 peripheral window as seen from the ARM core.
pub const PERIPHERAL_BASE: u64 = 0x2000_0000;
pub const RNG_BASE: u64 = PERIPHERAL_BASE + 0x0010_4000;
pub const RNG_SIZE: usize = 0x10;
pub const RNG_END: u64 = RNG_BASE + RNG_SIZE as u64 - 1;

pub const RNG_NAME: &str = "bcm2708";

/// The initial numbers generated are "less random" so will be discarded.
pub const RNG_WARMUP_COUNT: u32 = 0x40000;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Register {
  Ctrl,
  Status,
  Data,
  FfThreshold,
}

impl Register {
  pub const ALL: [Register; 4] = [Register::Ctrl, Register::Status, Register::Data, Register::FfThreshold];

  #[must_use]
  pub const fn offset(self) -> usize {
    use Register::*;
    match self {
      Ctrl => RNG_CTRL,
      Status => RNG_STATUS,
      Data => RNG_DATA,
      FfThreshold => RNG_FF_THRESHOLD,
    }
  }

  #[must_use]
  pub const fn from_offset(offset: usize) -> Option<Register> {
    use Register::*;
    match offset {
      RNG_CTRL => Some(Ctrl),
      RNG_STATUS => Some(Status),
      RNG_DATA => Some(Data),
      RNG_FF_THRESHOLD => Some(FfThreshold),
      _ => None,
    }
  }

  #[must_use]
  pub const fn name(self) -> &'static str {
    use Register::*;
    match self {
      Ctrl => "CTRL",
      Status => "STATUS",
      Data => "DATA",
      FfThreshold => "FF_THRESHOLD",
    }
  }
}

impl fmt::Display for Register {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}({:#x})", self.name(), self.offset())
  }
}

/// Number of words waiting in the FIFO, as reported by a STATUS read.
#[inline]
#[must_use]
pub const fn available_words(status: u32) -> u32 {
  status >> STATUS_WORDS_SHIFT
}
