use bcmrng_hal::PollAbort;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IoMemError {
  #[error("cannot map an empty region at {0:#x}")]
  Empty(u64),
  #[error("no device at {0:#x}")]
  NoDevice(u64),
  #[error("{phys:#x}+{len:#x} runs past the device ending at {end:#x}")]
  OutOfRange { phys: u64, len: usize, end: u64 },
  #[error("region {0:#x} is already mapped")]
  Busy(u64),
  #[error("cannot attach a device at {base:#x}+{size:#x}")]
  BadRange { base: u64, size: u64 },
  #[error("{0:#x}..={1:#x} overlaps an attached device")]
  Overlap(u64, u64),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
  #[error("hwrng {0} is already registered")]
  AlreadyRegistered(String),
  #[error("registry is full ({0} providers)")]
  Full(usize),
  #[error("registration rejected")]
  Rejected,
  #[error("no hwrng named {0}")]
  NotFound(String),
  #[error("no hwrng registered")]
  NoProvider,
  #[error(transparent)]
  Poll(#[from] PollAbort),
}
