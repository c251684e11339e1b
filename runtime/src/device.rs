use std::collections::VecDeque;

use bcmrng_hal_types::{Register, RNG_RBG2X, RNG_RBGEN, RNG_SIZE, STATUS_THRESHOLD_MASK, STATUS_WORDS_SHIFT};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, trace};

use crate::exception::Exception;

/// Words the simulated FIFO can hold.
pub const FIFO_DEPTH: usize = 4;

/// Words generated per STATUS read in normal mode.
pub const DEFAULT_RATE: u32 = 0x1000;

/// Most recent accesses kept in the access log.
pub const ACCESS_LOG_LIMIT: usize = 4096;

/// A device reachable through the simulated I/O memory space.
///
/// Offsets are relative to the start of the device, sizes are in bits.
pub trait MmioDevice {
  fn load(&mut self, offset: u64, size: u64) -> Result<u64, Exception>;
  fn store(&mut self, offset: u64, size: u64, value: u64) -> Result<(), Exception>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Access {
  Load(Register, u32),
  Store(Register, u32),
}

/// User-space model of the BCM2708 RNG block.
///
/// Generation only advances when STATUS is read: every read while enabled
/// produces `rate` words (twice as many with RBG2X). The first `threshold`
/// words after enabling are thrown away, the rest fill the FIFO. The words
/// come from a seeded [`StdRng`], so runs are reproducible.
pub struct SimulatedRng {
  ctrl: u32,
  threshold: u32,
  ff_threshold: u32,
  warmup_remaining: u32,
  fifo: VecDeque<u32>,
  rate: u32,
  rng: StdRng,
  discarded: u64,
  log: VecDeque<Access>,
}

impl SimulatedRng {
  pub fn new(seed: u64) -> Self {
    Self::with_rng(StdRng::seed_from_u64(seed))
  }

  pub fn from_entropy() -> Self {
    Self::with_rng(StdRng::from_entropy())
  }

  fn with_rng(rng: StdRng) -> Self {
    Self {
      ctrl: 0,
      threshold: 0,
      ff_threshold: 0,
      warmup_remaining: 0,
      fifo: VecDeque::with_capacity(FIFO_DEPTH),
      rate: DEFAULT_RATE,
      rng,
      discarded: 0,
      log: VecDeque::new(),
    }
  }

  #[must_use]
  pub fn with_rate(mut self, rate: u32) -> Self {
    self.rate = rate.max(1);
    self
  }

  pub fn is_enabled(&self) -> bool {
    self.ctrl & RNG_RBGEN != 0
  }

  pub fn ctrl(&self) -> u32 {
    self.ctrl
  }

  pub fn threshold(&self) -> u32 {
    self.threshold
  }

  pub fn fifo_len(&self) -> usize {
    self.fifo.len()
  }

  /// Words thrown away during warm-up since the device was created.
  pub fn discarded(&self) -> u64 {
    self.discarded
  }

  pub fn accesses(&self) -> Vec<Access> {
    self.log.iter().copied().collect()
  }

  pub fn clear_accesses(&mut self) {
    self.log.clear();
  }

  pub fn stores(&self) -> Vec<(Register, u32)> {
    self
      .log
      .iter()
      .filter_map(|access| match access {
        Access::Store(register, value) => Some((*register, *value)),
        Access::Load(..) => None,
      })
      .collect()
  }

  fn record(&mut self, access: Access) {
    if self.log.len() == ACCESS_LOG_LIMIT {
      self.log.pop_front();
    }
    self.log.push_back(access);
  }

  fn tick(&mut self) {
    if !self.is_enabled() {
      return;
    }

    let mut words = if self.ctrl & RNG_RBG2X != 0 { self.rate.saturating_mul(2) } else { self.rate };

    let skipped = words.min(self.warmup_remaining);
    self.warmup_remaining -= skipped;
    self.discarded += skipped as u64;
    words -= skipped;
    if skipped > 0 && self.warmup_remaining == 0 {
      debug!("warm-up done after {} words", self.discarded);
    }

    let free = (FIFO_DEPTH - self.fifo.len()) as u32;
    for _ in 0..words.min(free) {
      self.fifo.push_back(self.rng.next_u32());
    }
  }

  fn status(&self) -> u32 {
    ((self.fifo.len() as u32) << STATUS_WORDS_SHIFT) | (self.threshold & STATUS_THRESHOLD_MASK)
  }

  fn write_ctrl(&mut self, value: u32) {
    let was_enabled = self.is_enabled();
    self.ctrl = value;
    if !self.is_enabled() {
      self.fifo.clear();
      self.warmup_remaining = 0;
    } else if !was_enabled {
      self.warmup_remaining = self.threshold;
      debug!("rng enabled, discarding {} words", self.threshold);
    }
  }

  fn register(offset: u64, size: u64, load: bool) -> Result<Register, Exception> {
    if size != 32 || offset % 4 != 0 {
      return Err(if load { Exception::LoadAccessMisaligned(offset) } else { Exception::StoreAddrMisaligned(offset) });
    }
    let register = usize::try_from(offset).ok().filter(|offset| *offset < RNG_SIZE).and_then(Register::from_offset);
    register.ok_or(if load { Exception::LoadAccessFault(offset) } else { Exception::StoreAccessFault(offset) })
  }
}

impl MmioDevice for SimulatedRng {
  fn load(&mut self, offset: u64, size: u64) -> Result<u64, Exception> {
    let register = Self::register(offset, size, true)?;
    let value = match register {
      Register::Ctrl => self.ctrl,
      Register::Status => {
        self.tick();
        self.status()
      }
      Register::Data => self.fifo.pop_front().unwrap_or(0),
      Register::FfThreshold => self.ff_threshold,
    };
    trace!("rng load {}", register);
    self.record(Access::Load(register, value));
    Ok(value as u64)
  }

  fn store(&mut self, offset: u64, size: u64, value: u64) -> Result<(), Exception> {
    let register = Self::register(offset, size, false)?;
    let value = value as u32;
    match register {
      Register::Ctrl => self.write_ctrl(value),
      Register::Status => self.threshold = value & STATUS_THRESHOLD_MASK,
      Register::Data => return Err(Exception::StoreAccessFault(offset)),
      Register::FfThreshold => self.ff_threshold = value,
    }
    trace!("rng store {} = {:#x}", register, value);
    self.record(Access::Store(register, value));
    Ok(())
  }
}
