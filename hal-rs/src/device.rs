use bcmrng_hal_types::{available_words, RNG_DATA, RNG_NAME, RNG_STATUS};
use tracing::trace;

use crate::host::HwRng;
use crate::poll::{Poll, PollAbort, Spin};
use crate::window::RegisterWindow;

/// The BCM2708 RNG as an hwrng provider.
///
/// The device does not enable the hardware itself; it expects the window to
/// belong to an initialized [`crate::RngModule`].
#[derive(Debug)]
pub struct Bcm2708Rng<W, P = Spin> {
  window: W,
  poll: P,
  name: &'static str,
  quality: u16,
}

impl<W: RegisterWindow, P: Poll> Bcm2708Rng<W, P> {
  pub fn new(window: W, poll: P) -> Self {
    Self {
      window,
      poll,
      name: RNG_NAME,
      quality: 0,
    }
  }

  #[must_use]
  pub fn with_name(mut self, name: &'static str) -> Self {
    self.name = name;
    self
  }

  #[must_use]
  pub fn with_quality(mut self, quality: u16) -> Self {
    self.quality = quality;
    self
  }

  pub fn window(&self) -> &W {
    &self.window
  }

  pub fn poll_mut(&mut self) -> &mut P {
    &mut self.poll
  }

  /// Words currently waiting in the FIFO. Costs one STATUS read.
  pub fn available_words(&self) -> u32 {
    available_words(self.window.read32(RNG_STATUS))
  }

  /// Waits for the FIFO to hold a word, then reads it from DATA.
  ///
  /// STATUS is read until its top byte is nonzero; DATA is read exactly once
  /// afterwards. With the default [`Spin`] strategy this never returns an
  /// error and never gives up.
  pub fn read_word(&mut self) -> Result<u32, PollAbort> {
    self.poll.start();

    let mut polls = 0u64;
    loop {
      let status = self.window.read32(RNG_STATUS);
      polls += 1;
      if available_words(status) != 0 {
        break;
      }
      self.poll.idle(polls)?;
    }

    let word = self.window.read32(RNG_DATA);
    trace!(polls, "rng word ready");
    Ok(word)
  }

  /// [`Bcm2708Rng::read_word`] as the 4 bytes handed to the registry.
  pub fn read_word_bytes(&mut self) -> Result<[u8; 4], PollAbort> {
    self.read_word().map(u32::to_le_bytes)
  }
}

impl<W: RegisterWindow, P: Poll> HwRng for Bcm2708Rng<W, P> {
  fn name(&self) -> &str {
    self.name
  }

  fn quality(&self) -> u16 {
    self.quality
  }

  fn data_present(&mut self) -> bool {
    self.available_words() != 0
  }

  fn data_read(&mut self) -> Result<u32, PollAbort> {
    self.read_word()
  }
}
