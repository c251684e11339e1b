use core::num::NonZeroU32;

pub use rand_core::RngCore;
use rand_core::{impls, Error};

use crate::device::Bcm2708Rng;
use crate::poll::{Poll, PollAbort, Spin};
use crate::window::RegisterWindow;

pub const ERROR_TIMED_OUT: NonZeroU32 = match NonZeroU32::new(Error::CUSTOM_START) {
  Some(code) => code,
  None => panic!(),
};

pub const ERROR_CANCELLED: NonZeroU32 = match NonZeroU32::new(Error::CUSTOM_START + 1) {
  Some(code) => code,
  None => panic!(),
};

impl From<PollAbort> for Error {
  fn from(abort: PollAbort) -> Self {
    match abort {
      PollAbort::TimedOut { .. } => Error::from(ERROR_TIMED_OUT),
      PollAbort::Cancelled { .. } => Error::from(ERROR_CANCELLED),
    }
  }
}

impl<W: RegisterWindow, P: Poll> Bcm2708Rng<W, P> {
  /// Fills `dest` with raw hardware output, one word per four bytes.
  ///
  /// Fails if the poll strategy gives up; `dest` may then be partly written.
  pub fn try_fill(&mut self, dest: &mut [u8]) -> Result<(), Error> {
    for chunk in dest.chunks_mut(4) {
      let word = self.read_word()?.to_le_bytes();
      chunk.copy_from_slice(&word[..chunk.len()]);
    }
    Ok(())
  }
}

/// Raw hardware output through the `rand` interfaces.
///
/// Only for the [`Spin`] strategy, which waits as long as it takes, so the
/// infallible methods never fail. Bounded strategies use
/// [`Bcm2708Rng::try_fill`].
impl<W: RegisterWindow> RngCore for Bcm2708Rng<W, Spin> {
  fn next_u32(&mut self) -> u32 {
    loop {
      // `Spin::idle` never fails
      if let Ok(word) = self.read_word() {
        return word;
      }
    }
  }

  fn next_u64(&mut self) -> u64 {
    impls::next_u64_via_u32(self)
  }

  fn fill_bytes(&mut self, dest: &mut [u8]) {
    for chunk in dest.chunks_mut(4) {
      let word = self.next_u32().to_le_bytes();
      chunk.copy_from_slice(&word[..chunk.len()]);
    }
  }

  fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
    self.fill_bytes(dest);
    Ok(())
  }
}
