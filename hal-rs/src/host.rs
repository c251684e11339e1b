//! Facilities the shim borrows from whatever hosts it.

use core::fmt;

use crate::poll::PollAbort;
use crate::window::RegisterWindow;

/// Maps physical register ranges into windows the driver can access.
pub trait IoMemory {
  type Window: RegisterWindow;
  type Error: fmt::Debug + fmt::Display;

  fn ioremap(&mut self, phys: u64, len: usize) -> Result<Self::Window, Self::Error>;

  /// Releases a window obtained from [`IoMemory::ioremap`]. No register
  /// access through any copy of the window is allowed afterwards.
  fn iounmap(&mut self, window: Self::Window);
}

/// A source of hardware random words, as seen by the hwrng registry.
pub trait HwRng {
  fn name(&self) -> &str;

  /// Estimated entropy per 1024 bits of output. 0 means unknown.
  fn quality(&self) -> u16 {
    0
  }

  /// Whether a word can be read without waiting.
  fn data_present(&mut self) -> bool {
    true
  }

  /// Reads exactly one 32-bit word, waiting for the hardware if needed.
  fn data_read(&mut self) -> Result<u32, PollAbort>;

  /// Fills `buf` with whole words and returns the number of bytes written.
  ///
  /// Trailing bytes that do not make up a full word are left untouched. With
  /// `wait == false` reading stops as soon as no word is ready.
  fn read(&mut self, buf: &mut [u8], wait: bool) -> Result<usize, PollAbort> {
    let mut filled = 0;
    for chunk in buf.chunks_exact_mut(4) {
      if !wait && !self.data_present() {
        break;
      }

      match self.data_read() {
        Ok(word) => chunk.copy_from_slice(&word.to_le_bytes()),
        Err(abort) if filled == 0 => return Err(abort),
        Err(_) => break,
      }
      filled += 4;
    }
    Ok(filled)
  }
}

/// The host's collection of hardware random number providers.
pub trait RngRegistry {
  type Provider: HwRng;
  type Error: fmt::Debug + fmt::Display;

  /// Takes ownership of `provider`. On error the provider is dropped.
  fn register(&mut self, provider: Self::Provider) -> Result<(), Self::Error>;

  fn unregister(&mut self, name: &str) -> Option<Self::Provider>;
}
