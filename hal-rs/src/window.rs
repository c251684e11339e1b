use core::fmt;
use core::ptr::{self, NonNull};

use tracing::{debug, error};

use crate::host::IoMemory;

/// A mapped block of 32-bit device registers.
///
/// Offsets are byte offsets from the start of the window and must be 4-byte
/// aligned and inside [`RegisterWindow::span`]. Accesses go through `&self`,
/// the same way a device pointer is shared between a driver's callbacks.
pub trait RegisterWindow {
  /// Physical address the window was mapped from.
  fn base(&self) -> u64;

  /// Size of the window in bytes.
  fn span(&self) -> usize;

  fn read32(&self, offset: usize) -> u32;

  fn write32(&self, offset: usize, value: u32);
}

#[inline]
fn check_access(offset: usize, span: usize) {
  assert!(
    offset % 4 == 0 && offset + 4 <= span,
    "register access at {offset:#x} outside of {span:#x}-byte window"
  );
}

/// Register window backed by real device memory.
#[derive(Debug, Clone)]
pub struct Mmio {
  base: u64,
  address: NonNull<u8>,
  span: usize,
}

impl Mmio {
  /// Wraps `span` bytes of device memory starting at `address`.
  ///
  /// # Safety
  /// `address` must point to device registers mapped for `span` bytes, and the
  /// mapping must outlive this window and every clone of it.
  pub unsafe fn new(base: u64, address: *mut u8, span: usize) -> Option<Self> {
    NonNull::new(address).map(|address| Self { base, address, span })
  }

  #[inline]
  fn register(&self, offset: usize) -> *mut u32 {
    check_access(offset, self.span);
    // SAFETY: `offset` was checked against the mapped span above.
    unsafe { self.address.as_ptr().add(offset).cast::<u32>() }
  }
}

impl RegisterWindow for Mmio {
  fn base(&self) -> u64 {
    self.base
  }

  fn span(&self) -> usize {
    self.span
  }

  fn read32(&self, offset: usize) -> u32 {
    // SAFETY: the pointer is inside the window, which `Mmio::new` requires to be mapped.
    unsafe { ptr::read_volatile(self.register(offset)) }
  }

  fn write32(&self, offset: usize, value: u32) {
    // SAFETY: the pointer is inside the window, which `Mmio::new` requires to be mapped.
    unsafe { ptr::write_volatile(self.register(offset), value) }
  }
}

// SAFETY: the window is a plain device address; the registers themselves are
// only touched through volatile accesses serialized by the host.
unsafe impl Send for Mmio {}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MapError {
  NullAddress,
  /// The region is empty, wraps around the address space or is not addressable.
  InvalidRange { phys: u64, len: usize },
  Busy { base: u64 },
}

impl fmt::Display for MapError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MapError::NullAddress => write!(f, "cannot map physical address 0"),
      MapError::InvalidRange { phys, len } => write!(f, "cannot map {:#x}+{:#x}", phys, len),
      MapError::Busy { base } => write!(f, "region {:#x} is already mapped", base),
    }
  }
}

impl core::error::Error for MapError {}

/// I/O memory for systems where peripherals sit at their physical address.
///
/// Only one region can be claimed at a time.
#[derive(Debug)]
pub struct IdentityMap {
  claimed: Option<(u64, usize)>,
}

impl IdentityMap {
  /// # Safety
  /// Physical addresses handed to [`IoMemory::ioremap`] must be directly
  /// addressable device memory for the whole time they stay mapped.
  pub const unsafe fn new() -> Self {
    Self { claimed: None }
  }
}

impl IoMemory for IdentityMap {
  type Window = Mmio;
  type Error = MapError;

  fn ioremap(&mut self, phys: u64, len: usize) -> Result<Mmio, MapError> {
    let invalid = MapError::InvalidRange { phys, len };
    let end = phys.checked_add(len as u64).filter(|_| len != 0).ok_or(invalid)?;
    let address = usize::try_from(phys).map_err(|_| invalid)?;
    usize::try_from(end).map_err(|_| invalid)?;

    if let Some((base, span)) = self.claimed {
      // claimed ranges were checked when they were mapped
      if phys < base + span as u64 && base < end {
        return Err(MapError::Busy { base });
      }
    }

    // SAFETY: `IdentityMap::new` requires physical addresses to be usable as is.
    let window = unsafe { Mmio::new(phys, address as *mut u8, len) }.ok_or(MapError::NullAddress)?;
    self.claimed = Some((phys, len));
    debug!("identity mapped {:#x}+{:#x}", phys, len);
    Ok(window)
  }

  fn iounmap(&mut self, window: Mmio) {
    match self.claimed {
      Some((base, _)) if base == window.base() => self.claimed = None,
      _ => error!("unmapping {:#x} which is not mapped", window.base()),
    }
  }
}
