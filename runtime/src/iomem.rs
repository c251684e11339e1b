use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bcmrng_hal::{IoMemory, RegisterWindow};
use tracing::{debug, error};

use crate::address_decoder::AddressDecoder;
use crate::device::MmioDevice;
use crate::error::IoMemError;
use crate::exception::Exception;

pub type SharedDevice = Arc<Mutex<dyn MmioDevice + Send>>;

/// Simulated physical address space with `ioremap`/`iounmap` semantics.
///
/// Devices are attached at fixed ranges; a range can be mapped by at most one
/// window at a time. Faulting accesses are logged and collected instead of
/// bringing the process down.
#[derive(Default)]
pub struct IoMemSpace {
  devices: AddressDecoder<SharedDevice>,
  claims: AddressDecoder<Arc<AtomicBool>>,
  faults: Arc<Mutex<Vec<Exception>>>,
  maps: usize,
  unmaps: usize,
}

impl IoMemSpace {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn attach(&mut self, base: u64, size: u64, device: SharedDevice) -> Result<(), IoMemError> {
    let end = size
      .checked_sub(1)
      .and_then(|last| base.checked_add(last))
      .ok_or(IoMemError::BadRange { base, size })?;
    self.devices.insert(base..=end, device).map_err(|_| IoMemError::Overlap(base, end))?;
    debug!("attached device at {:#x}..={:#x}", base, end);
    Ok(())
  }

  pub fn is_mapped(&self, addr: u64) -> bool {
    self.claims.lookup(addr).is_some()
  }

  pub fn mapped_regions(&self) -> usize {
    self.claims.len()
  }

  pub fn maps(&self) -> usize {
    self.maps
  }

  pub fn unmaps(&self) -> usize {
    self.unmaps
  }

  pub fn faults(&self) -> Vec<Exception> {
    self.faults.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }
}

impl IoMemory for IoMemSpace {
  type Window = SimWindow;
  type Error = IoMemError;

  fn ioremap(&mut self, phys: u64, len: usize) -> Result<SimWindow, IoMemError> {
    if len == 0 {
      return Err(IoMemError::Empty(phys));
    }
    let (range, device) = self.devices.lookup(phys).ok_or(IoMemError::NoDevice(phys))?;
    let end = *range.end();
    let last = phys
      .checked_add(len as u64 - 1)
      .filter(|last| *last <= end)
      .ok_or(IoMemError::OutOfRange { phys, len, end })?;

    let window = SimWindow {
      phys,
      span: len,
      device_offset: phys - range.start(),
      device: device.clone(),
      mapped: Arc::new(AtomicBool::new(true)),
      faults: self.faults.clone(),
    };
    if let Err(mapped) = self.claims.insert(phys..=last, window.mapped.clone()) {
      mapped.store(false, Ordering::Release);
      return Err(IoMemError::Busy(phys));
    }

    self.maps += 1;
    debug!("ioremap {:#x}+{:#x}", phys, len);
    Ok(window)
  }

  fn iounmap(&mut self, window: SimWindow) {
    match self.claims.remove(window.phys) {
      Some((_, mapped)) if Arc::ptr_eq(&mapped, &window.mapped) => {
        mapped.store(false, Ordering::Release);
        self.unmaps += 1;
        debug!("iounmap {:#x}", window.phys);
      }
      Some((range, other)) => {
        // someone else's claim on the same base; put it back
        let _ = self.claims.insert(range, other);
        window.fault(Exception::DoubleUnmap(window.phys));
      }
      None => window.fault(Exception::DoubleUnmap(window.phys)),
    }
  }
}

/// A register window handed out by [`IoMemSpace`].
///
/// Clones share the mapping: once any of them is unmapped, accesses through
/// the others fault.
#[derive(Clone)]
pub struct SimWindow {
  phys: u64,
  span: usize,
  device_offset: u64,
  device: SharedDevice,
  mapped: Arc<AtomicBool>,
  faults: Arc<Mutex<Vec<Exception>>>,
}

impl SimWindow {
  pub fn is_mapped(&self) -> bool {
    self.mapped.load(Ordering::Acquire)
  }

  fn fault(&self, exception: Exception) {
    error!("{}", exception);
    self.faults.lock().unwrap_or_else(PoisonError::into_inner).push(exception);
  }

  fn check(&self, offset: usize, load: bool) -> Result<(), Exception> {
    let addr = self.phys.wrapping_add(offset as u64);
    if !self.is_mapped() {
      return Err(Exception::UnmappedAccess(addr));
    }
    if offset % 4 != 0 {
      return Err(if load { Exception::LoadAccessMisaligned(addr) } else { Exception::StoreAddrMisaligned(addr) });
    }
    if offset.checked_add(4).map_or(true, |end| end > self.span) {
      return Err(if load { Exception::LoadAccessFault(addr) } else { Exception::StoreAccessFault(addr) });
    }
    Ok(())
  }
}

impl std::fmt::Debug for SimWindow {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SimWindow")
      .field("phys", &format_args!("{:#x}", self.phys))
      .field("span", &self.span)
      .field("mapped", &self.is_mapped())
      .finish()
  }
}

impl RegisterWindow for SimWindow {
  fn base(&self) -> u64 {
    self.phys
  }

  fn span(&self) -> usize {
    self.span
  }

  /// Faulting reads return 0.
  fn read32(&self, offset: usize) -> u32 {
    let result = self.check(offset, true).and_then(|()| {
      let mut device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
      device
        .load(self.device_offset + offset as u64, 32)
        .map_err(|exception| exception.offset_by(self.phys - self.device_offset))
    });
    match result {
      Ok(value) => value as u32,
      Err(exception) => {
        self.fault(exception);
        0
      }
    }
  }

  /// Faulting writes are dropped.
  fn write32(&self, offset: usize, value: u32) {
    let result = self.check(offset, false).and_then(|()| {
      let mut device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
      device
        .store(self.device_offset + offset as u64, 32, value as u64)
        .map_err(|exception| exception.offset_by(self.phys - self.device_offset))
    });
    if let Err(exception) = result {
      self.fault(exception);
    }
  }
}

#[cfg(test)]
mod tests {
  use bcmrng_hal_types::{RNG_BASE, RNG_CTRL, RNG_DATA, RNG_SIZE, RNG_STATUS};

  use super::*;
  use crate::device::SimulatedRng;

  fn space() -> (IoMemSpace, Arc<Mutex<SimulatedRng>>) {
    let device = Arc::new(Mutex::new(SimulatedRng::new(3)));
    let mut space = IoMemSpace::new();
    space.attach(RNG_BASE, RNG_SIZE as u64, device.clone()).unwrap();
    (space, device)
  }

  #[test]
  fn map_access_unmap() {
    let (mut space, device) = space();
    let window = space.ioremap(RNG_BASE, RNG_SIZE).unwrap();

    window.write32(RNG_STATUS, 0x40000);
    assert_eq!(window.read32(RNG_STATUS), 0x40000);
    assert_eq!(device.lock().unwrap().threshold(), 0x40000);
    assert!(space.is_mapped(RNG_BASE));

    space.iounmap(window);
    assert!(!space.is_mapped(RNG_BASE));
    assert_eq!((space.maps(), space.unmaps()), (1, 1));
    assert!(space.faults().is_empty());
  }

  #[test]
  fn second_mapping_is_busy() {
    let (mut space, _device) = space();
    let window = space.ioremap(RNG_BASE, RNG_SIZE).unwrap();
    assert_eq!(space.ioremap(RNG_BASE + 4, 4).unwrap_err(), IoMemError::Busy(RNG_BASE + 4));
    assert_eq!(space.maps(), 1);

    space.iounmap(window);
    let window = space.ioremap(RNG_BASE, RNG_SIZE).unwrap();
    space.iounmap(window);
  }

  #[test]
  fn mapping_errors() {
    let (mut space, _device) = space();
    assert_eq!(space.ioremap(0x1000, 16).unwrap_err(), IoMemError::NoDevice(0x1000));
    assert_eq!(
      space.ioremap(RNG_BASE + 8, 16).unwrap_err(),
      IoMemError::OutOfRange { phys: RNG_BASE + 8, len: 16, end: RNG_BASE + 15 }
    );
    assert_eq!(space.ioremap(RNG_BASE, 0).unwrap_err(), IoMemError::Empty(RNG_BASE));
    assert_eq!(space.mapped_regions(), 0);
  }

  #[test]
  fn mapping_past_end_of_address_space() {
    let device = Arc::new(Mutex::new(SimulatedRng::new(5)));
    let mut space = IoMemSpace::new();
    space.attach(u64::MAX - 15, 16, device).unwrap();

    assert_eq!(space.ioremap(u64::MAX - 4, 16).unwrap_err(), IoMemError::OutOfRange {
      phys: u64::MAX - 4,
      len: 16,
      end: u64::MAX
    });
    let window = space.ioremap(u64::MAX - 15, 16).unwrap();
    space.iounmap(window);
  }

  #[test]
  fn attach_rejects_bad_ranges() {
    let mut space = IoMemSpace::new();
    let device = Arc::new(Mutex::new(SimulatedRng::new(6)));
    assert_eq!(space.attach(0, 0, device.clone()).unwrap_err(), IoMemError::BadRange { base: 0, size: 0 });
    assert_eq!(
      space.attach(u64::MAX - 4, 16, device).unwrap_err(),
      IoMemError::BadRange { base: u64::MAX - 4, size: 16 }
    );
  }

  #[test]
  fn attach_rejects_overlap() {
    let (mut space, _device) = space();
    let other = Arc::new(Mutex::new(SimulatedRng::new(4)));
    assert_eq!(
      space.attach(RNG_BASE + 8, 16, other).unwrap_err(),
      IoMemError::Overlap(RNG_BASE + 8, RNG_BASE + 23)
    );
  }

  #[test]
  fn stale_window_faults() {
    let (mut space, device) = space();
    let window = space.ioremap(RNG_BASE, RNG_SIZE).unwrap();
    let stale = window.clone();
    space.iounmap(window);

    stale.write32(RNG_CTRL, 1);
    assert_eq!(stale.read32(RNG_DATA), 0);
    assert!(!device.lock().unwrap().is_enabled());
    assert_eq!(
      space.faults(),
      vec![Exception::UnmappedAccess(RNG_BASE + RNG_CTRL as u64), Exception::UnmappedAccess(RNG_BASE + RNG_DATA as u64)]
    );

    space.iounmap(stale);
    assert_eq!(space.unmaps(), 1);
    assert_eq!(space.faults().last(), Some(&Exception::DoubleUnmap(RNG_BASE)));
  }

  #[test]
  fn device_faults_are_rebased() {
    let (mut space, _device) = space();
    let window = space.ioremap(RNG_BASE + 8, 8).unwrap();
    window.write32(0, 1);
    assert_eq!(space.faults(), vec![Exception::StoreAccessFault(RNG_BASE + 8)]);
    space.iounmap(window);
  }
}
