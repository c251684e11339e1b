use std::fmt;

/// A register access the simulated bus refused.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Exception {
  LoadAccessMisaligned(u64),
  LoadAccessFault(u64),
  StoreAddrMisaligned(u64),
  StoreAccessFault(u64),
  UnmappedAccess(u64),
  DoubleUnmap(u64),
}

impl fmt::Display for Exception {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    use Exception::*;
    match self {
      LoadAccessMisaligned(addr) => write!(f, "Load access misaligned {:#x}", addr),
      LoadAccessFault(addr) => write!(f, "Load access fault {:#x}", addr),
      StoreAddrMisaligned(addr) => write!(f, "Store address misaligned {:#x}", addr),
      StoreAccessFault(addr) => write!(f, "Store access fault {:#x}", addr),
      UnmappedAccess(addr) => write!(f, "Access through unmapped window {:#x}", addr),
      DoubleUnmap(addr) => write!(f, "Unmap of released window {:#x}", addr),
    }
  }
}

impl Exception {
  #[must_use]
  pub const fn value(self) -> u64 {
    use Exception::*;
    match self {
      LoadAccessMisaligned(addr)
      | LoadAccessFault(addr)
      | StoreAddrMisaligned(addr)
      | StoreAccessFault(addr)
      | UnmappedAccess(addr)
      | DoubleUnmap(addr) => addr,
    }
  }

  /// Rebases an address relative to a device onto the physical bus.
  #[must_use]
  pub const fn offset_by(self, base: u64) -> Exception {
    use Exception::*;
    match self {
      LoadAccessMisaligned(addr) => LoadAccessMisaligned(base + addr),
      LoadAccessFault(addr) => LoadAccessFault(base + addr),
      StoreAddrMisaligned(addr) => StoreAddrMisaligned(base + addr),
      StoreAccessFault(addr) => StoreAccessFault(base + addr),
      UnmappedAccess(addr) => UnmappedAccess(base + addr),
      DoubleUnmap(addr) => DoubleUnmap(base + addr),
    }
  }
}
