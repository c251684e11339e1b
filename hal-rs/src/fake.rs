//! In-memory stand-ins for the host, shared by the unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use bcmrng_hal_types::{Register, RNG_DATA, RNG_SIZE, RNG_STATUS};

use crate::host::{HwRng, IoMemory, RngRegistry};
use crate::window::RegisterWindow;

pub fn init_tracing() {
  let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Access {
  Read(Register, u32),
  Write(Register, u32),
  Unmap,
}

#[derive(Debug, Default)]
pub struct FakeRegs {
  pub regs: [u32; 4],
  /// `(status, data)` pairs served by successive STATUS reads. Once empty,
  /// STATUS reports one word ready and DATA keeps its last value.
  pub script: VecDeque<(u32, u32)>,
  pub log: Vec<Access>,
  pub mapped: bool,
}

impl FakeRegs {
  pub fn shared() -> Rc<RefCell<FakeRegs>> {
    Rc::new(RefCell::new(FakeRegs::default()))
  }

  pub fn reads_of(&self, register: Register) -> usize {
    self.log.iter().filter(|access| matches!(access, Access::Read(r, _) if *r == register)).count()
  }

  pub fn writes(&self) -> Vec<(Register, u32)> {
    self
      .log
      .iter()
      .filter_map(|access| match access {
        Access::Write(register, value) => Some((*register, *value)),
        _ => None,
      })
      .collect()
  }

  pub fn value(&self, register: Register) -> u32 {
    self.regs[register.offset() / 4]
  }
}

#[derive(Debug, Clone)]
pub struct FakeWindow {
  pub base: u64,
  pub regs: Rc<RefCell<FakeRegs>>,
}

impl RegisterWindow for FakeWindow {
  fn base(&self) -> u64 {
    self.base
  }

  fn span(&self) -> usize {
    RNG_SIZE
  }

  fn read32(&self, offset: usize) -> u32 {
    let mut regs = self.regs.borrow_mut();
    assert!(regs.mapped, "read from unmapped window");
    let register = Register::from_offset(offset).expect("offset inside window");
    let value = match offset {
      RNG_STATUS => match regs.script.pop_front() {
        Some((status, data)) => {
          regs.regs[RNG_DATA / 4] = data;
          status
        }
        None => 1 << 24,
      },
      _ => regs.regs[offset / 4],
    };
    regs.log.push(Access::Read(register, value));
    value
  }

  fn write32(&self, offset: usize, value: u32) {
    let mut regs = self.regs.borrow_mut();
    assert!(regs.mapped, "write to unmapped window");
    let register = Register::from_offset(offset).expect("offset inside window");
    regs.regs[offset / 4] = value;
    regs.log.push(Access::Write(register, value));
  }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FakeError(pub &'static str);

impl fmt::Display for FakeError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.0)
  }
}

#[derive(Debug)]
pub struct FakeIoMem {
  pub regs: Rc<RefCell<FakeRegs>>,
  pub fail: bool,
  pub maps: usize,
  pub unmaps: usize,
}

impl FakeIoMem {
  pub fn new(regs: Rc<RefCell<FakeRegs>>) -> Self {
    Self { regs, fail: false, maps: 0, unmaps: 0 }
  }
}

impl IoMemory for FakeIoMem {
  type Window = FakeWindow;
  type Error = FakeError;

  fn ioremap(&mut self, phys: u64, len: usize) -> Result<FakeWindow, FakeError> {
    assert_eq!(len, RNG_SIZE);
    if self.fail {
      return Err(FakeError("out of vmalloc space"));
    }
    self.maps += 1;
    self.regs.borrow_mut().mapped = true;
    Ok(FakeWindow { base: phys, regs: self.regs.clone() })
  }

  fn iounmap(&mut self, window: FakeWindow) {
    self.unmaps += 1;
    let mut regs = window.regs.borrow_mut();
    regs.mapped = false;
    regs.log.push(Access::Unmap);
  }
}

#[derive(Debug)]
pub struct FakeRegistry<P> {
  pub providers: Vec<P>,
  pub reject: bool,
  pub attempts: usize,
}

impl<P> FakeRegistry<P> {
  pub fn new() -> Self {
    Self { providers: Vec::new(), reject: false, attempts: 0 }
  }
}

impl<P: HwRng> RngRegistry for FakeRegistry<P> {
  type Provider = P;
  type Error = FakeError;

  fn register(&mut self, provider: P) -> Result<(), FakeError> {
    self.attempts += 1;
    if self.reject {
      return Err(FakeError("registry rejected provider"));
    }
    self.providers.push(provider);
    Ok(())
  }

  fn unregister(&mut self, name: &str) -> Option<P> {
    let index = self.providers.iter().position(|provider| provider.name() == name)?;
    Some(self.providers.remove(index))
  }
}
