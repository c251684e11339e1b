use core::fmt;
use core::marker::PhantomData;

use bcmrng_hal_types::{RNG_BASE, RNG_CTRL, RNG_DISABLE, RNG_NAME, RNG_RBG2X, RNG_RBGEN, RNG_SIZE, RNG_STATUS, RNG_WARMUP_COUNT};
use tracing::{error, info, warn};

use crate::device::Bcm2708Rng;
use crate::host::{IoMemory, RngRegistry};
use crate::poll::Poll;
use crate::window::RegisterWindow;

/// Output rate of the generator.
///
/// `DoubleSpeed` sets RBG2X, which doubles throughput at the cost of
/// randomness quality. There is deliberately no default.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GenerationMode {
  Normal,
  DoubleSpeed,
}

impl GenerationMode {
  /// Value written to CTRL to start the generator in this mode.
  #[must_use]
  pub const fn ctrl_bits(self) -> u32 {
    match self {
      GenerationMode::Normal => RNG_RBGEN,
      GenerationMode::DoubleSpeed => RNG_RBGEN | RNG_RBG2X,
    }
  }
}

#[derive(Debug, Clone)]
pub struct RngConfig {
  pub mode: GenerationMode,
  /// Words the hardware discards before its output is used.
  pub warmup_count: u32,
  pub name: &'static str,
  pub quality: u16,
  pub phys_base: u64,
}

impl RngConfig {
  #[must_use]
  pub const fn new(mode: GenerationMode) -> Self {
    Self {
      mode,
      warmup_count: RNG_WARMUP_COUNT,
      name: RNG_NAME,
      quality: 0,
      phys_base: RNG_BASE,
    }
  }

  #[must_use]
  pub const fn warmup_count(mut self, warmup_count: u32) -> Self {
    self.warmup_count = warmup_count;
    self
  }

  #[must_use]
  pub const fn name(mut self, name: &'static str) -> Self {
    self.name = name;
    self
  }

  #[must_use]
  pub const fn quality(mut self, quality: u16) -> Self {
    self.quality = quality;
    self
  }

  #[must_use]
  pub const fn phys_base(mut self, phys_base: u64) -> Self {
    self.phys_base = phys_base;
    self
  }
}

#[derive(Debug)]
pub enum InitError<M, R> {
  /// The register window could not be mapped. Nothing was written or registered.
  Map(M),
  /// The registry refused the provider. The window has already been released.
  Registration(R),
}

impl<M: fmt::Display, R: fmt::Display> fmt::Display for InitError<M, R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      InitError::Map(err) => write!(f, "failed to map rng registers: {}", err),
      InitError::Registration(err) => write!(f, "failed to register hwrng: {}", err),
    }
  }
}

impl<M: fmt::Debug + fmt::Display, R: fmt::Debug + fmt::Display> core::error::Error for InitError<M, R> {}

/// A loaded driver instance: the mapped, enabled generator registered with
/// the host.
///
/// Only [`RngModule::initialize`] creates one and [`RngModule::shutdown`]
/// consumes it, so teardown cannot run twice.
#[derive(Debug)]
#[must_use = "dropping the module leaves the generator enabled and registered"]
pub struct RngModule<W, P> {
  window: W,
  name: &'static str,
  _poll: PhantomData<fn() -> P>,
}

impl<W, P> RngModule<W, P>
where
  W: RegisterWindow + Clone,
  P: Poll,
{
  /// Maps the registers, sets the warm-up count, enables the generator and
  /// registers it with `registry`.
  pub fn initialize<M, R>(
    iomem: &mut M,
    registry: &mut R,
    config: &RngConfig,
    poll: P,
  ) -> Result<Self, InitError<M::Error, R::Error>>
  where
    M: IoMemory<Window = W>,
    R: RngRegistry<Provider = Bcm2708Rng<W, P>>,
  {
    let window = match iomem.ioremap(config.phys_base, RNG_SIZE) {
      Ok(window) => window,
      Err(err) => {
        error!("{} failed to ioremap {:#x}: {}", config.name, config.phys_base, err);
        return Err(InitError::Map(err));
      }
    };
    info!("{} mapped at {:#x}", config.name, window.base());

    // warm-up count first, the hardware starts producing on enable
    window.write32(RNG_STATUS, config.warmup_count);
    window.write32(RNG_CTRL, config.mode.ctrl_bits());

    let device = Bcm2708Rng::new(window.clone(), poll).with_name(config.name).with_quality(config.quality);
    if let Err(err) = registry.register(device) {
      error!("{} hwrng register failed: {}", config.name, err);
      window.write32(RNG_CTRL, RNG_DISABLE);
      iomem.iounmap(window);
      return Err(InitError::Registration(err));
    }

    Ok(Self {
      window,
      name: config.name,
      _poll: PhantomData,
    })
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  /// Disables the generator, removes it from `registry` and releases the
  /// register window, in that order.
  pub fn shutdown<M, R>(self, iomem: &mut M, registry: &mut R)
  where
    M: IoMemory<Window = W>,
    R: RngRegistry,
  {
    info!("{} shutting down", self.name);
    self.window.write32(RNG_CTRL, RNG_DISABLE);

    if registry.unregister(self.name).is_none() {
      warn!("{} was not registered", self.name);
    }
    iomem.iounmap(self.window);
  }
}

#[cfg(test)]
mod tests {
  use bcmrng_hal_types::Register;

  use super::*;
  use crate::fake::{init_tracing, Access, FakeIoMem, FakeRegistry, FakeRegs, FakeWindow};
  use crate::host::HwRng;
  use crate::poll::Spin;

  type Registry = FakeRegistry<Bcm2708Rng<FakeWindow, Spin>>;

  fn host() -> (FakeIoMem, Registry) {
    init_tracing();
    (FakeIoMem::new(FakeRegs::shared()), FakeRegistry::new())
  }

  #[test]
  fn initialize_writes_warmup_before_enable() {
    let (mut iomem, mut registry) = host();
    let module = RngModule::initialize(&mut iomem, &mut registry, &RngConfig::new(GenerationMode::Normal), Spin).unwrap();

    assert_eq!(
      iomem.regs.borrow().writes(),
      vec![(Register::Status, 0x40000), (Register::Ctrl, 0x1)]
    );
    assert_eq!(iomem.maps, 1);
    assert_eq!(registry.providers.len(), 1);
    assert_eq!(registry.providers[0].name(), "bcm2708");
    assert_eq!(module.name(), "bcm2708");

    module.shutdown(&mut iomem, &mut registry);
  }

  #[test]
  fn initialize_then_shutdown_disables_and_unmaps() {
    let (mut iomem, mut registry) = host();
    let module = RngModule::initialize(&mut iomem, &mut registry, &RngConfig::new(GenerationMode::Normal), Spin).unwrap();
    module.shutdown(&mut iomem, &mut registry);

    let regs = iomem.regs.borrow();
    assert_eq!(regs.value(Register::Ctrl), 0);
    assert!(!regs.mapped);
    assert_eq!(iomem.unmaps, 1);
    assert!(registry.providers.is_empty());
    assert_eq!(
      &regs.log[regs.log.len() - 2..],
      &[Access::Write(Register::Ctrl, 0), Access::Unmap]
    );
  }

  #[test]
  fn map_failure_touches_nothing() {
    let (mut iomem, mut registry) = host();
    iomem.fail = true;

    let err = RngModule::initialize(&mut iomem, &mut registry, &RngConfig::new(GenerationMode::Normal), Spin).unwrap_err();

    assert!(matches!(err, InitError::Map(_)));
    assert_eq!(err.to_string(), "failed to map rng registers: out of vmalloc space");
    assert!(iomem.regs.borrow().log.is_empty());
    assert_eq!(registry.attempts, 0);
    assert_eq!(iomem.unmaps, 0);
  }

  #[test]
  fn registration_failure_unmaps_once() {
    let (mut iomem, mut registry) = host();
    registry.reject = true;

    let err = RngModule::initialize(&mut iomem, &mut registry, &RngConfig::new(GenerationMode::Normal), Spin).unwrap_err();

    assert!(matches!(err, InitError::Registration(_)));
    assert_eq!(registry.attempts, 1);
    assert_eq!(iomem.maps, 1);
    assert_eq!(iomem.unmaps, 1);

    let regs = iomem.regs.borrow();
    assert!(!regs.mapped);
    assert_eq!(regs.value(Register::Ctrl), 0);
    assert_eq!(regs.log.last(), Some(&Access::Unmap));
  }

  #[test]
  fn double_speed_sets_rbg2x() {
    let (mut iomem, mut registry) = host();
    let config = RngConfig::new(GenerationMode::DoubleSpeed).warmup_count(16).name("rng-fast").quality(100);
    let module = RngModule::initialize(&mut iomem, &mut registry, &config, Spin).unwrap();

    assert_eq!(
      iomem.regs.borrow().writes(),
      vec![(Register::Status, 16), (Register::Ctrl, 0x3)]
    );
    assert_eq!(registry.providers[0].name(), "rng-fast");
    assert_eq!(registry.providers[0].quality(), 100);

    module.shutdown(&mut iomem, &mut registry);
    assert!(registry.providers.is_empty());
  }

  #[test]
  fn registered_device_reads_through_window() {
    let (mut iomem, mut registry) = host();
    let module = RngModule::initialize(&mut iomem, &mut registry, &RngConfig::new(GenerationMode::Normal), Spin).unwrap();
    iomem.regs.borrow_mut().script.extend([(0, 0), (0, 0), (0x0100_0000, 0xcafe_f00d)]);

    let mut buf = [0u8; 4];
    assert_eq!(registry.providers[0].read(&mut buf, true), Ok(4));
    assert_eq!(u32::from_le_bytes(buf), 0xcafe_f00d);
    assert_eq!(iomem.regs.borrow().reads_of(Register::Status), 3);

    module.shutdown(&mut iomem, &mut registry);
  }

  #[test]
  fn config_defaults() {
    let config = RngConfig::new(GenerationMode::Normal);
    assert_eq!(config.warmup_count, 0x40000);
    assert_eq!(config.phys_base, 0x2010_4000);
    assert_eq!(config.name, "bcm2708");
    assert_eq!(GenerationMode::Normal.ctrl_bits(), 0x1);
  }
}
