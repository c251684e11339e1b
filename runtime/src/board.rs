use std::sync::{Arc, Mutex};

use bcmrng_hal::Bcm2708Rng;
use bcmrng_hal_types::{RNG_BASE, RNG_SIZE};

use crate::device::SimulatedRng;
use crate::error::IoMemError;
use crate::iomem::{IoMemSpace, SimWindow};
use crate::poll::TimedPoll;

/// The driver as it runs against the simulated board.
pub type SimulatedBcm2708 = Bcm2708Rng<SimWindow, TimedPoll>;

/// A BCM2708 peripheral bus with only the RNG block attached.
pub struct Board {
  pub iomem: IoMemSpace,
  pub rng: Arc<Mutex<SimulatedRng>>,
}

impl Board {
  pub fn new(rng: SimulatedRng) -> Result<Self, IoMemError> {
    let rng = Arc::new(Mutex::new(rng));
    let mut iomem = IoMemSpace::new();
    iomem.attach(RNG_BASE, RNG_SIZE as u64, rng.clone())?;
    Ok(Self { iomem, rng })
  }
}
