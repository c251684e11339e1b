//! User-space host for the BCM2708 RNG shim: a simulated peripheral, an I/O
//! memory space to map it through, and an hwrng registry to plug it into.

pub mod address_decoder;
pub mod board;
pub mod device;
pub mod error;
pub mod exception;
pub mod iomem;
pub mod poll;
pub mod registry;

pub use board::{Board, SimulatedBcm2708};
pub use error::{IoMemError, RegistryError};
pub use poll::{CancelToken, PollOptions, TimedPoll};
pub use registry::HwrngRegistry;
