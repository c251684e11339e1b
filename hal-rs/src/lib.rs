#![cfg_attr(not(test), no_std)]

//! Register shim for the BCM2708 on-chip hardware random number generator.
//!
//! The shim owns a 16-byte register window for as long as it is loaded. It
//! programs the warm-up threshold and enable bit, hands a [`Bcm2708Rng`] to the
//! host's hwrng registry and, on teardown, disables the generator before the
//! window is released. Every host facility (I/O memory mapping, the registry,
//! the way a blocked read waits) is injected through the traits in [`host`],
//! [`window`] and [`poll`].

pub mod device;
pub mod host;
pub mod module;
pub mod poll;
pub mod rand;
pub mod window;

#[cfg(test)]
mod fake;

pub use bcmrng_hal_types as types;

pub use device::Bcm2708Rng;
pub use host::{HwRng, IoMemory, RngRegistry};
pub use module::{GenerationMode, InitError, RngConfig, RngModule};
pub use poll::{Bounded, Poll, PollAbort, Spin};
pub use window::{IdentityMap, MapError, Mmio, RegisterWindow};
