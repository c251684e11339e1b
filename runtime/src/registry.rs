use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bcmrng_hal::{HwRng, RngRegistry};
use priority_queue::PriorityQueue;
use tracing::{debug, info};

use crate::error::RegistryError;

pub const DEFAULT_CAPACITY: usize = 16;

/// Registered providers and the order in which they would become current.
struct Providers<P> {
  providers: HashMap<String, P>,
  /// Highest quality first, earliest registration on ties.
  queue: PriorityQueue<String, (u16, Reverse<u64>)>,
  selected: Option<String>,
  next_seq: u64,
  reject: bool,
}

/// In-process hwrng core: collects providers and reads from the current one.
///
/// All reads go through one lock, so at most one read is in flight.
pub struct HwrngRegistry<P> {
  inner: Mutex<Providers<P>>,
  capacity: usize,
}

impl<P: HwRng> Default for HwrngRegistry<P> {
  fn default() -> Self {
    Self::new()
  }
}

impl<P: HwRng> HwrngRegistry<P> {
  #[must_use]
  pub fn new() -> Self {
    Self::with_capacity(DEFAULT_CAPACITY)
  }

  #[must_use]
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      inner: Mutex::new(Providers {
        providers: HashMap::new(),
        queue: PriorityQueue::new(),
        selected: None,
        next_seq: 0,
        reject: false,
      }),
      capacity,
    }
  }

  fn lock(&self) -> MutexGuard<'_, Providers<P>> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Makes every following registration fail with [`RegistryError::Rejected`].
  pub fn reject_registrations(&self, reject: bool) {
    self.lock().reject = reject;
  }

  pub fn register(&self, provider: P) -> Result<(), RegistryError> {
    let mut inner = self.lock();
    let name = provider.name().to_owned();
    if inner.reject {
      return Err(RegistryError::Rejected);
    }
    if inner.providers.contains_key(&name) {
      return Err(RegistryError::AlreadyRegistered(name));
    }
    if inner.providers.len() >= self.capacity {
      return Err(RegistryError::Full(self.capacity));
    }

    let seq = inner.next_seq;
    inner.next_seq += 1;
    inner.queue.push(name.clone(), (provider.quality(), Reverse(seq)));
    inner.providers.insert(name.clone(), provider);
    info!("hwrng {} registered", name);
    Ok(())
  }

  pub fn unregister(&self, name: &str) -> Option<P> {
    let mut inner = self.lock();
    let provider = inner.providers.remove(name)?;
    inner.queue.remove(name);
    if inner.selected.as_deref() == Some(name) {
      inner.selected = None;
    }
    info!("hwrng {} unregistered", name);
    Some(provider)
  }

  /// Pins `name` as the current provider until it is unregistered.
  pub fn set_current(&self, name: &str) -> Result<(), RegistryError> {
    let mut inner = self.lock();
    if !inner.providers.contains_key(name) {
      return Err(RegistryError::NotFound(name.to_owned()));
    }
    inner.selected = Some(name.to_owned());
    debug!("hwrng {} selected", name);
    Ok(())
  }

  pub fn current(&self) -> Option<String> {
    let inner = self.lock();
    inner.selected.clone().or_else(|| inner.queue.peek().map(|(name, _)| name.clone()))
  }

  pub fn names(&self) -> Vec<String> {
    let mut names = self.lock().providers.keys().cloned().collect::<Vec<_>>();
    names.sort();
    names
  }

  pub fn len(&self) -> usize {
    self.lock().providers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Reads from the current provider into `buf`. See [`HwRng::read`].
  pub fn read(&self, buf: &mut [u8], wait: bool) -> Result<usize, RegistryError> {
    let mut inner = self.lock();
    let name = inner
      .selected
      .clone()
      .or_else(|| inner.queue.peek().map(|(name, _)| name.clone()))
      .ok_or(RegistryError::NoProvider)?;
    let provider = inner.providers.get_mut(&name).ok_or(RegistryError::NoProvider)?;
    Ok(provider.read(buf, wait)?)
  }

  /// Reads until `buf` is full or nothing more can be read.
  ///
  /// Like [`HwRng::read`], an error is only returned when nothing was read.
  pub fn fill(&self, buf: &mut [u8]) -> Result<usize, RegistryError> {
    let mut filled = 0;
    while filled < buf.len() {
      let mut word = [0u8; 4];
      let read = match self.read(&mut word, true) {
        Ok(read) => read,
        Err(err) if filled == 0 => return Err(err),
        Err(err) => {
          debug!("short read of {} bytes: {}", filled, err);
          break;
        }
      };
      if read == 0 {
        break;
      }
      let len = read.min(buf.len() - filled);
      buf[filled..filled + len].copy_from_slice(&word[..len]);
      filled += len;
    }
    Ok(filled)
  }
}

impl<P: HwRng> RngRegistry for &HwrngRegistry<P> {
  type Provider = P;
  type Error = RegistryError;

  fn register(&mut self, provider: P) -> Result<(), RegistryError> {
    HwrngRegistry::register(self, provider)
  }

  fn unregister(&mut self, name: &str) -> Option<P> {
    HwrngRegistry::unregister(self, name)
  }
}

impl<P: HwRng> RngRegistry for HwrngRegistry<P> {
  type Provider = P;
  type Error = RegistryError;

  fn register(&mut self, provider: P) -> Result<(), RegistryError> {
    HwrngRegistry::register(self, provider)
  }

  fn unregister(&mut self, name: &str) -> Option<P> {
    HwrngRegistry::unregister(self, name)
  }
}
