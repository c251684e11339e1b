use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Non-overlapping physical address ranges, each carrying an entry.
pub struct AddressDecoder<T> {
  segments: BTreeMap<u64, (u64, T)>,
}

impl<T> Default for AddressDecoder<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> AddressDecoder<T> {
  pub fn new() -> Self {
    Self { segments: BTreeMap::new() }
  }

  /// Adds `range` unless it overlaps an existing segment, in which case the
  /// entry is handed back.
  pub fn insert(&mut self, range: RangeInclusive<u64>, entry: T) -> Result<(), T> {
    if self.overlaps(&range) {
      return Err(entry);
    }
    let (start, end) = range.into_inner();
    self.segments.insert(start, (end, entry));
    Ok(())
  }

  pub fn remove(&mut self, start: u64) -> Option<(RangeInclusive<u64>, T)> {
    self.segments.remove(&start).map(|(end, entry)| (start..=end, entry))
  }

  pub fn lookup(&self, address: u64) -> Option<(RangeInclusive<u64>, &T)> {
    if let Some((start, (end, entry))) = self.segments.range(..=address).next_back() {
      if address <= *end {
        return Some((*start..=*end, entry));
      }
    }
    None
  }

  pub fn overlaps(&self, range: &RangeInclusive<u64>) -> bool {
    if range.is_empty() {
      return false;
    }
    if self.lookup(*range.start()).is_some() {
      return true;
    }
    self.segments.range(range.clone()).next().is_some()
  }

  pub fn len(&self) -> usize {
    self.segments.len()
  }

  pub fn is_empty(&self) -> bool {
    self.segments.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookup_finds_containing_segment() {
    let mut decoder = AddressDecoder::new();
    decoder.insert(0x1000..=0x100f, "rng").unwrap();
    decoder.insert(0x2000..=0x2fff, "uart").unwrap();

    assert_eq!(decoder.lookup(0x1008), Some((0x1000..=0x100f, &"rng")));
    assert_eq!(decoder.lookup(0x2fff), Some((0x2000..=0x2fff, &"uart")));
    assert_eq!(decoder.lookup(0x1010), None);
    assert_eq!(decoder.lookup(0xfff), None);
  }

  #[test]
  fn insert_rejects_overlap() {
    let mut decoder = AddressDecoder::new();
    decoder.insert(0x1000..=0x100f, 1).unwrap();

    assert_eq!(decoder.insert(0x100c..=0x101f, 2), Err(2));
    assert_eq!(decoder.insert(0x0f00..=0x1000, 3), Err(3));
    assert_eq!(decoder.insert(0x0f00..=0x2000, 4), Err(4));
    assert_eq!(decoder.insert(0x1010..=0x101f, 5), Ok(()));
    assert_eq!(decoder.len(), 2);
  }

  #[test]
  fn remove_frees_range() {
    let mut decoder = AddressDecoder::new();
    decoder.insert(0x1000..=0x100f, ()).unwrap();
    assert_eq!(decoder.remove(0x1000), Some((0x1000..=0x100f, ())));
    assert!(decoder.is_empty());
    assert_eq!(decoder.remove(0x1000), None);
  }
}
