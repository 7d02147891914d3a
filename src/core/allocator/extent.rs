//! Free-extent tracking for the block data region
//!
//! Freed block bytes become extents. Adjacent extents coalesce, and new
//! blocks are placed best-fit into an extent before the region grows.

use std::collections::BTreeMap;

/// A contiguous run of bytes in the data region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// Starting byte offset
    pub start: usize,
    /// Number of bytes
    pub length: usize,
}

impl Extent {
    pub fn new(start: usize, length: usize) -> Self {
        Extent { start, length }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    /// Check if this extent is adjacent to another (can be coalesced)
    pub fn is_adjacent(&self, other: &Extent) -> bool {
        self.end() == other.start || other.end() == self.start
    }

    /// Coalesce two adjacent extents
    pub fn coalesce(&self, other: &Extent) -> Option<Extent> {
        if !self.is_adjacent(other) {
            return None;
        }

        let start = self.start.min(other.start);
        let end = self.end().max(other.end());

        Some(Extent::new(start, end - start))
    }
}

/// Free extents indexed by start offset
///
/// BTreeMap keeps them sorted so neighbours are found in O(log n).
#[derive(Debug, Clone, Default)]
pub struct ExtentMap {
    free: BTreeMap<usize, Extent>,
    free_bytes: usize,
}

impl ExtentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `length` bytes from the smallest extent that fits
    ///
    /// Returns the start offset, or `None` when no extent is large enough.
    pub fn allocate(&mut self, length: usize) -> Option<usize> {
        if length == 0 {
            return None;
        }

        let (start_key, extent) = self
            .free
            .iter()
            .filter(|(_, extent)| extent.length >= length)
            .min_by_key(|(_, extent)| extent.length)
            .map(|(k, e)| (*k, *e))?;

        self.free.remove(&start_key);
        self.free_bytes -= length;

        let remaining = extent.length - length;
        if remaining > 0 {
            let rest = Extent::new(extent.start + length, remaining);
            self.free.insert(rest.start, rest);
        }

        Some(extent.start)
    }

    /// Return an extent to the free map, merging with its neighbours
    pub fn release(&mut self, extent: Extent) {
        if extent.length == 0 {
            return;
        }

        self.free_bytes += extent.length;
        let mut merged = extent;

        // Coalesce with the previous extent
        if let Some((&prev_start, prev)) = self.free.range(..merged.start).next_back() {
            if let Some(joined) = prev.coalesce(&merged) {
                self.free.remove(&prev_start);
                merged = joined;
            }
        }

        // Coalesce with the next extent
        if let Some((&next_start, next)) = self.free.range(merged.start..).next() {
            if let Some(joined) = merged.coalesce(next) {
                self.free.remove(&next_start);
                merged = joined;
            }
        }

        self.free.insert(merged.start, merged);
    }

    /// Drop a trailing extent that ends exactly at `region_end`
    ///
    /// Returns the new region end.
    pub fn trim_tail(&mut self, region_end: usize) -> usize {
        match self.free.iter().next_back() {
            Some((&start, extent)) if extent.end() == region_end => {
                self.free_bytes -= extent.length;
                self.free.remove(&start);
                start
            }
            _ => region_end,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extent> {
        self.free.values()
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn free_bytes(&self) -> usize {
        self.free_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_coalesce() {
        let a = Extent::new(0, 10);
        let b = Extent::new(10, 5);
        let c = Extent::new(20, 5);

        assert_eq!(a.coalesce(&b), Some(Extent::new(0, 15)));
        assert_eq!(b.coalesce(&a), Some(Extent::new(0, 15)));
        assert_eq!(a.coalesce(&c), None);
    }

    #[test]
    fn test_best_fit() {
        let mut map = ExtentMap::new();
        map.release(Extent::new(0, 100));
        map.release(Extent::new(200, 16));
        map.release(Extent::new(300, 40));

        // Smallest extent that fits 12 bytes is the 16-byte one
        assert_eq!(map.allocate(12), Some(200));
        assert_eq!(map.free_bytes(), 144);

        // Leftover 4 bytes at 212 stay free
        assert_eq!(map.allocate(4), Some(212));
        assert_eq!(map.allocate(50), Some(0));
        assert_eq!(map.allocate(60), None);
    }

    #[test]
    fn test_release_coalesces_both_sides() {
        let mut map = ExtentMap::new();
        map.release(Extent::new(0, 10));
        map.release(Extent::new(20, 10));
        assert_eq!(map.len(), 2);

        map.release(Extent::new(10, 10));
        assert_eq!(map.len(), 1);
        assert_eq!(map.iter().next(), Some(&Extent::new(0, 30)));
        assert_eq!(map.free_bytes(), 30);
    }

    #[test]
    fn test_trim_tail() {
        let mut map = ExtentMap::new();
        map.release(Extent::new(0, 8));
        map.release(Extent::new(32, 16));

        assert_eq!(map.trim_tail(48), 32);
        assert_eq!(map.len(), 1);
        assert_eq!(map.trim_tail(32), 32);
    }

    #[test]
    fn test_zero_length_ignored() {
        let mut map = ExtentMap::new();
        map.release(Extent::new(5, 0));
        assert!(map.is_empty());
        assert_eq!(map.allocate(0), None);
    }
}
