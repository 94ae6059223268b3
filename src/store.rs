//! Word-addressed device memory for the reference slave.
//!
//! Addresses outside a store's configured range read as 0 and writes to them
//! are dropped; probing never fails. Single-bit writes read-modify-write the
//! containing word.
//!
//! # Example
//!
//! ```
//! use fins_core::{DenseMemory, MemoryArea, MemoryStore};
//!
//! let mut memory = DenseMemory::with_pattern(100, |_, index| index as u16);
//! assert_eq!(memory.read_words(MemoryArea::DM, 10, 3), vec![10, 11, 12]);
//!
//! memory.set_bit(MemoryArea::DM, 0, 15, true);
//! assert_eq!(memory.get_word(MemoryArea::DM, 0), 0x8000);
//!
//! // out of range: reads 0, write ignored
//! memory.set_word(MemoryArea::DM, 500, 7);
//! assert_eq!(memory.get_word(MemoryArea::DM, 500), 0);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::memory::MemoryArea;
use crate::utils::{get_bit, set_bit};

/// Word store addressed by (area, word index).
pub trait MemoryStore {
    /// Reads one word; out-of-range indices read as 0.
    fn get_word(&self, area: MemoryArea, index: usize) -> u16;

    /// Writes one word; out-of-range indices are ignored.
    fn set_word(&mut self, area: MemoryArea, index: usize, value: u16);

    /// Reads bit `bit` (0-15) of a word.
    fn get_bit(&self, area: MemoryArea, index: usize, bit: u8) -> bool {
        get_bit(self.get_word(area, index), bit)
    }

    /// Sets or clears bit `bit` of a word, preserving the other 15 bits.
    fn set_bit(&mut self, area: MemoryArea, index: usize, bit: u8, state: bool) {
        let word = self.get_word(area, index);
        self.set_word(area, index, set_bit(word, bit, state));
    }

    /// Reads `count` consecutive words starting at `start`.
    fn read_words(&self, area: MemoryArea, start: usize, count: usize) -> Vec<u16> {
        (0..count)
            .map(|i| {
                start
                    .checked_add(i)
                    .map_or(0, |index| self.get_word(area, index))
            })
            .collect()
    }

    /// Writes consecutive words starting at `start`.
    fn write_words(&mut self, area: MemoryArea, start: usize, values: &[u16]) {
        for (i, &value) in values.iter().enumerate() {
            if let Some(index) = start.checked_add(i) {
                self.set_word(area, index, value);
            }
        }
    }
}

/// Contiguous store with the same number of words in every area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseMemory {
    areas: HashMap<MemoryArea, Vec<u16>>,
}

impl DenseMemory {
    /// Creates a zero-filled store of `words_per_area` words per area.
    pub fn new(words_per_area: usize) -> Self {
        Self::with_pattern(words_per_area, |_, _| 0)
    }

    /// Creates a store whose initial words come from `fill(area, index)`.
    pub fn with_pattern<F>(words_per_area: usize, fill: F) -> Self
    where
        F: Fn(MemoryArea, usize) -> u16,
    {
        let areas = MemoryArea::ALL
            .iter()
            .map(|&area| (area, (0..words_per_area).map(|i| fill(area, i)).collect()))
            .collect();
        Self { areas }
    }

    /// Returns the number of words in `area`.
    pub fn len(&self, area: MemoryArea) -> usize {
        self.areas.get(&area).map_or(0, Vec::len)
    }

    /// Returns whether `area` holds no words.
    pub fn is_empty(&self, area: MemoryArea) -> bool {
        self.len(area) == 0
    }
}

impl Default for DenseMemory {
    fn default() -> Self {
        Self::new(usize::from(u16::MAX) + 1)
    }
}

impl MemoryStore for DenseMemory {
    fn get_word(&self, area: MemoryArea, index: usize) -> u16 {
        self.areas
            .get(&area)
            .and_then(|words| words.get(index))
            .copied()
            .unwrap_or(0)
    }

    fn set_word(&mut self, area: MemoryArea, index: usize, value: u16) {
        if let Some(word) = self.areas.get_mut(&area).and_then(|words| words.get_mut(index)) {
            *word = value;
        }
    }
}

/// Map-backed store that only holds words that were written.
///
/// Indices at or above `limit` are out of range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseMemory {
    words: HashMap<(MemoryArea, usize), u16>,
    limit: usize,
}

impl SparseMemory {
    /// Creates an empty store accepting indices below `limit`.
    pub fn new(limit: usize) -> Self {
        Self {
            words: HashMap::new(),
            limit,
        }
    }

    /// Returns the number of nonzero words held.
    pub fn populated(&self) -> usize {
        self.words.len()
    }
}

impl MemoryStore for SparseMemory {
    fn get_word(&self, area: MemoryArea, index: usize) -> u16 {
        self.words.get(&(area, index)).copied().unwrap_or(0)
    }

    fn set_word(&mut self, area: MemoryArea, index: usize, value: u16) {
        if index >= self.limit {
            return;
        }
        if value == 0 {
            self.words.remove(&(area, index));
        } else {
            self.words.insert((area, index), value);
        }
    }
}

/// A store shared between serve loops.
///
/// Every operation holds one lock for its full duration, so bit
/// read-modify-writes and multi-word writes from different loops never
/// interleave.
#[derive(Debug, Default)]
pub struct SharedMemory<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedMemory<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: MemoryStore> SharedMemory<S> {
    /// Wraps a store.
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Locks the store for direct access.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: MemoryStore> MemoryStore for SharedMemory<S> {
    fn get_word(&self, area: MemoryArea, index: usize) -> u16 {
        self.lock().get_word(area, index)
    }

    fn set_word(&mut self, area: MemoryArea, index: usize, value: u16) {
        self.lock().set_word(area, index, value);
    }

    fn set_bit(&mut self, area: MemoryArea, index: usize, bit: u8, state: bool) {
        self.lock().set_bit(area, index, bit, state);
    }

    fn read_words(&self, area: MemoryArea, start: usize, count: usize) -> Vec<u16> {
        self.lock().read_words(area, start, count)
    }

    fn write_words(&mut self, area: MemoryArea, start: usize, values: &[u16]) {
        self.lock().write_words(area, start, values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_out_of_range() {
        let mut memory = DenseMemory::new(10);
        memory.set_word(MemoryArea::HR, 10, 0x1234);
        assert_eq!(memory.get_word(MemoryArea::HR, 10), 0);
        assert_eq!(memory.read_words(MemoryArea::HR, 8, 4), vec![0, 0, 0, 0]);

        memory.write_words(MemoryArea::HR, 8, &[1, 2, 3, 4]);
        assert_eq!(memory.read_words(MemoryArea::HR, 8, 4), vec![1, 2, 0, 0]);
    }

    #[test]
    fn test_dense_areas_are_independent() {
        let mut memory = DenseMemory::new(4);
        memory.set_word(MemoryArea::CIO, 1, 0xAAAA);
        assert_eq!(memory.get_word(MemoryArea::CIO, 1), 0xAAAA);
        for area in [MemoryArea::WR, MemoryArea::HR, MemoryArea::AR, MemoryArea::DM] {
            assert_eq!(memory.get_word(area, 1), 0);
        }
    }

    #[test]
    fn test_dense_pattern() {
        let memory = DenseMemory::with_pattern(5000, |area, i| {
            if area == MemoryArea::DM {
                i as u16
            } else {
                0
            }
        });
        assert_eq!(memory.len(MemoryArea::DM), 5000);
        assert_eq!(memory.get_word(MemoryArea::DM, 4999), 4999);
        assert_eq!(memory.get_word(MemoryArea::WR, 4999), 0);
    }

    #[test]
    fn test_set_bit_preserves_siblings() {
        let mut memory = DenseMemory::new(1);
        memory.set_word(MemoryArea::DM, 0, 0xFFFF);
        memory.set_bit(MemoryArea::DM, 0, 3, false);
        assert_eq!(memory.get_word(MemoryArea::DM, 0), 0xFFF7);
        assert!(!memory.get_bit(MemoryArea::DM, 0, 3));
        assert!(memory.get_bit(MemoryArea::DM, 0, 4));
    }

    #[test]
    fn test_read_words_near_usize_max() {
        let memory = DenseMemory::new(1);
        assert_eq!(memory.read_words(MemoryArea::DM, usize::MAX, 2), vec![0, 0]);
    }

    #[test]
    fn test_sparse_limit_and_zero_removal() {
        let mut memory = SparseMemory::new(100);
        memory.set_word(MemoryArea::DM, 99, 5);
        memory.set_word(MemoryArea::DM, 100, 5);
        assert_eq!(memory.populated(), 1);
        assert_eq!(memory.get_word(MemoryArea::DM, 100), 0);

        memory.set_word(MemoryArea::DM, 99, 0);
        assert_eq!(memory.populated(), 0);
    }

    #[test]
    fn test_shared_memory_serializes_bit_writes() {
        let shared = SharedMemory::new(DenseMemory::new(1));
        let handles: Vec<_> = (0..16u8)
            .map(|bit| {
                let mut memory = shared.clone();
                std::thread::spawn(move || memory.set_bit(MemoryArea::WR, 0, bit, true))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(shared.get_word(MemoryArea::WR, 0), 0xFFFF);
    }
}
