//! Grow-on-demand bit set that readers may set concurrently.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Bit set indexed by file id.
///
/// Setting a bit below the current capacity only takes the shared lock, so
/// queries running in parallel under the host read lock can record misses
/// without serializing on each other.
#[derive(Debug, Default)]
pub struct ConcurrentBitSet {
    words: RwLock<Vec<AtomicU64>>,
}

impl ConcurrentBitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> bool {
        let words = self.words.read();
        words
            .get(index / 64)
            .is_some_and(|word| word.load(Ordering::Relaxed) & (1 << (index % 64)) != 0)
    }

    pub fn set(&self, index: usize) {
        let word = index / 64;
        let bit = 1u64 << (index % 64);
        {
            let words = self.words.read();
            if let Some(slot) = words.get(word) {
                slot.fetch_or(bit, Ordering::Relaxed);
                return;
            }
        }
        let mut words = self.words.write();
        if words.len() <= word {
            words.resize_with(word + 1, || AtomicU64::new(0));
        }
        words[word].fetch_or(bit, Ordering::Relaxed);
    }

    /// Clears every bit.
    pub fn clear(&self) {
        self.words.write().clear();
    }
}
