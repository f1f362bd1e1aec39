//! Optimized allocation and collection types for Surreal.
//!
//! This module provides:
//! - Re-exports of optimized hash collections using AHash
//! - A generation counter for telling successive occupants of a slot apart

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

// Re-export optimized hash collections
pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};

/// A generation number handed out by a [`GenerationCounter`].
///
/// Generations are never zero and never repeat for the lifetime of the counter,
/// so a stale reference can always be detected by comparing generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(NonZeroU64);

impl Generation {
    /// The raw generation value.
    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

/// Thread-safe source of unique, monotonically increasing generations.
#[derive(Debug)]
pub struct GenerationCounter {
    next: AtomicU64,
}

impl GenerationCounter {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next generation.
    pub fn next(&self) -> Generation {
        let value = self.next.fetch_add(1, Ordering::Relaxed);
        // Starts at 1 and a u64 will not wrap in practice.
        Generation(NonZeroU64::new(value).unwrap_or(NonZeroU64::MIN))
    }
}

impl Default for GenerationCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashmap_ahash() {
        let mut map = HashMap::new();
        map.insert("key", "value");
        assert_eq!(map.get("key"), Some(&"value"));
    }

    #[test]
    fn test_hashset_ahash() {
        let mut set = HashSet::new();
        set.insert(42);
        assert!(set.contains(&42));
    }

    #[test]
    fn test_generations_are_unique_and_increasing() {
        let counter = GenerationCounter::new();
        let a = counter.next();
        let b = counter.next();
        let c = counter.next();
        assert!(a < b && b < c);
        assert_eq!(a.get(), 1);
    }

    #[test]
    fn test_generations_across_threads() {
        let counter = std::sync::Arc::new(GenerationCounter::new());
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || (0..100).map(|_| counter.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = HashSet::new();
        for thread in threads {
            for generation in thread.join().unwrap() {
                assert!(all.insert(generation));
            }
        }
        assert_eq!(all.len(), 400);
    }
}
