//! XXH3-based hasher (requires the `xxhash` feature).
//!
//! XXH3 is a fast non-cryptographic hash with full avalanche behavior,
//! making it a good default when SipHash's keyed-hash pedigree is not
//! needed. This module wraps the `xxhash-rust` crate's streaming state.

#![allow(clippy::module_name_repetitions)]

use std::hash::{Hash, Hasher};

use xxhash_rust::xxh3::Xxh3;

use super::hasher::BloomHasher;

/// XXH3 hasher with an optional seed.
///
/// Different seeds produce independent digest families; filters persisted
/// with one seed must be reloaded with the same seed.
///
/// # Examples
///
/// ```
/// use bloomforge::hash::{BloomHasher, XxHasher};
///
/// let hasher = XxHasher::new();
/// assert_eq!(hasher.hash_item(&"key"), hasher.hash_item(&"key"));
/// assert_ne!(
///     XxHasher::with_seed(1).hash_item(&"key"),
///     XxHasher::with_seed(2).hash_item(&"key"),
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct XxHasher {
    seed: u64,
}

impl XxHasher {
    /// Create a hasher with the default seed (0).
    #[must_use]
    pub const fn new() -> Self {
        Self { seed: 0 }
    }

    /// Create a hasher with an explicit seed.
    #[must_use]
    pub const fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// The seed in use.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }
}

impl BloomHasher for XxHasher {
    const AVALANCHING: bool = true;

    #[inline]
    fn hash_item<T: Hash + ?Sized>(&self, item: &T) -> u64 {
        let mut state = Xxh3::with_seed(self.seed);
        item.hash(&mut state);
        state.finish()
    }

    fn name(&self) -> &'static str {
        "XXH3"
    }
}
