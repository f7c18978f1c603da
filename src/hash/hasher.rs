//! Hash function trait and the built-in hashers.
//!
//! The filter consumes exactly one 64-bit digest per item. How that digest
//! is produced, and whether it needs a post-mix, is the hasher's business:
//!
//! - [`BloomHasher::hash_item`] maps an item to 64 bits.
//! - [`BloomHasher::AVALANCHING`] declares whether every output bit already
//!   depends on every input bit. Digests that are not avalanching get one
//!   round of `mulx64_mix` applied by the filter wrapper; the decision is an
//!   associated const, so the branch is resolved per instantiation at
//!   compile time, never at run time.
//!
//! This is the only place hash quality is normalized; everything downstream
//! assumes a well-mixed 64-bit word.

#![allow(clippy::module_name_repetitions)]

use std::hash::{Hash, Hasher};

/// Produces the 64-bit digest the filter engine consumes.
///
/// # Requirements
///
/// - **Determinism**: the same item must produce the same digest for the
///   lifetime of any filter (and of any persisted array) it is used with.
/// - **Distribution**: digests should spread over the full `u64` space;
///   hashers that cannot promise full avalanche behavior must leave
///   [`AVALANCHING`](Self::AVALANCHING) at `false` so the filter re-mixes.
///
/// # Examples
///
/// ```
/// use bloomforge::hash::{BloomHasher, StdHasher};
///
/// let hasher = StdHasher::new();
/// assert_eq!(hasher.hash_item(&"hello"), hasher.hash_item(&"hello"));
/// assert_ne!(hasher.hash_item(&"hello"), hasher.hash_item(&"world"));
/// ```
pub trait BloomHasher: Send + Sync + Clone + Default {
    /// Whether digests are already avalanching.
    ///
    /// When `false`, the filter applies `mulx64_mix` to every digest.
    const AVALANCHING: bool = false;

    /// Map an item to its 64-bit digest.
    fn hash_item<T: Hash + ?Sized>(&self, item: &T) -> u64;

    /// Human-readable name for debugging.
    fn name(&self) -> &'static str;
}

/// Default hasher over the standard library's SipHash.
///
/// Built with fixed keys, so digests are stable across runs and processes
/// (unlike a keyed `RandomState`). SipHash avalanches, so no post-mix is
/// applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdHasher;

impl StdHasher {
    /// Create a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl BloomHasher for StdHasher {
    const AVALANCHING: bool = true;

    #[inline]
    fn hash_item<T: Hash + ?Sized>(&self, item: &T) -> u64 {
        let mut state = std::collections::hash_map::DefaultHasher::new();
        item.hash(&mut state);
        state.finish()
    }

    fn name(&self) -> &'static str {
        "SipHash"
    }
}

/// Hasher for items that already are high-entropy 64-bit values.
///
/// The digest is the item's own `Hash` output folded verbatim: integers pass
/// through unchanged (zero-extended when narrower than 64 bits). Declared
/// non-avalanching, so the filter's `mulx64_mix` post-mix does the actual
/// scrambling; this is the cheapest correct configuration for pre-hashed or
/// sequential integer keys.
///
/// # Examples
///
/// ```
/// use bloomforge::hash::{BloomHasher, PassthroughHasher};
///
/// let hasher = PassthroughHasher::new();
/// assert_eq!(hasher.hash_item(&0xABCDu64), 0xABCD);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughHasher;

impl PassthroughHasher {
    /// Create a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// `Hasher` state that folds written values instead of scrambling them.
///
/// Every write rotates the state one byte and XORs the value in. A single
/// integer hashed from the zero state passes through unchanged; composite
/// keys still fold every component.
struct PassthroughState(u64);

impl PassthroughState {
    #[inline]
    fn fold(&mut self, v: u64) {
        self.0 = self.0.rotate_left(8) ^ v;
    }
}

impl Hasher for PassthroughState {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.fold(u64::from(b));
        }
    }

    #[inline]
    fn write_u8(&mut self, v: u8) {
        self.fold(u64::from(v));
    }

    #[inline]
    fn write_u16(&mut self, v: u16) {
        self.fold(u64::from(v));
    }

    #[inline]
    fn write_u32(&mut self, v: u32) {
        self.fold(u64::from(v));
    }

    #[inline]
    fn write_u64(&mut self, v: u64) {
        self.fold(v);
    }

    #[inline]
    fn write_u128(&mut self, v: u128) {
        self.fold((v as u64) ^ ((v >> 64) as u64));
    }

    #[inline]
    fn write_usize(&mut self, v: usize) {
        self.fold(v as u64);
    }

    #[inline]
    fn write_i64(&mut self, v: i64) {
        self.fold(v as u64);
    }
}

impl BloomHasher for PassthroughHasher {
    #[inline]
    fn hash_item<T: Hash + ?Sized>(&self, item: &T) -> u64 {
        let mut state = PassthroughState(0);
        item.hash(&mut state);
        state.finish()
    }

    fn name(&self) -> &'static str {
        "Passthrough"
    }
}
