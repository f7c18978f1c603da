//! Position strategy: fused fastrange mapping and MCG state advance.
//!
//! One [`mulx64`] per round produces both the next bucket index and the next
//! hash state: `(lo, hi) = mulx64(hash, rng)` maps the hash near-uniformly
//! into `[0, rng)` through the high half (fastrange), while the low half is
//! the next state of a multiplicative congruential generator
//! `hash' = hash * rng mod 2^64`.
//!
//! The MCG reaches its full period only when the initial hash is odd and
//! `rng = +-3 (mod 8)`, so construction adjusts the requested range upward by
//! the smallest amount satisfying that congruence and [`prepare_hash`] forces
//! the hash odd before the first round. A consequence callers must respect:
//! the low bits of the advanced hash are of poor quality (the least
//! significant bit is always one), so subfilters consuming low bits re-mix.
//!
//! [`prepare_hash`]: McgFastRange::prepare_hash

use crate::core::mulx::mulx64;

/// Bucket index generator over an adjusted range.
///
/// The effective range reported by [`range`](Self::range) is the adjusted
/// multiplier, not the requested value; capacity accounting throughout the
/// crate is based on the effective range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McgFastRange {
    rng: u64,
}

impl McgFastRange {
    /// Build a strategy for the requested range.
    ///
    /// The stored multiplier is the smallest value `>= requested` congruent
    /// with `3` or `5` modulo `8`.
    #[must_use]
    pub const fn new(requested: usize) -> Self {
        let m = requested as u64;
        let rem = m % 8;
        let rng = if rem <= 3 {
            m + (3 - rem)
        } else if rem <= 5 {
            m + (5 - rem)
        } else {
            m + (8 - rem) + 3
        };
        Self { rng }
    }

    /// The effective range positions are drawn from.
    #[inline]
    #[must_use]
    pub const fn range(&self) -> usize {
        self.rng as usize
    }

    /// Condition a hash before the first round.
    ///
    /// Forcing the low bit keeps the MCG on its maximum-length cycle.
    #[inline(always)]
    pub fn prepare_hash(&self, hash: &mut u64) {
        *hash |= 1;
    }

    /// Produce the next bucket index and advance the hash state.
    #[inline(always)]
    pub fn next_position(&self, hash: &mut u64) -> usize {
        let (lo, hi) = mulx64(*hash, self.rng);
        *hash = lo;
        hi as usize
    }
}
