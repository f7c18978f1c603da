//! Subfilter disciplines.
//!
//! A subfilter decides how bits are marked and checked inside the fixed-size
//! local region ("block") a filter round lands on, and supplies the per-round
//! false positive model the capacity calibrator integrates over.
//!
//! Three disciplines are provided:
//!
//! | Discipline | Region | Bits set per round |
//! |---|---|---|
//! | [`Block<W, K>`] | one word `W` | `K` draws, collisions possible |
//! | [`Multiblock<W, K>`] | `K` words side by side | exactly one per word |
//! | [`FastMultiblock32<K>`] | `K` 32-bit lanes | exactly one per lane |
//!
//! The classical single-bit-per-round filter is `Block<u8, 1>`.
//!
//! All disciplines are zero-sized types dispatched at compile time; the
//! filter engine is monomorphized over them, never virtually dispatched.

pub mod block;
pub mod fast_multiblock32;
pub mod multiblock;

pub use block::Block;
pub use fast_multiblock32::FastMultiblock32;
pub use multiblock::Multiblock;

use crate::core::mulx::mulx64_mix;

/// A bit-marking discipline over a fixed-width block value.
///
/// Implementations are stateless; `mark` followed by `check` with the same
/// hash must return `true` (the engine's no-false-negative guarantee reduces
/// to this), and `fpr(i, w)` must model the probability that a fresh
/// element's bits are all found set after `i` other elements landed in the
/// same `w`-bit window.
pub trait Subfilter {
    /// The block value a round operates on.
    ///
    /// Plain-data words or word arrays only; the engine bit-copies values of
    /// this type in and out of its byte storage.
    type Block: Copy;

    /// Bits set per round (the inner `K'`).
    const K: usize;

    /// Bytes of [`Self::Block`] actually touched.
    ///
    /// Equal to the block size except for lane disciplines that only use a
    /// prefix of their register-shaped value.
    const USED_VALUE_SIZE: usize = core::mem::size_of::<Self::Block>();

    /// Set this discipline's bits in `block` from the hash entropy.
    fn mark(block: &mut Self::Block, hash: u64);

    /// Check whether the bits [`mark`](Self::mark) would set are all present.
    fn check(block: &Self::Block, hash: u64) -> bool;

    /// Per-round false positive probability given `i` prior insertions into a
    /// `w`-bit window.
    fn fpr(i: usize, w: usize) -> f64;
}

/// Unsigned word types usable as block storage.
///
/// Implemented for `u8`, `u16`, `u32` and `u64`; the width must be a power of
/// two for the shift-chain index derivation to work.
pub trait BlockWord: Copy + PartialEq + Default {
    /// Word width in bits.
    const BITS: u32;

    /// Set bit `i` (callers keep `i < BITS`).
    fn set_bit(&mut self, i: u32);

    /// Test bit `i`.
    fn bit(&self, i: u32) -> bool;
}

macro_rules! impl_block_word {
    ($($t:ty),*) => {$(
        impl BlockWord for $t {
            const BITS: u32 = <$t>::BITS;

            #[inline(always)]
            fn set_bit(&mut self, i: u32) {
                *self |= (1 as $t) << i;
            }

            #[inline(always)]
            fn bit(&self, i: u32) -> bool {
                (*self >> i) & 1 == 1
            }
        }
    )*};
}

impl_block_word!(u8, u16, u32, u64);

/// Per-round false positive model shared by the multiblock disciplines.
///
/// Each of the `k` draws is confined to its own `1/k` slice of the `w`-bit
/// window, so one insertion hits a given target bit with probability `k / w`.
#[inline]
pub(crate) fn multiblock_fpr(k: usize, i: usize, w: usize) -> f64 {
    let p_set = 1.0 - (1.0 - k as f64 / w as f64).powi(i as i32);
    p_set.powi(k as i32)
}

/// Drive `k` index draws out of one 64-bit hash.
///
/// Each draw right-shifts the rolling sub-state by `log2(W::BITS)` and hands
/// the low `log2(W::BITS)` bits of the result to `f`. Once the 64-bit word is
/// spent (every `(64 - shift) / shift` draws) the sub-state is re-seeded
/// through [`mulx64_mix`]; this also launders the biased low bits the MCG
/// position step leaves behind.
#[inline(always)]
pub(crate) fn each_index<W: BlockWord>(hash: u64, k: usize, mut f: impl FnMut(u32)) {
    let mask = u64::from(W::BITS - 1);
    let shift = W::BITS.trailing_zeros();
    let rehash_every = ((64 - shift) / shift) as usize;

    let mut state = hash;
    let mut h = hash;
    for i in 0..k {
        if i != 0 && i % rehash_every == 0 {
            state = mulx64_mix(state);
            h = state;
        } else {
            h >>= shift;
        }
        f((h & mask) as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_word_set_and_test() {
        let mut w: u8 = 0;
        w.set_bit(0);
        w.set_bit(7);
        assert!(w.bit(0));
        assert!(!w.bit(3));
        assert!(w.bit(7));
        assert_eq!(w, 0b1000_0001);

        let mut w: u64 = 0;
        w.set_bit(63);
        assert!(w.bit(63));
        assert_eq!(w, 1 << 63);
    }

    #[test]
    fn test_each_index_in_range() {
        for seed in 0..500u64 {
            let hash = mulx64_mix(seed);
            each_index::<u8>(hash, 20, |i| assert!(i < 8));
            each_index::<u32>(hash, 20, |i| assert!(i < 32));
            each_index::<u64>(hash, 20, |i| assert!(i < 64));
        }
    }

    #[test]
    fn test_each_index_first_draw_skips_low_bits() {
        // The first draw must come from the hash shifted once; the least
        // significant bits (biased by the MCG) are never consumed directly.
        let hash = 0xFFFF_FFFF_FFFF_FFC1u64; // low 6 bits = 0b000001
        let mut first = None;
        each_index::<u64>(hash, 1, |i| first = Some(i));
        assert_eq!(first, Some(((hash >> 6) & 63) as u32));
    }

    #[test]
    fn test_each_index_reseeds_after_word_exhausted() {
        // For 64-bit words, shift = 6 and a word yields 9 draws; draw 10
        // must come from re-mixed state, not from further shifting.
        let hash = 0x0123_4567_89AB_CDEFu64;
        let mut draws = Vec::new();
        each_index::<u64>(hash, 12, |i| draws.push(i));
        assert_eq!(draws.len(), 12);
        for (i, &d) in draws[..9].iter().enumerate() {
            assert_eq!(u64::from(d), (hash >> (6 * (i + 1))) & 63);
        }
        let reseeded = mulx64_mix(hash);
        assert_eq!(u64::from(draws[9]), reseeded & 63);
        assert_eq!(u64::from(draws[10]), (reseeded >> 6) & 63);
        assert_eq!(u64::from(draws[11]), (reseeded >> 12) & 63);
    }

    #[test]
    fn test_each_index_deterministic() {
        let collect = |hash: u64| {
            let mut v = Vec::new();
            each_index::<u32>(hash, 16, |i| v.push(i));
            v
        };
        assert_eq!(collect(12345), collect(12345));
        assert_ne!(collect(12345), collect(54321));
    }
}
