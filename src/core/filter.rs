//! The filter engine: layout, rounds, combination and capacity accounting.
//!
//! [`FilterCore`] is the hash-level machine underneath the public
//! [`Filter`](crate::Filter) wrapper. It knows nothing about item types; it
//! consumes 64-bit hashes and runs the per-round pipeline:
//!
//! ```text
//! prepare (force odd)
//! for each of K rounds:
//!     (position, hash) <- mcg_fastrange_step(hash)
//!     prefetch the cachelines under the bucket
//!     subfilter marks / checks K' bits in the block at the bucket
//! ```
//!
//! The engine is monomorphized over the round count, the subfilter
//! discipline and the bucket stride; every layout decision below is a
//! compile-time constant of the instantiation.

use std::marker::PhantomData;
use std::mem::{align_of, size_of};

use crate::core::array::{BitArray, DUMMY_LEN};
use crate::core::params::{
    classical_capacity, classical_fpr, poisson_weighted_sum, solve_capacity_ratio,
    ClassicalCapacity,
};
use crate::core::position::McgFastRange;
use crate::error::{BloomForgeError, Result};
use crate::subfilter::Subfilter;
use crate::util::bitops::{gcd_pow2, is_power_of_two};

/// Prefetch a cacheline for reading. No-op off x86-64.
#[inline(always)]
fn prefetch_read(p: *const u8) {
    #[cfg(target_arch = "x86_64")]
    // SAFETY: prefetch never faults and never dereferences.
    unsafe {
        use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
        _mm_prefetch::<_MM_HINT_T0>(p as *const i8);
    }
    #[cfg(not(target_arch = "x86_64"))]
    let _ = p;
}

/// Prefetch a cacheline ahead of a store.
///
/// Write-intent hints (prefetchw) are not portably available, so this issues
/// the same T0 hint as the read path.
#[inline(always)]
fn prefetch_write(p: *const u8) {
    prefetch_read(p);
}

/// Hash-level filter engine.
///
/// `K` is the number of rounds, `S` the subfilter discipline, `BUCKET_SIZE`
/// the byte stride between positions (0 selects the subfilter's used byte
/// width).
pub(crate) struct FilterCore<const K: usize, S: Subfilter, const BUCKET_SIZE: usize> {
    hs: McgFastRange,
    ar: BitArray,
    _subfilter: PhantomData<S>,
}

impl<const K: usize, S: Subfilter, const BUCKET_SIZE: usize> FilterCore<K, S, BUCKET_SIZE> {
    /// Total bits probed per element.
    pub(crate) const K_TOTAL: usize = K * S::K;

    /// Full width of the subfilter's block value, in bytes.
    const BLOCK_SIZE: usize = size_of::<S::Block>();

    /// Prefix of the block the subfilter actually touches, in bytes.
    const USED_BLOCK_SIZE: usize = S::USED_VALUE_SIZE;

    /// Byte stride between adjacent bucket positions.
    pub(crate) const BUCKET: usize = if BUCKET_SIZE == 0 {
        S::USED_VALUE_SIZE
    } else {
        BUCKET_SIZE
    };

    /// Overhang past the last bucket so a full-block access at the last
    /// position stays in bounds.
    const TAIL: usize = Self::BLOCK_SIZE - Self::BUCKET;

    /// Whether loads and stores at bucket pointers satisfy the block type's
    /// alignment. When false, accesses go through unaligned reads/writes.
    const ALIGNED: bool = Self::BUCKET % align_of::<S::Block>() == 0;

    const CACHELINE: usize = 64;

    /// Alignment of the bucket origin inside the allocation.
    const INITIAL_ALIGNMENT: usize = if Self::ALIGNED {
        if align_of::<S::Block>() > Self::CACHELINE {
            align_of::<S::Block>()
        } else {
            Self::CACHELINE
        }
    } else {
        1
    };

    /// Cachelines overlapping `[p, p + block_size)` for a bucket pointer `p`.
    const PREFETCHED_CACHELINES: usize = 1
        + (Self::BLOCK_SIZE + Self::CACHELINE - 1 - gcd_pow2(Self::BUCKET, Self::CACHELINE))
            / Self::CACHELINE;

    /// Compile-time parameter sanity. Referenced from the constructors so
    /// every instantiation is checked.
    const PARAMS_OK: () = {
        assert!(K >= 1, "filter needs at least one round");
        // Word widths are powers of two by construction (BlockWord is only
        // implemented for unsigned primitives); what remains checkable here
        // is the block geometry.
        assert!(
            Self::USED_BLOCK_SIZE >= 1 && Self::USED_BLOCK_SIZE <= Self::BLOCK_SIZE,
            "used size cannot exceed the block size"
        );
        assert!(
            Self::BUCKET >= 1 && Self::BUCKET <= Self::USED_BLOCK_SIZE,
            "bucket stride cannot exceed the used block size"
        );
        assert!(
            is_power_of_two(Self::INITIAL_ALIGNMENT),
            "bucket alignment must be a power of two"
        );
        assert!(
            Self::space_for(McgFastRange::new(0).range()) <= DUMMY_LEN,
            "block too large for the shared empty-filter region"
        );
    };

    /// Allocation size in bytes for an effective range.
    const fn space_for(rng: usize) -> usize {
        (Self::INITIAL_ALIGNMENT - 1) + rng * Self::BUCKET + Self::TAIL
    }

    /// Bytes participating in clear, copy, equality and serialization.
    fn used_array_size(rng: usize) -> usize {
        if rng == 0 {
            0
        } else {
            rng.saturating_mul(Self::BUCKET)
                .saturating_add(Self::USED_BLOCK_SIZE - Self::BUCKET)
        }
    }

    /// Bucket count for a requested bit capacity.
    ///
    /// The used-size overhang is subtracted from the request first (when the
    /// request is large enough to carry it) so that constructing a filter
    /// from a reported capacity reproduces that capacity exactly.
    fn requested_range(m: usize) -> usize {
        let overhang_bits = (Self::USED_BLOCK_SIZE - Self::BUCKET) * 8;
        let m = if m > overhang_bits { m - overhang_bits } else { m };
        let bucket_bits = Self::BUCKET * 8;
        if usize::MAX - m >= bucket_bits - 1 {
            (m + bucket_bits - 1) / bucket_bits
        } else {
            m / bucket_bits
        }
    }

    /// Construct with at least `m` bits of capacity (0 gives an unallocated
    /// filter whose lookups all succeed).
    pub(crate) fn new(m: usize) -> Result<Self> {
        let hs = McgFastRange::new(Self::requested_range(m));
        let rng = if m == 0 { 0 } else { hs.range() };
        Self::with_range(hs, rng)
    }

    /// Construct sized to hold `n` items at rate `fpr`.
    pub(crate) fn for_items(n: usize, fpr: f64) -> Result<Self> {
        Self::new(Self::unadjusted_capacity_for(n, fpr))
    }

    /// The unallocated zero-capacity filter. Never fails: nothing is
    /// allocated.
    pub(crate) fn empty() -> Self {
        let _ = Self::PARAMS_OK;
        Self {
            hs: McgFastRange::new(Self::requested_range(0)),
            ar: BitArray::empty(Self::INITIAL_ALIGNMENT),
            _subfilter: PhantomData,
        }
    }

    /// Construct from an already adjusted strategy and effective range.
    fn with_range(hs: McgFastRange, rng: usize) -> Result<Self> {
        let _ = Self::PARAMS_OK;
        let ar = if rng == 0 {
            BitArray::empty(Self::INITIAL_ALIGNMENT)
        } else {
            BitArray::allocate(Self::space_for(rng), Self::INITIAL_ALIGNMENT)?
        };
        Ok(Self {
            hs,
            ar,
            _subfilter: PhantomData,
        })
    }

    /// Effective range: bucket positions the strategy draws from.
    ///
    /// Zero for unallocated filters regardless of the stored strategy.
    pub(crate) fn range(&self) -> usize {
        if self.ar.is_allocated() {
            self.hs.range()
        } else {
            0
        }
    }

    /// Capacity in bits.
    pub(crate) fn capacity(&self) -> usize {
        Self::used_array_size(self.range()).saturating_mul(8)
    }

    /// The raw used bytes, for equality, persistence and combination.
    pub(crate) fn used_bytes(&self) -> &[u8] {
        let used = Self::used_array_size(self.range());
        &self.ar.buckets()[..used]
    }

    /// Insert a prepared 64-bit hash.
    #[inline]
    pub(crate) fn insert(&mut self, mut hash: u64) {
        self.hs.prepare_hash(&mut hash);

        // First round: position and prefetch are issued before the
        // unhappy-path emptiness check; the prefetch completion wait covers
        // the branch.
        let mut off = self.hs.next_position(&mut hash) * Self::BUCKET;
        Self::prefetch_span(self.ar.prefetch_base(), off, prefetch_write);
        let buckets = match self.ar.buckets_mut() {
            Some(buckets) => buckets,
            None => return,
        };
        Self::set(buckets, off, hash);

        for _ in 1..K {
            off = self.hs.next_position(&mut hash) * Self::BUCKET;
            Self::prefetch_span(buckets.as_ptr(), off, prefetch_write);
            Self::set(buckets, off, hash);
        }
    }

    /// Test a prepared 64-bit hash.
    ///
    /// The next round's position is computed (and its cachelines requested)
    /// before the current round's block is examined, so the memory system
    /// works ahead of the check chain. Unallocated filters read the all-ones
    /// region and answer `true` with no extra branch.
    #[inline]
    pub(crate) fn may_contain(&self, mut hash: u64) -> bool {
        self.hs.prepare_hash(&mut hash);
        let buckets = self.ar.buckets();

        let mut off0 = self.hs.next_position(&mut hash) * Self::BUCKET;
        Self::prefetch_span(buckets.as_ptr(), off0, prefetch_read);
        for _ in 1..K {
            let off = off0;
            let h0 = hash;
            off0 = self.hs.next_position(&mut hash) * Self::BUCKET;
            Self::prefetch_span(buckets.as_ptr(), off0, prefetch_read);
            if !Self::get(buckets, off, h0) {
                return false;
            }
        }
        Self::get(buckets, off0, hash)
    }

    /// Zero the used bytes, keeping capacity.
    pub(crate) fn clear(&mut self) {
        let used = Self::used_array_size(self.range());
        if let Some(buckets) = self.ar.buckets_mut() {
            buckets[..used].fill(0);
        }
    }

    /// Zero the bits; reallocate only if the effective range changes.
    pub(crate) fn reset(&mut self, m: usize) -> Result<()> {
        let new_hs = McgFastRange::new(Self::requested_range(m));
        let rng = if m == 0 { 0 } else { new_hs.range() };
        if rng != self.range() {
            // Allocate before replacing: on failure the filter is unchanged.
            let new_ar = if rng == 0 {
                BitArray::empty(Self::INITIAL_ALIGNMENT)
            } else {
                BitArray::allocate(Self::space_for(rng), Self::INITIAL_ALIGNMENT)?
            };
            self.hs = new_hs;
            self.ar = new_ar;
        }
        self.clear();
        Ok(())
    }

    /// Bitwise OR with a filter of the same effective range.
    pub(crate) fn union_with(&mut self, other: &Self) -> Result<()> {
        self.combine(other, |a, b| *a |= b)
    }

    /// Bitwise AND with a filter of the same effective range.
    pub(crate) fn intersect_with(&mut self, other: &Self) -> Result<()> {
        self.combine(other, |a, b| *a &= b)
    }

    fn combine(&mut self, other: &Self, f: impl Fn(&mut u8, u8)) -> Result<()> {
        if self.range() != other.range() {
            return Err(BloomForgeError::incompatible_filters(
                self.range(),
                other.range(),
            ));
        }
        let used = Self::used_array_size(self.range());
        if let Some(buckets) = self.ar.buckets_mut() {
            for (a, b) in buckets[..used].iter_mut().zip(other.used_bytes()) {
                f(a, *b);
            }
        }
        Ok(())
    }

    /// Overwrite the used bytes from a same-range source.
    pub(crate) fn copy_bytes_from(&mut self, other: &Self) {
        debug_assert_eq!(self.range(), other.range());
        let used = Self::used_array_size(self.range());
        if let Some(buckets) = self.ar.buckets_mut() {
            buckets[..used].copy_from_slice(other.used_bytes());
        }
    }

    /// Load previously saved used bytes into a freshly constructed core.
    pub(crate) fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let used = Self::used_array_size(self.range());
        if bytes.len() != used {
            return Err(BloomForgeError::invalid_parameters(format!(
                "saved array is {} bytes, capacity needs {}",
                bytes.len(),
                used
            )));
        }
        if let Some(buckets) = self.ar.buckets_mut() {
            buckets[..used].copy_from_slice(bytes);
        }
        Ok(())
    }

    /// Smallest bit capacity whose estimated rate is at most `fpr` for `n`
    /// items, after range adjustment.
    pub(crate) fn capacity_for(n: usize, fpr: f64) -> usize {
        let m = Self::unadjusted_capacity_for(n, fpr);
        if m == 0 {
            return 0;
        }
        let rng = McgFastRange::new(Self::requested_range(m)).range();
        Self::used_array_size(rng).saturating_mul(8)
    }

    /// Estimated false positive rate for `n` items in `m` bits.
    pub(crate) fn fpr_for(n: usize, m: usize) -> f64 {
        if n == 0 {
            0.0
        } else if m == 0 {
            1.0
        } else {
            Self::fpr_for_c(m as f64 / n as f64)
        }
    }

    /// Raw (pre-adjustment) capacity answering `capacity_for`.
    fn unadjusted_capacity_for(n: usize, fpr: f64) -> usize {
        debug_assert!(
            (0.0..=1.0).contains(&fpr),
            "false positive rate must be within [0, 1]"
        );
        if n == 0 {
            return 0;
        }
        let c_max = usize::MAX as f64 / n as f64;
        let c0 = match classical_capacity(Self::K_TOTAL, fpr) {
            // fpr is effectively 1: nothing to hold apart.
            ClassicalCapacity::AnyCapacity => return 0,
            // fpr is effectively 0: clamp to the largest representable size.
            ClassicalCapacity::Unbounded => return (c_max * n as f64) as usize,
            ClassicalCapacity::BitsPerItem(c) => c.min(c_max),
        };
        let c = solve_capacity_ratio(c0, c_max, fpr, Self::fpr_for_c);
        (c * n as f64) as usize
    }

    /// Estimated rate at `c` bits per item.
    fn fpr_for_c(c: f64) -> f64 {
        // Bits reachable from one position: the block plus its overhang into
        // the next bucket, since adjacent buckets overlap.
        let w = (2 * Self::USED_BLOCK_SIZE - Self::BUCKET) * 8;
        let lambda = (w * K) as f64 / c;
        let per_round = poisson_weighted_sum(lambda, |i| S::fpr(i, w));
        // The series under-approximates for extreme loads; the classical
        // closed form is always a valid floor.
        per_round
            .powi(K as i32)
            .max(classical_fpr(Self::K_TOTAL, c))
    }

    /// Request all cachelines overlapping the block at `off`.
    #[inline(always)]
    fn prefetch_span(base: *const u8, off: usize, hint: fn(*const u8)) {
        for i in 0..Self::PREFETCHED_CACHELINES {
            hint(base.wrapping_add(off + i * Self::CACHELINE));
        }
    }

    /// Mark the subfilter's bits in the block at byte offset `off`.
    #[inline(always)]
    fn set(buckets: &mut [u8], off: usize, hash: u64) {
        let bytes = &mut buckets[off..off + Self::BLOCK_SIZE];
        // SAFETY: the slice is exactly one block long and block values are
        // plain data; when ALIGNED holds, the bucket origin alignment plus a
        // stride divisible by the block alignment make the pointer aligned.
        unsafe {
            let p = bytes.as_mut_ptr() as *mut S::Block;
            if Self::ALIGNED {
                let mut block = p.read();
                S::mark(&mut block, hash);
                p.write(block);
            } else {
                let mut block = p.read_unaligned();
                S::mark(&mut block, hash);
                p.write_unaligned(block);
            }
        }
    }

    /// Check the subfilter's bits in the block at byte offset `off`.
    #[inline(always)]
    fn get(buckets: &[u8], off: usize, hash: u64) -> bool {
        let bytes = &buckets[off..off + Self::BLOCK_SIZE];
        // SAFETY: as in `set`.
        unsafe {
            let p = bytes.as_ptr() as *const S::Block;
            let block = if Self::ALIGNED {
                p.read()
            } else {
                p.read_unaligned()
            };
            S::check(&block, hash)
        }
    }
}

impl<const K: usize, S: Subfilter, const BUCKET_SIZE: usize> PartialEq
    for FilterCore<K, S, BUCKET_SIZE>
{
    fn eq(&self, other: &Self) -> bool {
        self.range() == other.range() && self.used_bytes() == other.used_bytes()
    }
}

impl<const K: usize, S: Subfilter, const BUCKET_SIZE: usize> Eq for FilterCore<K, S, BUCKET_SIZE> {}

impl<const K: usize, S: Subfilter, const BUCKET_SIZE: usize> Clone
    for FilterCore<K, S, BUCKET_SIZE>
{
    fn clone(&self) -> Self {
        let mut dup = Self::with_range(self.hs, self.range())
            .expect("allocation failed while cloning filter");
        dup.copy_bytes_from(self);
        dup
    }
}

impl<const K: usize, S: Subfilter, const BUCKET_SIZE: usize> std::fmt::Debug
    for FilterCore<K, S, BUCKET_SIZE>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterCore")
            .field("k", &K)
            .field("subfilter_k", &S::K)
            .field("bucket_size", &Self::BUCKET)
            .field("range", &self.range())
            .field("capacity", &self.capacity())
            .finish()
    }
}
