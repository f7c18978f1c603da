//! The user-facing filter type.
//!
//! [`Filter`] pairs the hash-level engine with a [`BloomHasher`] and an item
//! type. Its only jobs are to turn items into 64-bit digests (applying the
//! post-mix when the hasher is not avalanching) and to re-export the
//! engine's operations under an item-typed surface.

use std::borrow::Borrow;
use std::hash::Hash;
use std::marker::PhantomData;

use crate::core::filter::FilterCore;
use crate::core::mulx::mulx64_mix;
use crate::error::{BloomForgeError, Result};
use crate::hash::{BloomHasher, DefaultHasher};
use crate::subfilter::{Block, Subfilter};

/// A configurable approximate-membership filter.
///
/// Compile-time parameters:
///
/// - `T`: item type (must implement [`Hash`]).
/// - `K`: rounds per element; each round picks one bucket and delegates to
///   the subfilter.
/// - `S`: subfilter discipline deciding how bits are set inside a bucket's
///   block. Defaults to [`Block<u8, 1>`], the classical one-bit-per-round
///   filter.
/// - `H`: hasher producing the 64-bit digest. Defaults to
///   [`DefaultHasher`].
/// - `BUCKET_SIZE`: byte stride between bucket positions; 0 selects the
///   subfilter's used byte width.
///
/// A filter never forgets: once inserted, an element is reported present for
/// the lifetime of the filter (no false negatives). Lookups for absent
/// elements fail with a tunable probability; see
/// [`capacity_for`](Self::capacity_for) / [`fpr_for`](Self::fpr_for) for the
/// space-accuracy trade.
///
/// # Examples
///
/// ```
/// use bloomforge::Filter;
///
/// // 10,000 items at a 1% false positive target, 7 single-bit rounds.
/// let mut filter: Filter<&str, 7> = Filter::for_items(10_000, 0.01)?;
///
/// filter.insert(&"hello");
/// filter.insert(&"world");
///
/// assert!(filter.may_contain(&"hello"));
/// assert!(filter.may_contain(&"world"));
/// # Ok::<(), bloomforge::BloomForgeError>(())
/// ```
///
/// Cache-local variants trade accuracy for speed by confining each element
/// to one block:
///
/// ```
/// use bloomforge::subfilter::Multiblock;
/// use bloomforge::Filter;
///
/// // One round, five 32-bit words per block: one cacheline touch per query.
/// let mut filter: Filter<u64, 1, Multiblock<u32, 5>> = Filter::new(1 << 20)?;
/// filter.insert(&42);
/// assert!(filter.may_contain(&42));
/// # Ok::<(), bloomforge::BloomForgeError>(())
/// ```
///
/// # Concurrency
///
/// A filter is a plain value: `&Filter` lookups may run concurrently,
/// anything `&mut` requires exclusive access, and two distinct filters never
/// need coordination. There is no interior synchronization.
pub struct Filter<T, const K: usize, S = Block<u8, 1>, H = DefaultHasher, const BUCKET_SIZE: usize = 0>
where
    S: Subfilter,
    H: BloomHasher,
{
    core: FilterCore<K, S, BUCKET_SIZE>,
    hasher: H,
    _items: PhantomData<T>,
}

impl<T, const K: usize, S, H, const BUCKET_SIZE: usize> Filter<T, K, S, H, BUCKET_SIZE>
where
    T: Hash,
    S: Subfilter,
    H: BloomHasher,
{
    /// Construct a filter holding at least `m_bits` of capacity.
    ///
    /// The actual capacity, reported by [`capacity`](Self::capacity), is the
    /// smallest admissible value at or above the request; requesting a
    /// reported capacity reproduces it exactly. `m_bits = 0` gives the empty
    /// filter.
    ///
    /// # Errors
    ///
    /// [`BloomForgeError::AllocationFailed`] if the bit array cannot be
    /// allocated.
    pub fn new(m_bits: usize) -> Result<Self> {
        Ok(Self::from_core(FilterCore::new(m_bits)?))
    }

    /// Construct a filter sized to hold `n` items at a false positive rate
    /// of at most `fpr`.
    ///
    /// # Errors
    ///
    /// [`BloomForgeError::FalsePositiveRateOutOfBounds`] if `fpr` is outside
    /// `[0, 1]`; [`BloomForgeError::AllocationFailed`] if the computed array
    /// cannot be allocated (an `fpr` of exactly 0 requests the maximum
    /// representable capacity and fails here).
    ///
    /// # Examples
    ///
    /// ```
    /// use bloomforge::Filter;
    ///
    /// let filter: Filter<u64, 7> = Filter::for_items(1000, 0.01)?;
    /// assert!(filter.capacity() >= 9585); // classical lower bound
    /// # Ok::<(), bloomforge::BloomForgeError>(())
    /// ```
    pub fn for_items(n: usize, fpr: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&fpr) {
            return Err(BloomForgeError::fp_rate_out_of_bounds(fpr));
        }
        Ok(Self::from_core(FilterCore::for_items(n, fpr)?))
    }

    /// Construct with `m_bits` capacity and insert every item of `items`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_items<I>(m_bits: usize, items: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Borrow<T>,
    {
        let mut filter = Self::new(m_bits)?;
        for item in items {
            filter.insert(item.borrow());
        }
        Ok(filter)
    }

    /// Insert an item.
    ///
    /// After this call [`may_contain`](Self::may_contain) returns `true` for
    /// the item, permanently. Inserting into an empty (zero-capacity) filter
    /// is a silent no-op.
    #[inline]
    pub fn insert(&mut self, item: &T) {
        let hash = self.hash_for(item);
        self.core.insert(hash);
    }

    /// Insert multiple items.
    ///
    /// Equivalent to calling [`insert`](Self::insert) for each item.
    pub fn insert_batch<'a, I>(&mut self, items: I)
    where
        T: 'a,
        I: IntoIterator<Item = &'a T>,
    {
        for item in items {
            self.insert(item);
        }
    }

    /// Check whether an item might have been inserted.
    ///
    /// `true` means *possibly present* (with the configured false positive
    /// probability); `false` means *definitely absent*. An empty filter
    /// returns `true` for everything: with zero capacity nothing can be
    /// ruled out.
    #[inline]
    #[must_use]
    pub fn may_contain(&self, item: &T) -> bool {
        self.core.may_contain(self.hash_for(item))
    }

    /// Capacity in bits.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// Zero every bit, keeping the capacity.
    pub fn clear(&mut self) {
        self.core.clear();
    }

    /// Zero every bit and resize to `m_bits` of requested capacity.
    ///
    /// Reallocates only when the effective capacity actually changes;
    /// `reset(m)` on a filter already at `filter(m)`'s capacity just clears.
    ///
    /// # Errors
    ///
    /// [`BloomForgeError::AllocationFailed`] if the new array cannot be
    /// allocated; the filter is left unchanged.
    pub fn reset(&mut self, m_bits: usize) -> Result<()> {
        self.core.reset(m_bits)
    }

    /// Swap contents with another filter of the same configuration.
    ///
    /// Capacities need not match; this is a constant-time exchange of the
    /// two bit arrays.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Merge another filter's elements into this one (bitwise OR).
    ///
    /// After the union, everything either filter reported present is
    /// reported present here.
    ///
    /// # Errors
    ///
    /// [`BloomForgeError::IncompatibleFilters`] if the capacities differ;
    /// neither filter is modified.
    pub fn union_with(&mut self, other: &Self) -> Result<()> {
        self.core.union_with(&other.core)
    }

    /// Keep only elements both filters might contain (bitwise AND).
    ///
    /// The result may keep false positives of the intersection, and its
    /// false positive rate is generally worse than a filter built from the
    /// intersected set directly.
    ///
    /// # Errors
    ///
    /// [`BloomForgeError::IncompatibleFilters`] if the capacities differ;
    /// neither filter is modified.
    pub fn intersect_with(&mut self, other: &Self) -> Result<()> {
        self.core.intersect_with(&other.core)
    }

    /// The raw used bytes of the bit array, for persistence.
    ///
    /// Together with [`capacity`](Self::capacity) this is the filter's
    /// complete persisted state; see [`from_parts`](Self::from_parts). The
    /// encoding is host-endian and carries no framing; the caller owns
    /// versioning and integrity.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.core.used_bytes()
    }

    /// Reconstruct a filter from a saved `(capacity, bytes)` pair.
    ///
    /// `m_bits` must be a value previously returned by
    /// [`capacity`](Self::capacity) of a filter with these type parameters,
    /// and `bytes` the matching [`as_bytes`](Self::as_bytes) content.
    ///
    /// # Errors
    ///
    /// [`BloomForgeError::InvalidParameters`] if `m_bits` is not an
    /// effective capacity or `bytes` has the wrong length;
    /// [`BloomForgeError::AllocationFailed`] on allocation failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use bloomforge::Filter;
    ///
    /// let mut original: Filter<u64, 4> = Filter::new(4096)?;
    /// original.insert(&7);
    ///
    /// let restored: Filter<u64, 4> =
    ///     Filter::from_parts(original.capacity(), original.as_bytes())?;
    /// assert!(restored.may_contain(&7));
    /// assert_eq!(restored, original);
    /// # Ok::<(), bloomforge::BloomForgeError>(())
    /// ```
    pub fn from_parts(m_bits: usize, bytes: &[u8]) -> Result<Self> {
        let mut core = FilterCore::<K, S, BUCKET_SIZE>::new(m_bits)?;
        if core.capacity() != m_bits {
            return Err(BloomForgeError::invalid_parameters(format!(
                "{} bits is not an effective capacity of this configuration",
                m_bits
            )));
        }
        core.load_bytes(bytes)?;
        Ok(Self::from_core(core))
    }

    /// Clone, reporting allocation failure instead of panicking.
    ///
    /// # Errors
    ///
    /// [`BloomForgeError::AllocationFailed`] if the new array cannot be
    /// allocated.
    pub fn try_clone(&self) -> Result<Self> {
        Self::from_parts(self.capacity(), self.as_bytes())
    }

    /// Smallest capacity (in bits) whose estimated false positive rate over
    /// `n` items is at most `fpr`.
    ///
    /// `fpr` outside `[0, 1]` is a precondition violation (checked in debug
    /// builds). An `fpr` of effectively 0 clamps to the maximum
    /// representable capacity.
    ///
    /// # Examples
    ///
    /// ```
    /// use bloomforge::Filter;
    ///
    /// let bits = Filter::<u64, 7>::capacity_for(1000, 0.01);
    /// assert!(bits >= 9585);
    /// ```
    #[must_use]
    pub fn capacity_for(n: usize, fpr: f64) -> usize {
        FilterCore::<K, S, BUCKET_SIZE>::capacity_for(n, fpr)
    }

    /// Estimated false positive rate for `n` items in `m_bits` of capacity.
    ///
    /// Degenerate cases: `n = 0` gives 0, `m_bits = 0` with items gives 1.
    /// The estimate never undercuts the classical Bloom filter bound
    /// `(1 - e^(-K_total * n / m))^K_total`.
    #[must_use]
    pub fn fpr_for(n: usize, m_bits: usize) -> f64 {
        FilterCore::<K, S, BUCKET_SIZE>::fpr_for(n, m_bits)
    }

    fn from_core(core: FilterCore<K, S, BUCKET_SIZE>) -> Self {
        Self {
            core,
            hasher: H::default(),
            _items: PhantomData,
        }
    }

    /// Digest an item, post-mixing unless the hasher avalanche-certifies
    /// its output. Resolved at compile time per instantiation.
    #[inline(always)]
    fn hash_for(&self, item: &T) -> u64 {
        let hash = self.hasher.hash_item(item);
        if H::AVALANCHING {
            hash
        } else {
            mulx64_mix(hash)
        }
    }
}

impl<T, const K: usize, S, H, const BUCKET_SIZE: usize> Default for Filter<T, K, S, H, BUCKET_SIZE>
where
    T: Hash,
    S: Subfilter,
    H: BloomHasher,
{
    /// The empty filter: zero capacity, no allocation, and `may_contain`
    /// answers `true` for everything.
    ///
    /// This is also the state a filter is left in by `std::mem::take`.
    fn default() -> Self {
        Self::from_core(FilterCore::empty())
    }
}

impl<T, const K: usize, S, H, const BUCKET_SIZE: usize> Clone for Filter<T, K, S, H, BUCKET_SIZE>
where
    T: Hash,
    S: Subfilter,
    H: BloomHasher,
{
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            hasher: self.hasher.clone(),
            _items: PhantomData,
        }
    }
}

impl<T, const K: usize, S, H, const BUCKET_SIZE: usize> PartialEq for Filter<T, K, S, H, BUCKET_SIZE>
where
    T: Hash,
    S: Subfilter,
    H: BloomHasher,
{
    /// Filters are equal when their effective capacities and used bytes
    /// match.
    fn eq(&self, other: &Self) -> bool {
        self.core == other.core
    }
}

impl<T, const K: usize, S, H, const BUCKET_SIZE: usize> Eq for Filter<T, K, S, H, BUCKET_SIZE>
where
    T: Hash,
    S: Subfilter,
    H: BloomHasher,
{
}

impl<T, const K: usize, S, H, const BUCKET_SIZE: usize> std::fmt::Debug
    for Filter<T, K, S, H, BUCKET_SIZE>
where
    S: Subfilter,
    H: BloomHasher,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter")
            .field("core", &self.core)
            .field("hasher", &self.hasher.name())
            .finish()
    }
}

impl<T, const K: usize, S, H, const BUCKET_SIZE: usize> Extend<T> for Filter<T, K, S, H, BUCKET_SIZE>
where
    T: Hash,
    S: Subfilter,
    H: BloomHasher,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(&item);
        }
    }
}

/// Classical Bloom filter: `K` rounds of one bit each.
pub type ClassicFilter<T, const K: usize, H = DefaultHasher> = Filter<T, K, Block<u8, 1>, H>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::PassthroughHasher;
    use crate::subfilter::{FastMultiblock32, Multiblock};

    #[test]
    fn test_insert_and_contains() {
        let mut filter: Filter<u64, 4> = Filter::new(8192).unwrap();
        assert!(!filter.may_contain(&42));
        filter.insert(&42);
        assert!(filter.may_contain(&42));
    }

    #[test]
    fn test_for_items_meets_request() {
        let filter: Filter<u64, 7> = Filter::for_items(1000, 0.01).unwrap();
        assert!(filter.capacity() > 0);
        let est = Filter::<u64, 7>::fpr_for(1000, filter.capacity());
        // The solved capacity is floored to whole bits before the range
        // adjustment rounds it back up, so allow a sliver above target.
        assert!(est <= 0.0101, "estimated {}", est);
    }

    #[test]
    fn test_for_items_rejects_bad_rate() {
        assert!(matches!(
            Filter::<u64, 4>::for_items(1000, -0.1),
            Err(BloomForgeError::FalsePositiveRateOutOfBounds { .. })
        ));
        assert!(matches!(
            Filter::<u64, 4>::for_items(1000, 1.5),
            Err(BloomForgeError::FalsePositiveRateOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_with_items() {
        let items = vec![1u64, 2, 3, 4, 5];
        let filter: Filter<u64, 5> = Filter::with_items(4096, &items).unwrap();
        for item in &items {
            assert!(filter.may_contain(item));
        }
    }

    #[test]
    fn test_insert_batch() {
        let mut filter: Filter<u64, 5> = Filter::new(4096).unwrap();
        let items = vec![10u64, 20, 30];
        filter.insert_batch(items.iter());
        assert!(items.iter().all(|i| filter.may_contain(i)));
    }

    #[test]
    fn test_extend() {
        let mut filter: Filter<u64, 5> = Filter::new(4096).unwrap();
        filter.extend(0..100u64);
        assert!((0..100).all(|i| filter.may_contain(&i)));
    }

    #[test]
    fn test_passthrough_hasher_gets_post_mixed() {
        // Sequential keys through the non-avalanching hasher must still
        // spread: saturation at this load would show up as a high hit rate
        // on absent keys.
        let mut filter: Filter<u64, 4, Block<u8, 1>, PassthroughHasher> =
            Filter::new(64 * 1024).unwrap();
        for i in 0..1000u64 {
            filter.insert(&i);
        }
        assert!((0..1000u64).all(|i| filter.may_contain(&i)));
        let hits = (100_000..110_000u64)
            .filter(|i| filter.may_contain(i))
            .count();
        assert!(hits < 1000, "{} hits on absent keys", hits);
    }

    #[test]
    fn test_multiblock_filter_round_trip() {
        let mut filter: Filter<u64, 2, Multiblock<u64, 4>> = Filter::new(1 << 16).unwrap();
        for i in 0..500u64 {
            filter.insert(&i);
        }
        assert!((0..500u64).all(|i| filter.may_contain(&i)));
    }

    #[test]
    fn test_fast_multiblock_filter_round_trip() {
        let mut filter: Filter<u64, 2, FastMultiblock32<5>> = Filter::new(1 << 16).unwrap();
        for i in 0..500u64 {
            filter.insert(&i);
        }
        assert!((0..500u64).all(|i| filter.may_contain(&i)));
    }

    #[test]
    fn test_default_is_empty() {
        let filter: Filter<u64, 3> = Filter::default();
        assert_eq!(filter.capacity(), 0);
        assert!(filter.may_contain(&1));
        assert!(filter.may_contain(&u64::MAX));
    }

    #[test]
    fn test_equality_by_contents() {
        let mut a: Filter<u64, 4> = Filter::new(4096).unwrap();
        let mut b: Filter<u64, 4> = Filter::new(4096).unwrap();
        assert_eq!(a, b);
        a.insert(&1);
        assert_ne!(a, b);
        b.insert(&1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_try_clone_matches_clone() {
        let mut filter: Filter<u64, 4> = Filter::new(4096).unwrap();
        filter.insert(&77);
        let a = filter.clone();
        let b = filter.try_clone().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, filter);
    }

    #[test]
    fn test_debug_is_compact() {
        let filter: Filter<u64, 4> = Filter::new(4096).unwrap();
        let s = format!("{:?}", filter);
        assert!(s.contains("Filter"));
        assert!(s.contains("SipHash"));
        // The array contents must not be dumped.
        assert!(s.len() < 200);
    }

    #[test]
    fn test_classic_alias() {
        let mut filter: ClassicFilter<u64, 6> = ClassicFilter::new(10_000).unwrap();
        filter.insert(&5);
        assert!(filter.may_contain(&5));
    }
}
