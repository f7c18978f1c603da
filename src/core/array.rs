//! Byte storage backing a filter.
//!
//! A filter's bit array is one heap allocation holding the bucket region
//! plus two kinds of slack: leading bytes so the first bucket can be aligned
//! to the block type's requirement (and to a cacheline, when buckets are
//! aligned at all), and a trailing overhang so reading a full block at the
//! last bucket position stays in bounds.
//!
//! Zero-capacity and taken-from filters own no allocation. Their reads are
//! redirected to a process-wide all-ones region, which makes `may_contain`
//! answer `true` without a branch on the read path; writes detect the case
//! through [`BitArray::is_allocated`] and skip.

use crate::error::{BloomForgeError, Result};

/// Size of the shared all-ones region for empty filters.
///
/// Must cover the alignment slack plus the bucket region of a zero-capacity
/// filter (whose effective range is the smallest admissible value, 3) for
/// every shipped discipline; the filter core asserts this per instantiation.
pub(crate) const DUMMY_LEN: usize = 1024;

/// Read-only, process-lifetime region backing every empty filter.
///
/// All bits set so that lookups through it always succeed. Never written.
static ALL_ONES: [u8; DUMMY_LEN] = [0xFF; DUMMY_LEN];

/// Owned byte storage with an aligned bucket origin.
///
/// `origin` is the offset of the first bucket within the allocation (or
/// within the shared all-ones region when there is no allocation).
#[derive(Debug)]
pub(crate) struct BitArray {
    data: Option<Box<[u8]>>,
    origin: usize,
}

impl BitArray {
    /// Storage for an empty filter: no allocation, reads served by the
    /// shared all-ones region.
    pub(crate) fn empty(initial_alignment: usize) -> Self {
        Self {
            data: None,
            origin: ALL_ONES.as_ptr().align_offset(initial_alignment),
        }
    }

    /// Allocate `space` zeroed bytes and locate the aligned bucket origin.
    ///
    /// Allocation failure is reported without side effects.
    pub(crate) fn allocate(space: usize, initial_alignment: usize) -> Result<Self> {
        let mut bytes: Vec<u8> = Vec::new();
        bytes
            .try_reserve_exact(space)
            .map_err(|_| BloomForgeError::allocation_failed(space))?;
        bytes.resize(space, 0);
        let data = bytes.into_boxed_slice();
        let origin = data.as_ptr().align_offset(initial_alignment);
        Ok(Self {
            data: Some(data),
            origin,
        })
    }
}

impl BitArray {
    /// Whether this array owns an allocation (false for empty filters).
    #[inline(always)]
    pub(crate) fn is_allocated(&self) -> bool {
        self.data.is_some()
    }

    /// The bucket region, starting at the aligned origin.
    ///
    /// For empty filters this is the all-ones region; callers must bound
    /// their reads by the zero-capacity effective range.
    #[inline(always)]
    pub(crate) fn buckets(&self) -> &[u8] {
        match &self.data {
            Some(data) => &data[self.origin..],
            None => &ALL_ONES[self.origin..],
        }
    }

    /// Mutable bucket region, absent for empty filters.
    #[inline(always)]
    pub(crate) fn buckets_mut(&mut self) -> Option<&mut [u8]> {
        let origin = self.origin;
        self.data.as_deref_mut().map(|data| &mut data[origin..])
    }

    /// Raw pointer to the bucket origin, for prefetch hints only.
    ///
    /// Valid to pass to prefetch on either backing region; prefetch never
    /// faults and the pointer is never dereferenced through this path.
    #[inline(always)]
    pub(crate) fn prefetch_base(&self) -> *const u8 {
        self.buckets().as_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_serves_all_ones() {
        let ar = BitArray::empty(64);
        assert!(!ar.is_allocated());
        assert!(ar.buckets().len() >= DUMMY_LEN - 63);
        assert!(ar.buckets()[..256].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_empty_has_no_mutable_view() {
        let mut ar = BitArray::empty(1);
        assert!(ar.buckets_mut().is_none());
    }

    #[test]
    fn test_allocate_zeroed() {
        let mut ar = BitArray::allocate(4096, 64).unwrap();
        assert!(ar.is_allocated());
        assert!(ar.buckets().iter().all(|&b| b == 0));
        let buckets = ar.buckets_mut().unwrap();
        buckets[0] = 0xAB;
        assert_eq!(ar.buckets()[0], 0xAB);
    }

    #[test]
    fn test_origin_is_aligned() {
        for alignment in [1usize, 2, 8, 64, 128] {
            let ar = BitArray::allocate(1024 + alignment, alignment).unwrap();
            assert_eq!(ar.buckets().as_ptr() as usize % alignment, 0);

            let empty = BitArray::empty(alignment);
            assert_eq!(empty.buckets().as_ptr() as usize % alignment, 0);
        }
    }

    #[test]
    fn test_alignment_slack_preserves_usable_length() {
        // Allocating `(alignment - 1) + payload` always leaves `payload`
        // bytes available past the aligned origin.
        for alignment in [1usize, 8, 64] {
            let payload = 777;
            let ar = BitArray::allocate(alignment - 1 + payload, alignment).unwrap();
            assert!(ar.buckets().len() >= payload);
        }
    }

    #[test]
    fn test_allocation_failure_is_reported() {
        // An absurd request must fail cleanly rather than abort.
        let err = BitArray::allocate(usize::MAX / 2, 64).unwrap_err();
        assert!(matches!(err, BloomForgeError::AllocationFailed { .. }));
    }
}
