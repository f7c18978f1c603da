//! BloomForge: a configurable Bloom filter engine for Rust.
//!
//! One parametric filter type drives a family of approximate-membership
//! structures, from the classical bit-per-round Bloom filter to cache-local
//! block and multiblock variants and a SIMD-friendly 32-bit lane discipline.
//! All of them trade a tunable false positive rate for dramatic space
//! savings over exact sets, and none of them ever produce a false negative.
//!
//! # Quick Start
//!
//! ```
//! use bloomforge::Filter;
//!
//! // Create a filter for 10,000 items with a 1% false positive target.
//! let mut filter: Filter<&str, 7> = Filter::for_items(10_000, 0.01)?;
//!
//! // Insert items.
//! filter.insert(&"hello");
//! filter.insert(&"world");
//!
//! // Query items.
//! assert!(filter.may_contain(&"hello"));  // definitely inserted
//! assert!(filter.may_contain(&"world"));
//! // Absent items are rejected with probability ~0.99.
//! # Ok::<(), bloomforge::BloomForgeError>(())
//! ```
//!
//! # Choosing a Configuration
//!
//! | Configuration | Memory touches per op | Accuracy | Best for |
//! |---------------|----------------------|----------|----------|
//! | `Filter<T, K>` (classical) | K cachelines | optimal | general use |
//! | `Filter<T, K, Block<u64, K'>>` | K cachelines | good | fewer rounds, same probes |
//! | `Filter<T, 1, Multiblock<u32, K'>>` | 1 cacheline | good | query-heavy workloads |
//! | `Filter<T, 1, FastMultiblock32<K'>>` | 1 cacheline | good | as above, vectorized |
//!
//! Each round draws one bucket position from a multiplicative congruential
//! generator fused with a fastrange reduction, then hands the advanced hash
//! to the subfilter to mark or check its bits within the bucket's block. The
//! capacity calibrator ([`Filter::capacity_for`], [`Filter::fpr_for`])
//! integrates each discipline's per-round model over a Poisson load to size
//! filters for a requested rate.
//!
//! # Set Operations and Persistence
//!
//! Same-capacity filters combine in place with
//! [`union_with`](Filter::union_with) and
//! [`intersect_with`](Filter::intersect_with). The complete persisted state
//! is the `(capacity, bytes)` pair from [`capacity`](Filter::capacity) and
//! [`as_bytes`](Filter::as_bytes), restored with
//! [`from_parts`](Filter::from_parts); with the `serde` feature, filters
//! serialize to exactly that pair.
//!
//! # Feature Flags
//!
//! | Feature  | Enables |
//! |----------|---------|
//! | `serde`  | `Serialize`/`Deserialize` for [`Filter`] |
//! | `xxhash` | [`hash::XxHasher`] (XXH3) |
//!
//! # Concurrency Model
//!
//! Filters are plain values with no interior synchronization: shared
//! references permit concurrent lookups, mutation requires exclusivity, and
//! distinct filters are fully independent. Wrap a filter in a lock if you
//! need concurrent writers.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::needless_range_loop)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc(html_root_url = "https://docs.rs/bloomforge/0.1.0")]

/// Core mixing, positioning and calibration machinery.
pub mod core;

/// Error types and result alias.
pub mod error;

/// The public filter type.
pub mod filter;

/// Hash functions and the hasher trait.
pub mod hash;

/// Subfilter disciplines.
pub mod subfilter;

/// Utility functions and helpers.
pub mod util;

/// Serialization support (requires the `serde` feature).
#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub mod serde_support;

// Re-export the primary types at the crate root.
pub use error::{BloomForgeError, Result};
pub use filter::{ClassicFilter, Filter};
pub use hash::{BloomHasher, DefaultHasher, PassthroughHasher, StdHasher};
pub use subfilter::{Block, FastMultiblock32, Multiblock, Subfilter};

#[cfg(feature = "xxhash")]
pub use hash::XxHasher;

/// Prelude module for convenient imports.
///
/// # Examples
///
/// ```
/// use bloomforge::prelude::*;
///
/// let mut filter: Filter<u64, 5> = Filter::new(4096).unwrap();
/// filter.insert(&17);
/// assert!(filter.may_contain(&17));
/// ```
pub mod prelude {
    pub use crate::error::{BloomForgeError, Result};
    pub use crate::filter::{ClassicFilter, Filter};
    pub use crate::hash::{BloomHasher, DefaultHasher, PassthroughHasher, StdHasher};
    pub use crate::subfilter::{Block, FastMultiblock32, Multiblock, Subfilter};

    #[cfg(feature = "xxhash")]
    pub use crate::hash::XxHasher;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let mut filter: Filter<String, 4> = Filter::new(8192).unwrap();
        filter.insert(&"test".to_string());
        assert!(filter.may_contain(&"test".to_string()));
    }

    #[test]
    fn test_crate_root_reexports() {
        let _ = crate::Filter::<u64, 3>::capacity_for(100, 0.05);
        let err = crate::BloomForgeError::allocation_failed(8);
        assert!(format!("{err}").contains("8"));
    }

    #[test]
    fn test_subfilter_configurations_compile() {
        let _a: Filter<u64, 3, Block<u64, 2>> = Filter::new(1024).unwrap();
        let _b: Filter<u64, 2, Multiblock<u64, 3>> = Filter::new(2048).unwrap();
        let _c: Filter<u64, 1, FastMultiblock32<8>> = Filter::new(4096).unwrap();
        let _d: ClassicFilter<u64, 5> = ClassicFilter::new(512).unwrap();
    }
}
