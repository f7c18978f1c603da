//! Error types for bloomforge operations.
//!
//! All fallible operations in the crate return [`Result<T>`] with
//! [`BloomForgeError`] as the error type. Errors are structured enums with
//! enough context to diagnose the failure; none of them carry nested sources.
//!
//! # Error Propagation
//!
//! ```
//! use bloomforge::{BloomForgeError, Result};
//! use bloomforge::Filter;
//!
//! fn build(n: usize, fpr: f64) -> Result<Filter<u64, 4>> {
//!     let filter = Filter::for_items(n, fpr)?;
//!     Ok(filter)
//! }
//! # assert!(build(1000, 0.01).is_ok());
//! # assert!(build(1000, 1.5).is_err());
//! ```

#![allow(clippy::module_name_repetitions)]

use std::fmt;

/// Result type alias for bloomforge operations.
pub type Result<T> = std::result::Result<T, BloomForgeError>;

/// Errors that can occur constructing or combining filters.
///
/// # Design Notes
/// - `Clone` + `PartialEq` enable testing and error comparison
/// - `Debug` required by the `std::error::Error` trait
#[derive(Debug, Clone, PartialEq)]
pub enum BloomForgeError {
    /// Construction or restore parameters are inconsistent.
    InvalidParameters {
        /// Human-readable description of what's invalid.
        message: String,
    },

    /// False positive rate out of valid bounds `[0, 1]`.
    ///
    /// `fpr = 0` requests infinite capacity (sizing clamps instead of
    /// erroring, see `capacity_for`), anything outside the unit interval is
    /// meaningless as a probability.
    FalsePositiveRateOutOfBounds {
        /// The invalid false positive rate that was provided.
        fp_rate: f64,
    },

    /// Set combination between filters of differing effective range.
    ///
    /// Union and intersection operate byte-wise on the bit arrays and are
    /// only defined when both operands share the same layout. The operands
    /// are left unchanged.
    IncompatibleFilters {
        /// Effective range of the left operand.
        left_range: usize,
        /// Effective range of the right operand.
        right_range: usize,
    },

    /// The allocator could not provide the requested bit array.
    ///
    /// The filter that issued the request is left in its previous state.
    AllocationFailed {
        /// Size of the failed request in bytes.
        bytes: usize,
    },
}

impl fmt::Display for BloomForgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameters { message } => {
                write!(f, "Invalid filter parameters: {}.", message)
            }
            Self::FalsePositiveRateOutOfBounds { fp_rate } => {
                write!(
                    f,
                    "False positive rate {} is out of bounds. Must be in range [0, 1].",
                    fp_rate
                )
            }
            Self::IncompatibleFilters {
                left_range,
                right_range,
            } => {
                write!(
                    f,
                    "Cannot combine filters of differing capacity: effective range {} vs {}.",
                    left_range, right_range
                )
            }
            Self::AllocationFailed { bytes } => {
                write!(f, "Failed to allocate {} bytes for the bit array.", bytes)
            }
        }
    }
}

impl std::error::Error for BloomForgeError {}

impl BloomForgeError {
    /// Create an `InvalidParameters` error with a formatted message.
    #[must_use]
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }

    /// Create a `FalsePositiveRateOutOfBounds` error.
    #[must_use]
    pub fn fp_rate_out_of_bounds(fp_rate: f64) -> Self {
        Self::FalsePositiveRateOutOfBounds { fp_rate }
    }

    /// Create an `IncompatibleFilters` error.
    #[must_use]
    pub fn incompatible_filters(left_range: usize, right_range: usize) -> Self {
        Self::IncompatibleFilters {
            left_range,
            right_range,
        }
    }

    /// Create an `AllocationFailed` error.
    #[must_use]
    pub fn allocation_failed(bytes: usize) -> Self {
        Self::AllocationFailed { bytes }
    }
}
