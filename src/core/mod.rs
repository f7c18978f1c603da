//! Core building blocks of the filter engine.
//!
//! Module organization:
//!
//! ```text
//! core/
//! ├── mulx.rs      - extended multiply and the derived mix function
//! ├── position.rs  - MCG + fastrange position strategy
//! ├── array.rs     - byte storage, alignment, empty-filter dummy region
//! ├── params.rs    - capacity / false positive rate calibration math
//! ├── filter.rs    - the hash-level filter engine
//! └── mod.rs       - this file (public API)
//! ```
//!
//! [`mulx`], [`position`] and [`params`] are exposed because their math is
//! independently useful and independently testable; the engine and its
//! storage stay crate-private behind [`crate::Filter`].

pub mod mulx;
pub mod params;
pub mod position;

pub(crate) mod array;
pub(crate) mod filter;

pub use mulx::{mulx64, mulx64_mix};
pub use position::McgFastRange;
