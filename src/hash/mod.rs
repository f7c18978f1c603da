//! Hash functions for the filter wrapper.
//!
//! Module structure:
//!
//! ```text
//! hash/
//! ├── hasher.rs  - BloomHasher trait, StdHasher, PassthroughHasher
//! ├── xxhash.rs  - XXH3 hasher (optional, feature = "xxhash")
//! └── mod.rs     - this file (public API)
//! ```
//!
//! # Choosing a Hasher
//!
//! | Hasher | Avalanching | Use case |
//! |--------|-------------|----------|
//! | [`StdHasher`] | yes | default; stable SipHash over any `Hash` type |
//! | [`PassthroughHasher`] | no (post-mixed) | pre-hashed or integer keys |
//! | [`XxHasher`] | yes | fastest over byte-heavy keys (`xxhash` feature) |
//!
//! Whether a hasher is avalanching is a compile-time property; filters over
//! non-avalanching hashers apply one `mulx64_mix` round to every digest and
//! the branch disappears at monomorphization.

pub mod hasher;

#[cfg(feature = "xxhash")]
pub mod xxhash;

pub use hasher::{BloomHasher, PassthroughHasher, StdHasher};

#[cfg(feature = "xxhash")]
pub use xxhash::XxHasher;

/// Type alias for the default hasher used by filters.
///
/// Provides a stable name for code that does not want to depend on the
/// concrete default (currently [`StdHasher`]).
pub type DefaultHasher = StdHasher;
