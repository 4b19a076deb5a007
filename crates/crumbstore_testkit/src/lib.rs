//! # CrumbStore Testkit
//!
//! Test utilities for CrumbStore.
//!
//! This crate provides:
//! - Test fixtures owning a temporary log directory
//! - Property-based test generators using proptest
//! - Crash simulation against the on-disk ring layout
//! - Stress testing utilities for concurrent writers
//! - Cross-crate integration scenarios
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crumbstore_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     with_temp_store(|store| {
//!         assert!(store.add("hello"));
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
