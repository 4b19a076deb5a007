//! # CrumbStore Core
//!
//! Persistent, size-bounded breadcrumb log.
//!
//! This crate provides:
//! - [`RecordCodec`] bounding and serializing breadcrumbs as compact JSON
//! - [`RingFile`], a crash-safe circular file of checksummed frames
//! - [`BreadcrumbStore`], the thread-safe facade that assigns ids and
//!   evicts the oldest breadcrumbs when the file is full
//! - [`BreadcrumbReader`] for attaching the log to a report
//!
//! ## Example
//!
//! ```rust,no_run
//! use crumbstore_core::{breadcrumb_log_path, BreadcrumbStore, Config, NewBreadcrumb};
//!
//! let store = BreadcrumbStore::new(breadcrumb_log_path("/tmp/app"), Config::default());
//! if store.open() {
//!     store.add(NewBreadcrumb::new("Checkout started").attribute("cart", "3 items"));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod config;
mod error;
mod reader;
pub mod ring;
mod store;
mod types;

pub use codec::RecordCodec;
pub use config::{Config, DEFAULT_CAPACITY_BYTES, MIN_CAPACITY_BYTES};
pub use error::{StoreError, StoreResult};
pub use reader::BreadcrumbReader;
pub use ring::RingFile;
pub use store::{
    breadcrumb_log_path, BreadcrumbStore, StoreState, BREADCRUMBS_DIR, BREADCRUMBS_FILE,
    CONFIGURATION_MESSAGE,
};
pub use types::{Breadcrumb, BreadcrumbId, BreadcrumbLevel, BreadcrumbType, NewBreadcrumb};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
