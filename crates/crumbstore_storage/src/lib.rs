//! # CrumbStore Storage
//!
//! Storage backend trait and implementations for CrumbStore.
//!
//! Backends are **opaque positional byte stores**: they read and write
//! bytes at offsets and never interpret them. The ring file layout,
//! frame boundaries and headers are owned by `crumbstore_core`.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (read, write, resize, flush)
//! - No knowledge of frames, headers or breadcrumbs
//! - Must be `Send + Sync` so a store can move between threads
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use crumbstore_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.write_at(0, b"hello world").unwrap();
//! let data = backend.read_at(6, 5).unwrap();
//! assert_eq!(&data, b"world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
