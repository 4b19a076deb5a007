//! Error types for CrumbStore core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in breadcrumb store operations.
///
/// The `bool`-returning store operations never surface these; they log
/// the error and report `false`. The `try_*` variants return them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] crumbstore_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store has not been opened, or has been closed.
    #[error("breadcrumb store is not open")]
    NotOpen,

    /// A stored record could not be parsed back into a breadcrumb.
    #[error("cannot decode breadcrumb record: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    /// A breadcrumb could not be serialized.
    #[error("cannot encode breadcrumb record: {message}")]
    Encode {
        /// Description of the encode failure.
        message: String,
    },

    /// A single frame is larger than the whole ring.
    #[error("frame of {frame_size} bytes exceeds ring capacity of {capacity} bytes")]
    CapacityExceeded {
        /// Size of the rejected frame, including its header.
        frame_size: u64,
        /// Configured ring capacity.
        capacity: u64,
    },

    /// The id counter cannot advance past its last value.
    #[error("breadcrumb ids exhausted")]
    IdExhausted,

    /// The ring file's frame chain is inconsistent with its header.
    #[error("ring corruption: {message}")]
    RingCorruption {
        /// Description of the corruption.
        message: String,
    },
}

impl StoreError {
    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Creates a ring corruption error.
    pub fn ring_corruption(message: impl Into<String>) -> Self {
        Self::RingCorruption {
            message: message.into(),
        }
    }
}
