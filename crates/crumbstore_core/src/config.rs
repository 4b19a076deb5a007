//! Store configuration.

use crate::codec::{DEFAULT_MAX_ATTRIBUTES_BYTES, DEFAULT_MAX_MESSAGE_CHARS};
use crate::types::BreadcrumbType;
use std::collections::BTreeSet;

/// Default ring capacity in bytes.
pub const DEFAULT_CAPACITY_BYTES: u32 = 64 * 1024;

/// Smallest capacity a store will run with; smaller requests are raised.
pub const MIN_CAPACITY_BYTES: u32 = 4096;

/// Configuration for a breadcrumb store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum bytes retained across all frames.
    pub capacity_bytes: u32,

    /// Messages longer than this many characters are cut.
    pub max_message_chars: usize,

    /// Byte budget shared by all attribute keys and values of one record.
    pub max_attributes_bytes: usize,

    /// Whether to `fsync` after every committed write.
    pub sync_on_write: bool,

    /// Types reported as enabled in configuration breadcrumbs.
    pub enabled_types: BTreeSet<BreadcrumbType>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            max_attributes_bytes: DEFAULT_MAX_ATTRIBUTES_BYTES,
            sync_on_write: true,
            enabled_types: BreadcrumbType::ALL.into_iter().collect(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ring capacity in bytes.
    #[must_use]
    pub fn capacity_bytes(mut self, capacity: u32) -> Self {
        self.capacity_bytes = capacity;
        self
    }

    /// Sets the message length cap in characters.
    #[must_use]
    pub fn max_message_chars(mut self, chars: usize) -> Self {
        self.max_message_chars = chars;
        self
    }

    /// Sets the attribute section budget in bytes.
    #[must_use]
    pub fn max_attributes_bytes(mut self, bytes: usize) -> Self {
        self.max_attributes_bytes = bytes;
        self
    }

    /// Sets whether to sync on every write.
    #[must_use]
    pub fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the enabled breadcrumb types.
    #[must_use]
    pub fn enabled_types(mut self, types: impl IntoIterator<Item = BreadcrumbType>) -> Self {
        self.enabled_types = types.into_iter().collect();
        self
    }

    /// Capacity the store actually runs with.
    #[must_use]
    pub fn effective_capacity(&self) -> u32 {
        self.capacity_bytes.max(MIN_CAPACITY_BYTES)
    }
}
