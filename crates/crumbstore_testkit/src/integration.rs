//! Cross-crate integration scenarios.
//!
//! Exercises the store, the ring file and the reader together through
//! the public API only.

use crate::fixtures::TestStore;
use crumbstore_core::{BreadcrumbType, CONFIGURATION_MESSAGE};

/// Tracks every message added so the retained log can be checked against
/// the FIFO model: whatever survives is a suffix of what was added.
pub struct IntegrationHarness {
    /// The store under test.
    pub store: TestStore,
    added: Vec<String>,
}

impl IntegrationHarness {
    /// Creates a harness around `store`.
    pub fn new(store: TestStore) -> Self {
        Self {
            store,
            added: Vec::new(),
        }
    }

    /// Adds a breadcrumb and records its message.
    pub fn add(&mut self, message: impl Into<String>) {
        let message = message.into();
        assert!(self.store.add(message.as_str()), "Failed to add {message:?}");
        self.added.push(message);
    }

    /// Number of tracked adds.
    pub fn tracked_count(&self) -> usize {
        self.added.len()
    }

    /// Asserts the retained manual breadcrumbs are the newest adds, in
    /// order, with contiguous ids.
    pub fn verify_suffix(&self) {
        let crumbs = self.store.breadcrumbs();
        let retained: Vec<&str> = crumbs
            .iter()
            .filter(|c| c.kind != BreadcrumbType::Configuration)
            .map(|c| c.message.as_str())
            .collect();
        assert!(retained.len() <= self.added.len());
        let expected: Vec<&str> = self.added[self.added.len() - retained.len()..]
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(retained, expected, "Retained breadcrumbs are not the newest adds");

        for pair in crumbs.windows(2) {
            assert_eq!(pair[0].id.next(), pair[1].id, "Ids are not contiguous");
        }
    }
}
