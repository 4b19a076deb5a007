//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up breadcrumb stores in
//! temporary directories.

use crumbstore_core::{breadcrumb_log_path, BreadcrumbStore, Config};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A breadcrumb store in a temporary directory, removed on drop.
pub struct TestStore {
    /// The store instance.
    pub store: BreadcrumbStore,
    config: Config,
    temp_dir: TempDir,
}

impl TestStore {
    /// Creates and opens a store with the default configuration, but
    /// without a sync per write.
    pub fn new() -> Self {
        Self::with_config(Config::default().sync_on_write(false))
    }

    /// Creates and opens a store with `config`.
    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = BreadcrumbStore::open_at(breadcrumb_log_path(temp_dir.path()), config.clone())
            .expect("Failed to open breadcrumb store");
        Self {
            store,
            config,
            temp_dir,
        }
    }

    /// Returns the temporary application directory.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the log file path.
    pub fn log_path(&self) -> PathBuf {
        self.store.path().to_path_buf()
    }

    /// Closes the store and opens a fresh instance on the same file, as
    /// a restarted process would.
    pub fn reopen(&mut self) {
        assert!(self.store.close(), "Failed to close breadcrumb store");
        self.store = BreadcrumbStore::open_at(self.log_path(), self.config.clone())
            .expect("Failed to reopen breadcrumb store");
    }

    /// Closes the store, runs `f` on the raw log file, then reopens.
    pub fn with_closed_file<F>(&mut self, f: F)
    where
        F: FnOnce(&Path),
    {
        assert!(self.store.close(), "Failed to close breadcrumb store");
        f(&self.log_path());
        self.store = BreadcrumbStore::open_at(self.log_path(), self.config.clone())
            .expect("Failed to reopen breadcrumb store");
    }

    /// Messages of the retained breadcrumbs, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.store
            .breadcrumbs()
            .into_iter()
            .map(|b| b.message)
            .collect()
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = BreadcrumbStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary store.
///
/// # Example
///
/// ```rust,ignore
/// use crumbstore_testkit::with_temp_store;
///
/// #[test]
/// fn my_test() {
///     with_temp_store(|store| {
///         store.add("tapped button");
///     });
/// }
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&BreadcrumbStore) -> R,
{
    let test_store = TestStore::new();
    f(&test_store.store)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a store holding `count` manual breadcrumbs named
    /// `"breadcrumb {i}"` after its configuration breadcrumb.
    pub fn populated_store(count: usize) -> TestStore {
        let test_store = TestStore::new();
        for i in 0..count {
            assert!(test_store.add(format!("breadcrumb {i}")));
        }
        test_store
    }
}
