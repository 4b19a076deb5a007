//! Breadcrumb store facade.

use crate::codec::RecordCodec;
use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::reader::BreadcrumbReader;
use crate::ring::RingFile;
use crate::types::{Breadcrumb, BreadcrumbId, BreadcrumbType, NewBreadcrumb};
use crumbstore_storage::FileBackend;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Directory that holds the breadcrumb log under an application directory.
pub const BREADCRUMBS_DIR: &str = "breadcrumbs";

/// File name of the breadcrumb log.
pub const BREADCRUMBS_FILE: &str = "bt-breadcrumbs-0";

/// Message of the record written whenever the log is (re)initialized.
pub const CONFIGURATION_MESSAGE: &str = "Breadcrumbs configuration";

/// Returns the conventional breadcrumb log location under `dir`.
#[must_use]
pub fn breadcrumb_log_path(dir: impl AsRef<Path>) -> PathBuf {
    dir.as_ref().join(BREADCRUMBS_DIR).join(BREADCRUMBS_FILE)
}

/// Lifecycle state of a [`BreadcrumbStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Created, never opened.
    Uninitialized,
    /// Accepting breadcrumbs.
    Open,
    /// Closed; may be opened again.
    Closed,
}

type AddListener = Arc<dyn Fn(BreadcrumbId) + Send + Sync>;

struct Inner {
    state: StoreState,
    ring: Option<RingFile>,
    next_id: u64,
    enabled_types: BTreeSet<BreadcrumbType>,
}

/// A persistent, size-bounded breadcrumb log.
///
/// `BreadcrumbStore` owns the id counter and the ring file. Every
/// operation that touches either runs under one mutex, so ids are assigned
/// in the same order records land in the file.
///
/// Operations that return `bool` never panic and never surface errors: a
/// failure is logged and reported as `false`. The `try_*` variants return
/// the underlying [`StoreError`].
///
/// # Example
///
/// ```rust,ignore
/// use crumbstore_core::{BreadcrumbStore, Config, NewBreadcrumb, BreadcrumbLevel};
///
/// let store = BreadcrumbStore::open_at("app/breadcrumbs/bt-breadcrumbs-0", Config::default())?;
/// store.add("User tapped login");
/// store.add(NewBreadcrumb::new("Request failed").attribute("status", "503").level(BreadcrumbLevel::Error));
///
/// for breadcrumb in store.reader()? {
///     println!("{} {}", breadcrumb.id, breadcrumb.message);
/// }
/// ```
pub struct BreadcrumbStore {
    path: PathBuf,
    config: Config,
    codec: RecordCodec,
    inner: Mutex<Inner>,
    listener: RwLock<Option<AddListener>>,
}

impl BreadcrumbStore {
    /// Creates a store for the log at `path`. No I/O happens until
    /// [`open`](Self::open).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        let codec = RecordCodec::new(config.max_message_chars, config.max_attributes_bytes);
        let enabled_types = config.enabled_types.clone();
        Self {
            path: path.into(),
            config,
            codec,
            inner: Mutex::new(Inner {
                state: StoreState::Uninitialized,
                ring: None,
                next_id: 0,
                enabled_types,
            }),
            listener: RwLock::new(None),
        }
    }

    /// Creates and opens a store in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be opened.
    pub fn open_at(path: impl Into<PathBuf>, config: Config) -> StoreResult<Self> {
        let store = Self::new(path, config);
        store.try_open()?;
        Ok(store)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Opens the log. Returns `false` if it could not be opened.
    pub fn open(&self) -> bool {
        match self.try_open() {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to open breadcrumb log");
                false
            }
        }
    }

    /// Opens or creates the log file and recovers its contents.
    ///
    /// The id counter continues after the newest retained breadcrumb unless
    /// [`set_next_id`](Self::set_next_id) seeded a larger value. A
    /// configuration breadcrumb is written if none is retained. Opening an
    /// open store does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is locked by another owner or I/O
    /// fails.
    pub fn try_open(&self) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.state == StoreState::Open {
            return Ok(());
        }

        let backend = FileBackend::open_with_create_dirs(&self.path)?;
        let ring = RingFile::open(
            Box::new(backend),
            Some(self.config.effective_capacity()),
            self.config.sync_on_write,
        )?;

        let mut newest: Option<u64> = None;
        let mut has_configuration = false;
        for payload in ring.frames()? {
            match RecordCodec::decode(&payload) {
                Ok(breadcrumb) => {
                    newest = newest.max(Some(breadcrumb.id.as_u64()));
                    has_configuration |= breadcrumb.kind == BreadcrumbType::Configuration;
                }
                Err(e) => debug!(error = %e, "skipping undecodable breadcrumb on open"),
            }
        }
        if let Some(newest) = newest {
            inner.next_id = inner.next_id.max(newest.saturating_add(1));
        }

        let previous = inner.state;
        inner.ring = Some(ring);
        inner.state = StoreState::Open;

        if !has_configuration {
            let draft = configuration_breadcrumb(&inner.enabled_types);
            if let Err(e) = self.append_locked(&mut inner, &draft) {
                inner.ring = None;
                inner.state = previous;
                return Err(e);
            }
        }

        debug!(
            path = %self.path.display(),
            next_id = inner.next_id,
            "opened breadcrumb log"
        );
        Ok(())
    }

    /// Closes the log and releases the file. Idempotent.
    pub fn close(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == StoreState::Open {
            inner.ring = None;
            inner.state = StoreState::Closed;
            debug!(path = %self.path.display(), "closed breadcrumb log");
        }
        true
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> StoreState {
        self.inner.lock().state
    }

    /// Returns `true` if the store accepts breadcrumbs.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == StoreState::Open
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Records a breadcrumb. Returns `false` if the store is not open or
    /// the write failed.
    pub fn add(&self, breadcrumb: impl Into<NewBreadcrumb>) -> bool {
        match self.try_add(breadcrumb) {
            Ok(_) => true,
            Err(StoreError::NotOpen) => {
                debug!("breadcrumb dropped, log is not open");
                false
            }
            Err(e) => {
                warn!(error = %e, "failed to add breadcrumb");
                false
            }
        }
    }

    /// Records a breadcrumb and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotOpen`] outside the open state,
    /// [`StoreError::CapacityExceeded`] if the bounded record alone does
    /// not fit the ring, [`StoreError::IdExhausted`] once the counter sits
    /// at `u64::MAX`, or an I/O error.
    pub fn try_add(&self, breadcrumb: impl Into<NewBreadcrumb>) -> StoreResult<BreadcrumbId> {
        let draft = breadcrumb.into();
        let id = {
            let mut inner = self.inner.lock();
            self.append_locked(&mut inner, &draft)?
        };

        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener(id);
        }
        Ok(id)
    }

    /// Drops every breadcrumb and writes a fresh configuration breadcrumb.
    pub fn clear(&self) -> bool {
        match self.try_clear() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to clear breadcrumbs");
                false
            }
        }
    }

    /// Fallible form of [`clear`](Self::clear).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotOpen`] outside the open state or an I/O
    /// error.
    pub fn try_clear(&self) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.ring.as_mut().ok_or(StoreError::NotOpen)?.clear()?;
        info!(path = %self.path.display(), "cleared breadcrumbs");

        let draft = configuration_breadcrumb(&inner.enabled_types);
        self.append_locked(&mut inner, &draft)?;
        Ok(())
    }

    /// Replaces the set of enabled breadcrumb types.
    ///
    /// When the set changes on an open store a configuration breadcrumb
    /// recording the new set is written. Returns `false` only if that write
    /// failed.
    pub fn set_enabled_types(&self, types: impl IntoIterator<Item = BreadcrumbType>) -> bool {
        let types: BTreeSet<_> = types.into_iter().collect();
        let mut inner = self.inner.lock();
        if inner.enabled_types == types {
            return true;
        }
        inner.enabled_types = types;
        if inner.state != StoreState::Open {
            return true;
        }

        let draft = configuration_breadcrumb(&inner.enabled_types);
        match self.append_locked(&mut inner, &draft) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "failed to record breadcrumb configuration");
                false
            }
        }
    }

    /// Returns the enabled breadcrumb types.
    #[must_use]
    pub fn enabled_types(&self) -> BTreeSet<BreadcrumbType> {
        self.inner.lock().enabled_types.clone()
    }

    /// Registers a callback invoked with the id of every breadcrumb added
    /// through [`add`](Self::add) or [`try_add`](Self::try_add).
    ///
    /// The callback runs after the store lock is released.
    pub fn set_add_listener<F>(&self, listener: F)
    where
        F: Fn(BreadcrumbId) + Send + Sync + 'static,
    {
        *self.listener.write() = Some(Arc::new(listener));
    }

    /// Removes the add listener.
    pub fn clear_add_listener(&self) {
        *self.listener.write() = None;
    }

    /// Seeds the id counter; the next breadcrumb gets `id`.
    pub fn set_next_id(&self, id: u64) {
        self.inner.lock().next_id = id;
    }

    /// Returns the id the next breadcrumb will get.
    #[must_use]
    pub fn current_id(&self) -> BreadcrumbId {
        BreadcrumbId::new(self.inner.lock().next_id)
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Snapshots the retained breadcrumbs for iteration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotOpen`] outside the open state or an I/O
    /// error.
    pub fn reader(&self) -> StoreResult<BreadcrumbReader> {
        let frames = {
            let inner = self.inner.lock();
            inner.ring.as_ref().ok_or(StoreError::NotOpen)?.frames()?
        };
        Ok(BreadcrumbReader::from_frames(frames))
    }

    /// Returns the retained breadcrumbs, oldest first. Empty if the log is
    /// not open or cannot be read.
    #[must_use]
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        match self.reader() {
            Ok(reader) => reader.collect(),
            Err(e) => {
                debug!(error = %e, "no breadcrumbs to read");
                Vec::new()
            }
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bytes occupied by retained breadcrumbs; 0 when not open.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.inner.lock().ring.as_ref().map_or(0, RingFile::size_bytes)
    }

    /// Number of retained breadcrumbs; 0 when not open.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().ring.as_ref().map_or(0, RingFile::len)
    }

    /// Returns `true` if no breadcrumbs are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assigns an id, bounds, encodes and appends. The id is consumed only
    /// if the append succeeds.
    fn append_locked(&self, inner: &mut Inner, draft: &NewBreadcrumb) -> StoreResult<BreadcrumbId> {
        let ring = inner.ring.as_mut().ok_or(StoreError::NotOpen)?;
        let id = BreadcrumbId::new(inner.next_id);
        let next_id = inner.next_id.checked_add(1).ok_or(StoreError::IdExhausted)?;
        let breadcrumb = self.codec.bound(id, now_millis(), draft);
        let payload = RecordCodec::encode(&breadcrumb)?;

        let evicted = ring.append(&payload)?;
        if evicted > 0 {
            debug!(evicted, "evicted oldest breadcrumbs");
        }
        inner.next_id = next_id;
        Ok(id)
    }
}

impl std::fmt::Debug for BreadcrumbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreadcrumbStore")
            .field("path", &self.path)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn configuration_breadcrumb(enabled: &BTreeSet<BreadcrumbType>) -> NewBreadcrumb {
    NewBreadcrumb::new(CONFIGURATION_MESSAGE)
        .kind(BreadcrumbType::Configuration)
        .attributes(BreadcrumbType::ALL.iter().map(|kind| {
            let state = if enabled.contains(kind) { "enabled" } else { "disabled" };
            (kind.as_str(), state)
        }))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BreadcrumbLevel;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::{tempdir, TempDir};

    fn open_store(config: Config) -> (TempDir, BreadcrumbStore) {
        let dir = tempdir().unwrap();
        let store = BreadcrumbStore::open_at(breadcrumb_log_path(dir.path()), config).unwrap();
        (dir, store)
    }

    fn fast() -> Config {
        Config::default().sync_on_write(false)
    }

    #[test]
    fn conventional_log_path() {
        let path = breadcrumb_log_path("/data/app");
        assert_eq!(path, Path::new("/data/app/breadcrumbs/bt-breadcrumbs-0"));
    }

    #[test]
    fn open_writes_configuration_first() {
        let (_dir, store) = open_store(Config::default());
        assert!(store.path().exists());
        assert!(store.add("Test"));

        let crumbs = store.breadcrumbs();
        assert_eq!(crumbs.len(), 2);
        assert_eq!(crumbs[0].kind, BreadcrumbType::Configuration);
        assert_eq!(crumbs[0].message, CONFIGURATION_MESSAGE);
        assert_eq!(crumbs[0].id, BreadcrumbId::new(0));
        assert_eq!(crumbs[1].message, "Test");
        assert_eq!(crumbs[1].kind, BreadcrumbType::Manual);
        assert_eq!(crumbs[1].level, BreadcrumbLevel::Info);
        assert_eq!(crumbs[1].id, BreadcrumbId::new(1));
    }

    #[test]
    fn configuration_lists_every_type() {
        let config = fast().enabled_types([BreadcrumbType::Manual, BreadcrumbType::Http]);
        let (_dir, store) = open_store(config);

        let configuration = &store.breadcrumbs()[0];
        assert_eq!(configuration.attributes.len(), BreadcrumbType::ALL.len());
        assert_eq!(configuration.attribute("manual"), Some("enabled"));
        assert_eq!(configuration.attribute("http"), Some("enabled"));
        assert_eq!(configuration.attribute("navigation"), Some("disabled"));
        assert_eq!(configuration.attribute("configuration"), Some("disabled"));
    }

    #[test]
    fn clear_leaves_only_configuration() {
        let (_dir, store) = open_store(fast());
        store.add("one");
        store.add("two");

        assert!(store.clear());
        let crumbs = store.breadcrumbs();
        assert_eq!(crumbs.len(), 1);
        assert_eq!(crumbs[0].kind, BreadcrumbType::Configuration);
        // ids keep counting across a clear
        assert_eq!(crumbs[0].id, BreadcrumbId::new(3));
    }

    #[test]
    fn closed_store_rejects_writes() {
        let dir = tempdir().unwrap();
        let store = BreadcrumbStore::new(breadcrumb_log_path(dir.path()), fast());
        assert_eq!(store.state(), StoreState::Uninitialized);
        assert!(!store.add("too early"));
        assert!(matches!(store.try_add("too early"), Err(StoreError::NotOpen)));
        assert!(!store.clear());
        assert!(store.breadcrumbs().is_empty());

        assert!(store.open());
        assert!(store.open());
        assert!(store.close());
        assert!(store.close());
        assert_eq!(store.state(), StoreState::Closed);
        assert!(!store.add("too late"));
        assert_eq!(store.size_bytes(), 0);
    }

    #[test]
    fn reopen_continues_ids() {
        let dir = tempdir().unwrap();
        let path = breadcrumb_log_path(dir.path());

        let store = BreadcrumbStore::open_at(&path, Config::default()).unwrap();
        store.add("before");
        assert!(store.close());
        drop(store);

        let store = BreadcrumbStore::open_at(&path, Config::default()).unwrap();
        assert_eq!(store.current_id(), BreadcrumbId::new(2));
        store.add("after");

        let crumbs = store.breadcrumbs();
        let messages: Vec<&str> = crumbs.iter().map(|c| c.message.as_str()).collect();
        // configuration is retained, so none is added on reopen
        assert_eq!(messages, vec![CONFIGURATION_MESSAGE, "before", "after"]);
        assert_eq!(crumbs[2].id, BreadcrumbId::new(2));
    }

    #[test]
    fn same_store_can_reopen_after_close() {
        let (_dir, store) = open_store(fast());
        store.add("first session");
        store.close();

        assert!(store.open());
        store.add("second session");
        assert_eq!(store.breadcrumbs().len(), 3);
    }

    #[test]
    fn second_owner_is_locked_out() {
        let (_dir, store) = open_store(fast());
        let other = BreadcrumbStore::new(store.path(), fast());
        assert!(matches!(
            other.try_open(),
            Err(StoreError::Storage(crumbstore_storage::StorageError::Locked { .. }))
        ));
        assert!(!other.open());
        assert_eq!(other.state(), StoreState::Uninitialized);
    }

    #[test]
    fn seeded_counter_wins_when_larger() {
        let dir = tempdir().unwrap();
        let store = BreadcrumbStore::new(breadcrumb_log_path(dir.path()), fast());
        store.set_next_id(100);
        assert!(store.open());

        let crumbs = store.breadcrumbs();
        assert_eq!(crumbs[0].id, BreadcrumbId::new(100));
        assert_eq!(store.try_add("next").unwrap(), BreadcrumbId::new(101));
    }

    #[test]
    fn failed_add_does_not_consume_id() {
        let config = fast().capacity_bytes(4096).max_message_chars(10_000);
        let (_dir, store) = open_store(config);
        let before = store.current_id();

        let result = store.try_add("x".repeat(5000));
        assert!(matches!(result, Err(StoreError::CapacityExceeded { .. })));
        assert_eq!(store.current_id(), before);
        assert_eq!(store.breadcrumbs().len(), 1);
        assert_eq!(store.try_add("fits").unwrap(), before);
    }

    #[test]
    fn exhausted_ids_reject_adds_without_mutation() {
        let (_dir, store) = open_store(fast());
        store.set_next_id(u64::MAX);
        let before = store.breadcrumbs();
        let size = store.size_bytes();

        assert!(!store.add("last id"));
        assert!(matches!(store.try_add("last id"), Err(StoreError::IdExhausted)));
        assert_eq!(store.current_id(), BreadcrumbId::new(u64::MAX));
        assert_eq!(store.breadcrumbs(), before);
        assert_eq!(store.size_bytes(), size);

        store.set_next_id(u64::MAX - 1);
        assert_eq!(store.try_add("final").unwrap(), BreadcrumbId::new(u64::MAX - 1));
        assert!(!store.add("one too many"));
    }

    #[test]
    fn rollover_keeps_size_bounded() {
        let config = fast().capacity_bytes(4096);
        let (_dir, store) = open_store(config);
        for i in 0..200 {
            assert!(store.add(format!("breadcrumb number {i}")));
            assert!(store.size_bytes() <= 4096);
        }

        let crumbs = store.breadcrumbs();
        assert!(crumbs.len() < 200);
        assert_eq!(crumbs.last().unwrap().message, "breadcrumb number 199");
        for pair in crumbs.windows(2) {
            assert_eq!(pair[0].id.next(), pair[1].id);
        }
    }

    #[test]
    fn small_capacity_is_clamped() {
        let (_dir, store) = open_store(fast().capacity_bytes(16));
        assert!(store.add("fits in the minimum ring"));
        let size = std::fs::metadata(store.path()).unwrap().len();
        assert_eq!(size, crate::ring::DATA_OFFSET + u64::from(crate::config::MIN_CAPACITY_BYTES));
    }

    #[test]
    fn changing_enabled_types_records_configuration() {
        let (_dir, store) = open_store(fast());
        assert!(store.set_enabled_types(BreadcrumbType::ALL));
        assert_eq!(store.len(), 1);

        assert!(store.set_enabled_types([BreadcrumbType::Manual]));
        let crumbs = store.breadcrumbs();
        assert_eq!(crumbs.len(), 2);
        assert_eq!(crumbs[1].kind, BreadcrumbType::Configuration);
        assert_eq!(crumbs[1].attribute("system"), Some("disabled"));
        assert_eq!(store.enabled_types().len(), 1);
    }

    #[test]
    fn listener_sees_added_ids() {
        let (_dir, store) = open_store(fast());
        let last = Arc::new(AtomicU64::new(u64::MAX));
        let seen = Arc::clone(&last);
        store.set_add_listener(move |id| seen.store(id.as_u64(), Ordering::SeqCst));

        let id = store.try_add("observed").unwrap();
        assert_eq!(last.load(Ordering::SeqCst), id.as_u64());

        store.clear_add_listener();
        store.add("unobserved");
        assert_eq!(last.load(Ordering::SeqCst), id.as_u64());
    }

    #[test]
    fn listener_may_call_back_into_store() {
        let (_dir, store) = open_store(fast());
        let store = Arc::new(store);
        let observed = Arc::new(AtomicU64::new(0));

        let inner_store = Arc::downgrade(&store);
        let inner_observed = Arc::clone(&observed);
        store.set_add_listener(move |_| {
            if let Some(store) = inner_store.upgrade() {
                inner_observed.store(store.len() as u64, Ordering::SeqCst);
            }
        });

        store.add("reentrant");
        assert_eq!(observed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn attributes_and_level_are_stored() {
        let (_dir, store) = open_store(fast());
        store.add(
            NewBreadcrumb::new("GET /api")
                .kind(BreadcrumbType::Http)
                .level(BreadcrumbLevel::Warning)
                .attribute("status", "404"),
        );

        let crumb = store.breadcrumbs().pop().unwrap();
        assert_eq!(crumb.kind, BreadcrumbType::Http);
        assert_eq!(crumb.level, BreadcrumbLevel::Warning);
        assert_eq!(crumb.attribute("status"), Some("404"));
        assert!(crumb.timestamp > 0);
    }
}
