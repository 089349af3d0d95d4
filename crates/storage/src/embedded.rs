//! In-process engine
//!
//! `EmbeddedEngine` keeps every namespace in memory. In durable mode each
//! namespace is also written to a snapshot file in the engine directory after
//! every committed change, and loaded lazily on first use.
//!
//! # Locking
//!
//! - The namespace registry mutex is held for the whole of `open` and
//!   `delete_namespace`, so a namespace cannot be deleted between being looked
//!   up and being opened.
//! - Each namespace has a lifecycle mutex (open connection count, pending
//!   upgrade) and a state `RwLock`. Lock order: registry, lifecycle, state.
//! - No lock is held across an `.await`.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use cairn_core::{StorageError, StorageResult, Value};

use crate::engine::{Connection, Engine, OpenOutcome, VersionChange};
use crate::partition::{NamespaceState, Partition};
use crate::snapshot;

/// Lock file placed in a durable engine directory
pub const LOCK_FILE_NAME: &str = ".lock";

/// Where namespaces are kept
#[derive(Debug)]
enum Persistence {
    /// Process memory only
    Ephemeral,
    /// Snapshot files in `dir`, guarded by an exclusive lock file
    Durable {
        dir: PathBuf,
        // Held for the lifetime of the engine; the lock is released on drop.
        _lock: File,
    },
}

#[derive(Debug, Default)]
struct Lifecycle {
    open_connections: usize,
    upgrading: bool,
}

#[derive(Debug)]
struct Slot {
    name: String,
    lifecycle: Mutex<Lifecycle>,
    state: RwLock<NamespaceState>,
}

impl Slot {
    fn new(name: &str, state: NamespaceState) -> Self {
        Slot {
            name: name.to_string(),
            lifecycle: Mutex::new(Lifecycle::default()),
            state: RwLock::new(state),
        }
    }
}

#[derive(Debug)]
struct Shared {
    persistence: Persistence,
    namespaces: Mutex<HashMap<String, Arc<Slot>>>,
}

impl Shared {
    fn snapshot_path(&self, namespace: &str) -> Option<PathBuf> {
        match &self.persistence {
            Persistence::Ephemeral => None,
            Persistence::Durable { dir, .. } => Some(snapshot::snapshot_path(dir, namespace)),
        }
    }

    fn is_durable(&self) -> bool {
        matches!(self.persistence, Persistence::Durable { .. })
    }

    fn persist(&self, namespace: &str, state: &NamespaceState) -> StorageResult<()> {
        if let Some(path) = self.snapshot_path(namespace) {
            snapshot::persist(&path, state)?;
            debug!(
                target: "cairn::engine",
                namespace,
                version = state.version,
                path = %path.display(),
                "Snapshot written"
            );
        }
        Ok(())
    }

    /// Registry entry for `namespace`, loading it from disk on first use
    fn slot(
        &self,
        registry: &mut HashMap<String, Arc<Slot>>,
        namespace: &str,
    ) -> StorageResult<Arc<Slot>> {
        if let Some(slot) = registry.get(namespace) {
            return Ok(Arc::clone(slot));
        }

        let state = match self.snapshot_path(namespace) {
            Some(path) => match snapshot::load(&path)? {
                Some(state) => {
                    info!(
                        target: "cairn::engine",
                        namespace,
                        version = state.version,
                        partitions = state.partitions.len(),
                        "Namespace loaded"
                    );
                    state
                }
                None => NamespaceState::default(),
            },
            None => NamespaceState::default(),
        };

        let slot = Arc::new(Slot::new(namespace, state));
        registry.insert(namespace.to_string(), Arc::clone(&slot));
        Ok(slot)
    }
}

/// In-process object-store engine
///
/// Cloning is cheap; clones share the same namespaces.
///
/// # Example
///
/// ```
/// use cairn_storage::{Engine, EmbeddedEngine, OpenOutcome};
///
/// # tokio_test_block_on(async {
/// let engine = EmbeddedEngine::ephemeral();
/// match engine.open("orbit", None).await.unwrap() {
///     OpenOutcome::UpgradeNeeded(mut change) => {
///         assert_eq!(change.old_version(), 0);
///         change.create_partition("planet", Some("id")).unwrap();
///         let conn = change.commit().await.unwrap();
///         assert_eq!(conn.version(), 1);
///     }
///     OpenOutcome::Ready(_) => unreachable!(),
/// }
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddedEngine {
    shared: Arc<Shared>,
}

impl EmbeddedEngine {
    /// Engine that keeps everything in process memory
    pub fn ephemeral() -> Self {
        EmbeddedEngine {
            shared: Arc::new(Shared {
                persistence: Persistence::Ephemeral,
                namespaces: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Engine persisting namespaces as snapshot files under `dir`
    ///
    /// The directory is created if needed and locked exclusively for the
    /// lifetime of the engine.
    ///
    /// # Errors
    ///
    /// `Locked` if another engine holds the directory; `Io` on filesystem
    /// failures.
    pub fn open<P: AsRef<Path>>(dir: P) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let dir = dir.canonicalize()?;

        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(dir.join(LOCK_FILE_NAME))?;
        fs2::FileExt::try_lock_exclusive(&lock_file)
            .map_err(|_| StorageError::Locked { path: dir.clone() })?;

        info!(target: "cairn::engine", path = %dir.display(), "Engine directory opened");

        Ok(EmbeddedEngine {
            shared: Arc::new(Shared {
                persistence: Persistence::Durable {
                    dir,
                    _lock: lock_file,
                },
                namespaces: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Directory holding snapshot files, `None` for an ephemeral engine
    pub fn dir(&self) -> Option<&Path> {
        match &self.shared.persistence {
            Persistence::Ephemeral => None,
            Persistence::Durable { dir, .. } => Some(dir),
        }
    }

    /// Number of open connections to `namespace`
    pub fn open_connections(&self, namespace: &str) -> usize {
        self.shared
            .namespaces
            .lock()
            .get(namespace)
            .map_or(0, |slot| slot.lifecycle.lock().open_connections)
    }
}

#[async_trait]
impl Engine for EmbeddedEngine {
    fn is_available(&self) -> bool {
        match &self.shared.persistence {
            Persistence::Ephemeral => true,
            Persistence::Durable { dir, .. } => dir.is_dir(),
        }
    }

    async fn open(&self, namespace: &str, version: Option<u32>) -> StorageResult<OpenOutcome> {
        if version == Some(0) {
            return Err(StorageError::InvalidVersion { version: 0 });
        }

        let mut registry = self.shared.namespaces.lock();
        let slot = self.shared.slot(&mut registry, namespace)?;
        let mut lifecycle = slot.lifecycle.lock();
        let current = slot.state.read().version;
        let requested = version.unwrap_or(current.max(1));

        if requested < current {
            warn!(
                target: "cairn::engine",
                namespace,
                requested,
                current,
                "Open rejected: version too low"
            );
            return Err(StorageError::VersionTooLow {
                namespace: namespace.to_string(),
                requested,
                current,
            });
        }

        if lifecycle.upgrading {
            return Err(StorageError::Blocked {
                namespace: namespace.to_string(),
                reason: "a version change is pending".to_string(),
            });
        }

        if requested == current {
            lifecycle.open_connections += 1;
            debug!(
                target: "cairn::engine",
                namespace,
                version = current,
                connections = lifecycle.open_connections,
                "Connection opened"
            );
            let conn = EmbeddedConnection::new(Arc::clone(&self.shared), Arc::clone(&slot), current);
            return Ok(OpenOutcome::Ready(Arc::new(conn)));
        }

        if lifecycle.open_connections > 0 {
            warn!(
                target: "cairn::engine",
                namespace,
                connections = lifecycle.open_connections,
                "Upgrade blocked by open connections"
            );
            return Err(StorageError::Blocked {
                namespace: namespace.to_string(),
                reason: format!(
                    "{} open connection(s) prevent upgrade to version {}",
                    lifecycle.open_connections, requested
                ),
            });
        }

        lifecycle.upgrading = true;
        let staged = slot.state.read().clone();
        debug!(
            target: "cairn::engine",
            namespace,
            old_version = current,
            new_version = requested,
            "Version change started"
        );

        Ok(OpenOutcome::UpgradeNeeded(Box::new(EmbeddedVersionChange {
            shared: Arc::clone(&self.shared),
            slot: Arc::clone(&slot),
            old_version: current,
            new_version: requested,
            staged,
            committed: false,
        })))
    }

    async fn delete_namespace(&self, namespace: &str) -> StorageResult<()> {
        let mut registry = self.shared.namespaces.lock();

        if let Some(slot) = registry.get(namespace) {
            let lifecycle = slot.lifecycle.lock();
            if lifecycle.open_connections > 0 || lifecycle.upgrading {
                warn!(
                    target: "cairn::engine",
                    namespace,
                    connections = lifecycle.open_connections,
                    upgrading = lifecycle.upgrading,
                    "Delete blocked"
                );
                return Err(StorageError::Blocked {
                    namespace: namespace.to_string(),
                    reason: format!(
                        "{} open connection(s){}",
                        lifecycle.open_connections,
                        if lifecycle.upgrading {
                            ", version change pending"
                        } else {
                            ""
                        }
                    ),
                });
            }
        }

        registry.remove(namespace);
        if let Some(path) = self.shared.snapshot_path(namespace) {
            snapshot::remove(&path)?;
        }

        info!(target: "cairn::engine", namespace, "Namespace deleted");
        Ok(())
    }

    async fn namespace_version(&self, namespace: &str) -> StorageResult<Option<u32>> {
        let mut registry = self.shared.namespaces.lock();
        let slot = self.shared.slot(&mut registry, namespace)?;
        let version = slot.state.read().version;
        Ok((version > 0).then_some(version))
    }
}

// =============================================================================
// Connection
// =============================================================================

struct EmbeddedConnection {
    shared: Arc<Shared>,
    slot: Arc<Slot>,
    version: u32,
    closed: AtomicBool,
}

impl EmbeddedConnection {
    fn new(shared: Arc<Shared>, slot: Arc<Slot>, version: u32) -> Self {
        EmbeddedConnection {
            shared,
            slot,
            version,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::ConnectionClosed {
                namespace: self.slot.name.clone(),
            });
        }
        Ok(())
    }

    /// Mutate one partition and persist the namespace
    ///
    /// In durable mode the partition is restored if the snapshot write fails.
    fn write_partition<R>(
        &self,
        partition: &str,
        f: impl FnOnce(&mut Partition) -> StorageResult<R>,
    ) -> StorageResult<R> {
        self.ensure_open()?;
        let mut state = self.slot.state.write();
        let target = state.partition_mut(partition)?;
        let backup = self.shared.is_durable().then(|| target.clone());
        let out = f(target)?;

        if let Some(backup) = backup {
            if let Err(e) = self.shared.persist(&self.slot.name, &state) {
                warn!(
                    target: "cairn::engine",
                    namespace = %self.slot.name,
                    partition,
                    error = %e,
                    "Snapshot write failed, change reverted"
                );
                state.partitions.insert(partition.to_string(), backup);
                return Err(e);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl Connection for EmbeddedConnection {
    fn namespace(&self) -> &str {
        &self.slot.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn partition_names(&self) -> StorageResult<BTreeSet<String>> {
        self.ensure_open()?;
        Ok(self.slot.state.read().partitions.keys().cloned().collect())
    }

    async fn get(&self, partition: &str, key: &str) -> StorageResult<Option<Value>> {
        self.ensure_open()?;
        let state = self.slot.state.read();
        Ok(state.partition(partition)?.entries.get(key).cloned())
    }

    async fn scan(&self, partition: &str) -> StorageResult<Vec<(String, Value)>> {
        self.ensure_open()?;
        let state = self.slot.state.read();
        Ok(state.partition(partition)?.scan())
    }

    async fn put(&self, partition: &str, key: Option<&str>, value: Value) -> StorageResult<String> {
        self.write_partition(partition, |p| p.put(partition, key, value))
    }

    async fn delete(&self, partition: &str, key: &str) -> StorageResult<()> {
        self.write_partition(partition, |p| {
            p.entries.remove(key);
            Ok(())
        })
    }

    async fn clear(&self, partition: &str) -> StorageResult<()> {
        self.write_partition(partition, |p| {
            p.entries.clear();
            Ok(())
        })
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let mut lifecycle = self.slot.lifecycle.lock();
            lifecycle.open_connections = lifecycle.open_connections.saturating_sub(1);
            debug!(
                target: "cairn::engine",
                namespace = %self.slot.name,
                connections = lifecycle.open_connections,
                "Connection closed"
            );
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for EmbeddedConnection {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// Version change
// =============================================================================

struct EmbeddedVersionChange {
    shared: Arc<Shared>,
    slot: Arc<Slot>,
    old_version: u32,
    new_version: u32,
    staged: NamespaceState,
    committed: bool,
}

#[async_trait]
impl VersionChange for EmbeddedVersionChange {
    fn namespace(&self) -> &str {
        &self.slot.name
    }

    fn old_version(&self) -> u32 {
        self.old_version
    }

    fn new_version(&self) -> u32 {
        self.new_version
    }

    fn partition_names(&self) -> BTreeSet<String> {
        self.staged.partitions.keys().cloned().collect()
    }

    fn contains_partition(&self, name: &str) -> bool {
        self.staged.partitions.contains_key(name)
    }

    fn create_partition(&mut self, name: &str, key_path: Option<&str>) -> StorageResult<()> {
        self.staged.create_partition(name, key_path)
    }

    fn delete_partition(&mut self, name: &str) -> StorageResult<()> {
        self.staged.delete_partition(name)
    }

    fn rename_partition(&mut self, from: &str, to: &str) -> StorageResult<()> {
        self.staged.rename_partition(from, to)
    }

    fn scan(&self, partition: &str) -> StorageResult<Vec<(String, Value)>> {
        Ok(self.staged.partition(partition)?.scan())
    }

    fn put(&mut self, partition: &str, key: Option<&str>, value: Value) -> StorageResult<String> {
        self.staged.partition_mut(partition)?.put(partition, key, value)
    }

    fn delete(&mut self, partition: &str, key: &str) -> StorageResult<()> {
        self.staged.partition_mut(partition)?.entries.remove(key);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<Arc<dyn Connection>> {
        let mut this = self;
        let mut staged = std::mem::take(&mut this.staged);
        staged.version = this.new_version;

        // Disk first: a failed write leaves the committed state untouched and
        // the drop below aborts the change.
        this.shared.persist(&this.slot.name, &staged)?;

        let mut lifecycle = this.slot.lifecycle.lock();
        *this.slot.state.write() = staged;
        lifecycle.upgrading = false;
        lifecycle.open_connections += 1;
        this.committed = true;

        info!(
            target: "cairn::engine",
            namespace = %this.slot.name,
            old_version = this.old_version,
            new_version = this.new_version,
            "Version change committed"
        );

        Ok(Arc::new(EmbeddedConnection::new(
            Arc::clone(&this.shared),
            Arc::clone(&this.slot),
            this.new_version,
        )))
    }
}

impl Drop for EmbeddedVersionChange {
    fn drop(&mut self) {
        if !self.committed {
            self.slot.lifecycle.lock().upgrading = false;
            info!(
                target: "cairn::engine",
                namespace = %self.slot.name,
                old_version = self.old_version,
                new_version = self.new_version,
                "Version change aborted"
            );
        }
    }
}
