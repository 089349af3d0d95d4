//! Store handle: the connection lifecycle of one namespace
//!
//! A `StoreHandle` owns at most one connection. `open()` returns the cached
//! connection when there is one; otherwise it opens the namespace at the
//! configured version and, if the engine asks for an upgrade, runs the
//! handle's [`UpgradeHooks`] inside the version change before committing.
//!
//! The connection slot is an async mutex held across the whole
//! establishment, so concurrent `open()` calls wait for the first and then
//! share its connection: one engine open, one round of partition creation.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use cairn_core::{Error, Result};
use cairn_storage::{Connection, Engine, OpenOutcome, VersionChange};

/// Callbacks run inside a version change
pub trait UpgradeHooks: Send + Sync {
    /// First creation of the namespace (`old_version == 0`)
    fn create(&self, change: &mut dyn VersionChange) -> Result<()>;

    /// Version increase of an existing namespace (`old_version > 0`)
    fn migrate(&self, change: &mut dyn VersionChange) -> Result<()>;
}

/// User-supplied migration between two versions
///
/// Any `Fn(&mut dyn VersionChange, old, new) -> Result<()>` closure is a
/// migration.
pub trait Migration: Send + Sync {
    /// Bring the staged namespace from `old_version` to `new_version`
    fn migrate(
        &self,
        change: &mut dyn VersionChange,
        old_version: u32,
        new_version: u32,
    ) -> Result<()>;
}

impl<F> Migration for F
where
    F: Fn(&mut dyn VersionChange, u32, u32) -> Result<()> + Send + Sync,
{
    fn migrate(
        &self,
        change: &mut dyn VersionChange,
        old_version: u32,
        new_version: u32,
    ) -> Result<()> {
        self(change, old_version, new_version)
    }
}

/// Run `migration`, or fail the upgrade when there is none
pub(crate) fn run_migration(
    migration: Option<&dyn Migration>,
    change: &mut dyn VersionChange,
) -> Result<()> {
    let namespace = change.namespace().to_string();
    let (old_version, new_version) = (change.old_version(), change.new_version());

    match migration {
        Some(migration) => {
            info!(
                target: "cairn::store",
                namespace = %namespace,
                old_version,
                new_version,
                "Running migration"
            );
            migration.migrate(change, old_version, new_version)
        }
        None => {
            error!(
                target: "cairn::store",
                namespace = %namespace,
                old_version,
                new_version,
                "Version increased but no migration is registered"
            );
            Err(Error::Migration {
                namespace,
                old_version,
                new_version,
                reason: "no migration registered".to_string(),
            })
        }
    }
}

/// Connection lifecycle of one namespace
pub struct StoreHandle {
    engine: Arc<dyn Engine>,
    namespace: String,
    version: RwLock<Option<u32>>,
    hooks: Arc<dyn UpgradeHooks>,
    connection: Mutex<Option<Arc<dyn Connection>>>,
    opened: AtomicBool,
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("namespace", &self.namespace)
            .field("version", &*self.version.read())
            .field("opened", &self.opened.load(Ordering::Acquire))
            .finish()
    }
}

impl StoreHandle {
    /// Create a handle; nothing is opened yet
    ///
    /// # Errors
    ///
    /// `Capability` if the engine reports itself unavailable.
    pub fn new(
        engine: Arc<dyn Engine>,
        namespace: impl Into<String>,
        version: Option<u32>,
        hooks: Arc<dyn UpgradeHooks>,
    ) -> Result<Self> {
        let namespace = namespace.into();
        if !engine.is_available() {
            error!(target: "cairn::store", namespace = %namespace, "Storage engine unavailable");
            return Err(Error::Capability {
                reason: format!("storage engine unavailable for namespace '{}'", namespace),
            });
        }

        Ok(StoreHandle {
            engine,
            namespace,
            version: RwLock::new(version),
            hooks,
            connection: Mutex::new(None),
            opened: AtomicBool::new(false),
        })
    }

    /// Namespace this handle manages
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Version used by the next open; `None` opens at the stored version
    pub fn version(&self) -> Option<u32> {
        *self.version.read()
    }

    /// Change the version used by subsequent opens
    ///
    /// The current connection, if any, is unaffected until `reopen()`.
    pub fn set_version(&self, version: u32) {
        *self.version.write() = Some(version);
    }

    /// Whether `open()` has succeeded on this handle since it was created or
    /// last deleted
    pub fn has_been_opened(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    /// Whether a live connection is cached
    pub async fn is_open(&self) -> bool {
        self.connection
            .lock()
            .await
            .as_ref()
            .is_some_and(|conn| !conn.is_closed())
    }

    /// The cached connection, or a new one
    ///
    /// # Errors
    ///
    /// `Connection` when the engine rejects the open or the commit;
    /// `Migration` (or a hook's own error) when an upgrade hook fails, in
    /// which case the upgrade is aborted.
    pub async fn open(&self) -> Result<Arc<dyn Connection>> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            if !conn.is_closed() {
                return Ok(Arc::clone(conn));
            }
        }

        let version = self.version();
        let outcome = self
            .engine
            .open(&self.namespace, version)
            .await
            .map_err(|e| {
                error!(
                    target: "cairn::store",
                    namespace = %self.namespace,
                    ?version,
                    error = %e,
                    "Error opening namespace"
                );
                Error::connection(&self.namespace, e)
            })?;

        let conn = match outcome {
            OpenOutcome::Ready(conn) => conn,
            OpenOutcome::UpgradeNeeded(mut change) => {
                let (old_version, new_version) = (change.old_version(), change.new_version());
                info!(
                    target: "cairn::store",
                    namespace = %self.namespace,
                    old_version,
                    new_version,
                    "Upgrade needed"
                );

                let hooked = if old_version == 0 {
                    self.hooks.create(change.as_mut())
                } else {
                    self.hooks.migrate(change.as_mut())
                };
                // Dropping `change` on error aborts the upgrade.
                hooked?;

                change
                    .commit()
                    .await
                    .map_err(|e| Error::connection(&self.namespace, e))?
            }
        };

        debug!(
            target: "cairn::store",
            namespace = %self.namespace,
            version = conn.version(),
            "Namespace open"
        );
        self.opened.store(true, Ordering::Release);
        *slot = Some(Arc::clone(&conn));
        Ok(conn)
    }

    /// Release the cached connection; idempotent
    pub async fn close(&self) {
        if let Some(conn) = self.connection.lock().await.take() {
            conn.close();
            debug!(target: "cairn::store", namespace = %self.namespace, "Namespace closed");
        }
    }

    /// `close()` then `open()`
    pub async fn reopen(&self) -> Result<Arc<dyn Connection>> {
        self.close().await;
        self.open().await
    }

    /// Close, then destroy the namespace and all its data
    ///
    /// # Errors
    ///
    /// `Deletion` when the engine refuses, typically because another
    /// connection to the namespace is open elsewhere. Not retried.
    pub async fn delete(&self) -> Result<()> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.take() {
            conn.close();
        }

        self.engine
            .delete_namespace(&self.namespace)
            .await
            .map_err(|e| {
                error!(
                    target: "cairn::store",
                    namespace = %self.namespace,
                    error = %e,
                    "Error deleting namespace"
                );
                Error::deletion(&self.namespace, e)
            })?;

        self.opened.store(false, Ordering::Release);
        info!(target: "cairn::store", namespace = %self.namespace, "Namespace deleted");
        Ok(())
    }
}
