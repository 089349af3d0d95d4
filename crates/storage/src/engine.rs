//! Engine abstraction
//!
//! An engine hosts named namespaces. Each namespace has a version (>= 1) and a
//! set of partitions; each partition maps string keys to [`Value`]s in
//! ascending key order.
//!
//! Opening a namespace either yields a ready [`Connection`] or, when the
//! requested version is higher than the stored one, a [`VersionChange`]: the
//! only place partitions can be created, deleted or renamed. Changes made
//! through a `VersionChange` are staged and become visible on `commit()`.
//! Dropping it uncommitted aborts the upgrade.
//!
//! The engine is passed around as `Arc<dyn Engine>`; there is no global
//! instance.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use cairn_core::{StorageResult, Value};

/// A versioned object-store engine
#[async_trait]
pub trait Engine: Send + Sync {
    /// Whether the engine can be used in this environment
    fn is_available(&self) -> bool;

    /// Open `namespace`
    ///
    /// | Stored | `version` | Outcome |
    /// |--------|-----------|---------|
    /// | none | `None` / `Some(v)` | upgrade `0 -> 1` / `0 -> v` |
    /// | `s` | `None` or `Some(s)` | ready at `s` |
    /// | `s` | `Some(v)`, `v > s` | upgrade `s -> v` |
    /// | `s` | `Some(v)`, `v < s` | `VersionTooLow` |
    ///
    /// # Errors
    ///
    /// `InvalidVersion` for version 0. `Blocked` if an upgrade is pending,
    /// or if an upgrade is needed while other connections are open.
    async fn open(&self, namespace: &str, version: Option<u32>) -> StorageResult<OpenOutcome>;

    /// Destroy a namespace and everything in it
    ///
    /// Deleting an unknown namespace succeeds.
    ///
    /// # Errors
    ///
    /// `Blocked` while any connection is open or an upgrade is pending.
    async fn delete_namespace(&self, namespace: &str) -> StorageResult<()>;

    /// Stored version of `namespace`, `None` if it does not exist
    async fn namespace_version(&self, namespace: &str) -> StorageResult<Option<u32>>;
}

/// Result of [`Engine::open`]
pub enum OpenOutcome {
    /// The namespace is at the requested version
    Ready(Arc<dyn Connection>),
    /// The namespace must be upgraded before it can be used
    UpgradeNeeded(Box<dyn VersionChange>),
}

impl fmt::Debug for OpenOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenOutcome::Ready(conn) => f
                .debug_struct("Ready")
                .field("namespace", &conn.namespace())
                .field("version", &conn.version())
                .finish(),
            OpenOutcome::UpgradeNeeded(change) => f
                .debug_struct("UpgradeNeeded")
                .field("namespace", &change.namespace())
                .field("old_version", &change.old_version())
                .field("new_version", &change.new_version())
                .finish(),
        }
    }
}

/// An open connection to one namespace
///
/// Every request is its own transaction. Requests on a closed connection fail
/// with `ConnectionClosed`; requests naming an unknown partition fail with
/// `PartitionNotFound`.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Namespace this connection is bound to
    fn namespace(&self) -> &str;

    /// Version the namespace was opened at
    fn version(&self) -> u32;

    /// Names of all partitions
    fn partition_names(&self) -> StorageResult<BTreeSet<String>>;

    /// Read one value
    async fn get(&self, partition: &str, key: &str) -> StorageResult<Option<Value>>;

    /// Read every entry in ascending key order
    async fn scan(&self, partition: &str) -> StorageResult<Vec<(String, Value)>>;

    /// Write a value, overwriting any existing one; returns the key used
    ///
    /// Partitions created with a key path take the key from the value
    /// (`key` must be `None`); partitions without one require `key`.
    async fn put(&self, partition: &str, key: Option<&str>, value: Value) -> StorageResult<String>;

    /// Remove one entry; removing an absent key succeeds
    async fn delete(&self, partition: &str, key: &str) -> StorageResult<()>;

    /// Remove every entry of a partition
    async fn clear(&self, partition: &str) -> StorageResult<()>;

    /// Release the connection; idempotent
    fn close(&self);

    /// Whether `close` has been called
    fn is_closed(&self) -> bool;
}

impl fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("namespace", &self.namespace())
            .field("version", &self.version())
            .finish()
    }
}

/// A pending upgrade of one namespace
#[async_trait]
pub trait VersionChange: Send {
    /// Namespace being upgraded
    fn namespace(&self) -> &str;

    /// Stored version before the upgrade (0 for a new namespace)
    fn old_version(&self) -> u32;

    /// Version after commit
    fn new_version(&self) -> u32;

    /// Names of the staged partitions
    fn partition_names(&self) -> BTreeSet<String>;

    /// Whether a staged partition exists
    fn contains_partition(&self, name: &str) -> bool;

    /// Stage a new partition; `key_path` names the value field holding the key
    fn create_partition(&mut self, name: &str, key_path: Option<&str>) -> StorageResult<()>;

    /// Stage removal of a partition and its entries
    fn delete_partition(&mut self, name: &str) -> StorageResult<()>;

    /// Stage a rename, keeping entries
    fn rename_partition(&mut self, from: &str, to: &str) -> StorageResult<()>;

    /// Read every staged entry of a partition in ascending key order
    fn scan(&self, partition: &str) -> StorageResult<Vec<(String, Value)>>;

    /// Stage a write; same key rules as [`Connection::put`]
    fn put(&mut self, partition: &str, key: Option<&str>, value: Value) -> StorageResult<String>;

    /// Stage removal of one entry
    fn delete(&mut self, partition: &str, key: &str) -> StorageResult<()>;

    /// Apply the staged changes and return a ready connection
    async fn commit(self: Box<Self>) -> StorageResult<Arc<dyn Connection>>;
}
