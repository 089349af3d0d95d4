//! Record store: records kept one partition per type
//!
//! Layout: one partition per record type, named after the type, keyed by the
//! record's `id` field. Records are stored verbatim as object values.
//!
//! Every operation goes through the [`StoreHandle`], which opens the
//! namespace on demand.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info};

use cairn_core::{Error, Record, Result, Schema, StorageError};
use cairn_storage::{Engine, VersionChange};

use crate::handle::{run_migration, Migration, StoreHandle, UpgradeHooks};

/// Field of a stored record that holds its primary key
pub const RECORD_KEY_PATH: &str = "id";

/// Create a partition for every schema model that lacks one
///
/// Used when a namespace is first created; migrations can call it to pick up
/// models added in a schema upgrade.
pub fn create_missing_partitions(schema: &Schema, change: &mut dyn VersionChange) -> Result<()> {
    for model in schema.models() {
        if change.contains_partition(&model) {
            continue;
        }
        change
            .create_partition(&model, Some(RECORD_KEY_PATH))
            .map_err(|e| {
                error!(
                    target: "cairn::store",
                    namespace = change.namespace(),
                    partition = %model,
                    error = %e,
                    "Error creating partition"
                );
                Error::connection(change.namespace(), e)
            })?;
        info!(
            target: "cairn::store",
            namespace = change.namespace(),
            partition = %model,
            "Partition created"
        );
    }
    Ok(())
}

/// Upgrade hooks for a record namespace
struct RecordLayout {
    schema: Arc<Schema>,
    migration: Option<Arc<dyn Migration>>,
}

impl UpgradeHooks for RecordLayout {
    fn create(&self, change: &mut dyn VersionChange) -> Result<()> {
        create_missing_partitions(&self.schema, change)
    }

    fn migrate(&self, change: &mut dyn VersionChange) -> Result<()> {
        run_migration(self.migration.as_deref(), change)
    }
}

/// Get/put/remove/clear of records over a store handle
#[derive(Debug)]
pub struct RecordStore {
    handle: StoreHandle,
}

impl RecordStore {
    /// Create a record store
    ///
    /// `migration` runs when the namespace is opened at a higher version than
    /// stored; without one such an open fails with `Migration`.
    ///
    /// # Errors
    ///
    /// `Capability` if the engine is unavailable.
    pub fn new(
        engine: Arc<dyn Engine>,
        schema: Arc<Schema>,
        namespace: impl Into<String>,
        version: Option<u32>,
        migration: Option<Arc<dyn Migration>>,
    ) -> Result<Self> {
        let hooks = Arc::new(RecordLayout { schema, migration });
        let handle = StoreHandle::new(engine, namespace, version, hooks)?;
        Ok(RecordStore { handle })
    }

    /// The underlying store handle
    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    /// Read one record; absent is `None`
    pub async fn get_one(&self, record_type: &str, id: &str) -> Result<Option<Record>> {
        let conn = self.handle.open().await?;
        let value = conn
            .get(record_type, id)
            .await
            .map_err(|e| operation_error("get", record_type, e))?;
        value.map(|v| decode(record_type, &v)).transpose()
    }

    /// Read every record of a type in ascending id order
    pub async fn get_all(&self, record_type: &str) -> Result<Vec<Record>> {
        let conn = self.handle.open().await?;
        let entries = conn
            .scan(record_type)
            .await
            .map_err(|e| operation_error("scan", record_type, e))?;
        entries
            .iter()
            .map(|(_, value)| decode(record_type, value))
            .collect()
    }

    /// Store a record, overwriting any existing one
    pub async fn put(&self, record: &Record) -> Result<()> {
        let conn = self.handle.open().await?;
        conn.put(&record.record_type, None, record.to_value())
            .await
            .map_err(|e| operation_error("put", &record.record_type, e))?;
        debug!(
            target: "cairn::store",
            partition = %record.record_type,
            id = %record.id,
            "Record stored"
        );
        Ok(())
    }

    /// Remove a record; removing an absent record succeeds
    pub async fn remove(&self, record_type: &str, id: &str) -> Result<()> {
        let conn = self.handle.open().await?;
        conn.delete(record_type, id)
            .await
            .map_err(|e| operation_error("delete", record_type, e))
    }

    /// Remove every record of a type
    ///
    /// Succeeds without doing anything if the store has not been opened since
    /// it was created or last deleted.
    pub async fn clear(&self, record_type: &str) -> Result<()> {
        if !self.handle.has_been_opened() {
            return Ok(());
        }
        let conn = self.handle.open().await?;
        conn.clear(record_type)
            .await
            .map_err(|e| operation_error("clear", record_type, e))
    }

    /// Names of all partitions (record types) in the namespace
    pub async fn list_partitions(&self) -> Result<BTreeSet<String>> {
        let conn = self.handle.open().await?;
        conn.partition_names()
            .map_err(|e| operation_error("list", conn.namespace(), e))
    }
}

fn operation_error(operation: &'static str, partition: &str, e: StorageError) -> Error {
    error!(
        target: "cairn::store",
        operation,
        partition,
        error = %e,
        "Store operation failed"
    );
    Error::operation(operation, partition, e)
}

fn decode(partition: &str, value: &cairn_core::Value) -> Result<Record> {
    Record::from_value(value).map_err(|e| Error::InvalidRecord {
        partition: partition.to_string(),
        reason: e.to_string(),
    })
}
