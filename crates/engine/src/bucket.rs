//! Bucket: a flat key/value partition
//!
//! One namespace, one partition, out-of-line string keys. Items are arbitrary
//! values. Each call opens the namespace on demand.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

use cairn_core::{Bucket, Error, Result, StorageError, Value};
use cairn_storage::{Engine, VersionChange};

use crate::config::BucketConfig;
use crate::handle::{run_migration, Migration, StoreHandle, UpgradeHooks};

/// Upgrade hooks for a bucket namespace
///
/// Creation makes the item partition. A version increase runs the migration
/// (failing without one), then makes sure the item partition still exists.
struct BucketLayout {
    store_name: String,
    migration: Option<Arc<dyn Migration>>,
}

impl BucketLayout {
    fn ensure_partition(&self, change: &mut dyn VersionChange) -> Result<()> {
        if change.contains_partition(&self.store_name) {
            return Ok(());
        }
        change
            .create_partition(&self.store_name, None)
            .map_err(|e| {
                error!(
                    target: "cairn::store",
                    namespace = change.namespace(),
                    partition = %self.store_name,
                    error = %e,
                    "Error creating partition"
                );
                Error::connection(change.namespace(), e)
            })
    }
}

impl UpgradeHooks for BucketLayout {
    fn create(&self, change: &mut dyn VersionChange) -> Result<()> {
        self.ensure_partition(change)
    }

    fn migrate(&self, change: &mut dyn VersionChange) -> Result<()> {
        run_migration(self.migration.as_deref(), change)?;
        self.ensure_partition(change)
    }
}

/// Key/value storage over one partition
#[derive(Debug)]
pub struct BucketHandle {
    name: String,
    store_name: String,
    handle: StoreHandle,
}

impl BucketHandle {
    /// Create a bucket from its configuration
    ///
    /// # Errors
    ///
    /// `Config` for an invalid configuration, `Capability` if the engine is
    /// unavailable.
    pub fn new(engine: Arc<dyn Engine>, config: BucketConfig) -> Result<Self> {
        Self::with_migration(engine, config, None)
    }

    /// Create a bucket that runs `migration` when its version increases
    ///
    /// Without a migration, opening at a higher version than stored fails
    /// with `Migration`.
    pub fn with_migration(
        engine: Arc<dyn Engine>,
        config: BucketConfig,
        migration: Option<Arc<dyn Migration>>,
    ) -> Result<Self> {
        config.validate()?;
        let hooks = Arc::new(BucketLayout {
            store_name: config.store_name.clone(),
            migration,
        });
        let handle = StoreHandle::new(engine, config.namespace, Some(config.version), hooks)?;
        Ok(BucketHandle {
            name: config.name,
            store_name: config.store_name,
            handle,
        })
    }

    /// Bucket with the default configuration
    pub fn with_defaults(engine: Arc<dyn Engine>) -> Result<Self> {
        Self::new(engine, BucketConfig::default())
    }

    /// Bucket name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Partition holding the items
    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// The underlying store handle
    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    fn operation_error(&self, operation: &'static str, e: StorageError) -> Error {
        error!(
            target: "cairn::store",
            bucket = %self.name,
            operation,
            error = %e,
            "Bucket operation failed"
        );
        Error::operation(operation, &self.store_name, e)
    }
}

#[async_trait]
impl Bucket for BucketHandle {
    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.handle.open().await?;
        conn.get(&self.store_name, key)
            .await
            .map_err(|e| self.operation_error("get", e))
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<()> {
        let conn = self.handle.open().await?;
        conn.put(&self.store_name, Some(key), value)
            .await
            .map(|_| ())
            .map_err(|e| self.operation_error("put", e))
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let conn = self.handle.open().await?;
        conn.delete(&self.store_name, key)
            .await
            .map_err(|e| self.operation_error("delete", e))
    }
}
