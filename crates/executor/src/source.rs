//! Record source
//!
//! A `RecordSource` owns a [`RecordStore`] over one namespace (one partition
//! per record type) and exposes it through the capability traits:
//!
//! - [`Pushable`]: apply a transform, return it
//! - [`Syncable`]: apply a transform
//! - [`Pullable`]: evaluate a query into one transform of `addRecord`s
//!
//! Schema upgrades are followed by setting the new version and reopening the
//! store, either inline with [`RecordSource::handle_upgrade`] or from a
//! background task started by [`RecordSource::listen_for_upgrades`].

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use cairn_core::{Pullable, Pushable, Query, Result, Schema, Syncable, Transform};
use cairn_engine::{Migration, RecordStore, SourceConfig};
use cairn_storage::Engine;

use crate::operators::{query, transform};

/// Transform/query endpoint backed by a record store
#[derive(Debug)]
pub struct RecordSource {
    name: String,
    schema: Arc<Schema>,
    store: RecordStore,
}

impl RecordSource {
    /// Create a source from `config`
    ///
    /// The namespace is opened at `config.version` when set, otherwise at the
    /// schema's version. Nothing is opened until first use.
    ///
    /// # Errors
    ///
    /// `Config` for an invalid configuration, `Capability` when the engine is
    /// unavailable.
    pub fn new(
        engine: Arc<dyn Engine>,
        schema: Arc<Schema>,
        config: SourceConfig,
        migration: Option<Arc<dyn Migration>>,
    ) -> Result<Self> {
        config.validate()?;
        let version = config.version.unwrap_or_else(|| schema.version());
        let store = RecordStore::new(
            engine,
            Arc::clone(&schema),
            config.namespace,
            Some(version),
            migration,
        )?;
        Ok(RecordSource {
            name: config.name,
            schema,
            store,
        })
    }

    /// Create a source with the default configuration and no migration
    pub fn with_defaults(engine: Arc<dyn Engine>, schema: Arc<Schema>) -> Result<Self> {
        RecordSource::new(engine, schema, SourceConfig::default(), None)
    }

    /// Source name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The schema this source follows
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The underlying record store
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Open the store (idempotent)
    pub async fn open(&self) -> Result<()> {
        self.store.handle().open().await.map(drop)
    }

    /// Close the store (idempotent)
    pub async fn close(&self) {
        self.store.handle().close().await;
    }

    /// Close and open again
    pub async fn reopen(&self) -> Result<()> {
        self.store.handle().reopen().await.map(drop)
    }

    /// Destroy the namespace and everything in it
    pub async fn delete(&self) -> Result<()> {
        self.store.handle().delete().await
    }

    /// Remove every record of `record_type`
    ///
    /// A no-op when the store has not been opened since creation or the last
    /// delete.
    pub async fn clear_records(&self, record_type: &str) -> Result<()> {
        self.store.clear(record_type).await
    }

    /// Follow the schema to its current version and reopen
    ///
    /// The version never moves backwards: a configured version above the
    /// schema's is kept.
    pub async fn handle_upgrade(&self) -> Result<()> {
        let schema_version = self.schema.version();
        let version = self
            .store
            .handle()
            .version()
            .map_or(schema_version, |current| current.max(schema_version));
        info!(
            target: "cairn::source",
            source = %self.name,
            version,
            "Schema upgraded, reopening"
        );
        self.store.handle().set_version(version);
        self.reopen().await
    }

    /// Spawn a task that calls [`handle_upgrade`](Self::handle_upgrade) on
    /// every schema upgrade
    ///
    /// The task holds only a weak reference and ends once the source is
    /// dropped or the schema goes away. Must be called inside a tokio runtime.
    pub fn listen_for_upgrades(self: &Arc<Self>) -> JoinHandle<()> {
        let source: Weak<Self> = Arc::downgrade(self);
        let mut upgrades = self.schema.subscribe();

        tokio::spawn(async move {
            while upgrades.changed().await.is_ok() {
                let Some(source) = source.upgrade() else {
                    break;
                };
                if let Err(e) = source.handle_upgrade().await {
                    error!(
                        target: "cairn::source",
                        source = %source.name,
                        error = %e,
                        "Reopen after schema upgrade failed"
                    );
                }
            }
            debug!(target: "cairn::source", "Upgrade listener stopped");
        })
    }

    async fn apply(&self, transform: &Transform) -> Result<()> {
        self.open().await?;
        debug!(
            target: "cairn::source",
            source = %self.name,
            transform = %transform.id,
            operations = transform.len(),
            "Processing transform"
        );
        transform::apply_transform(&self.store, transform)
            .await
            .map_err(|e| {
                error!(
                    target: "cairn::source",
                    source = %self.name,
                    transform = %transform.id,
                    error = %e,
                    "Transform failed"
                );
                e
            })
    }
}

#[async_trait]
impl Pushable for RecordSource {
    async fn push(&self, transform: Transform) -> Result<Vec<Transform>> {
        self.apply(&transform).await?;
        Ok(vec![transform])
    }
}

#[async_trait]
impl Syncable for RecordSource {
    async fn sync(&self, transform: Transform) -> Result<()> {
        self.apply(&transform).await
    }
}

#[async_trait]
impl Pullable for RecordSource {
    async fn pull(&self, query: Query) -> Result<Vec<Transform>> {
        self.open().await?;
        debug!(
            target: "cairn::source",
            source = %self.name,
            query = %query.id,
            "Processing query"
        );
        query::evaluate(&self.store, &query.expression).await
    }
}
