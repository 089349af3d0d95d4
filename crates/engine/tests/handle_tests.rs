//! Integration tests for the store handle lifecycle
//!
//! These tests verify:
//! - The capability probe at construction
//! - First open creates one partition per known type
//! - Cached and coalesced opens (one engine open per establishment)
//! - close/reopen/delete semantics
//! - Version increases with and without a migration
//! - Partition creation failures surface as logged connection errors

mod common;

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

use cairn_core::{Error, Schema, StorageError, StorageResult, Value};
use cairn_engine::{create_missing_partitions, Migration, RecordStore};
use cairn_storage::testing::UnavailableEngine;
use cairn_storage::{Connection, Engine, OpenOutcome, VersionChange};
use common::*;

fn same_connection(a: &Arc<dyn Connection>, b: &Arc<dyn Connection>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn unavailable_engine_fails_at_construction() {
    let engine: Arc<dyn Engine> = Arc::new(UnavailableEngine);
    let err = RecordStore::new(engine, solar_schema(), "orbit", None, None).unwrap_err();
    assert!(matches!(err, Error::Capability { .. }));
}

#[tokio::test]
async fn construction_does_not_open() {
    let engine = counting_engine();
    let store = record_store(&engine, solar_schema(), None);
    assert_eq!(engine.opens(), 0);
    assert!(!store.handle().is_open().await);
    assert!(!store.handle().has_been_opened());
}

// ============================================================================
// Open
// ============================================================================

#[tokio::test]
async fn first_open_creates_partitions_for_models() {
    let engine = counting_engine();
    let store = record_store(&engine, solar_schema(), None);

    let conn = store.handle().open().await.unwrap();
    assert_eq!(conn.version(), 1);
    assert_eq!(conn.partition_names().unwrap(), names(&["moon", "planet"]));
    assert!(store.handle().has_been_opened());
}

#[tokio::test]
async fn open_returns_cached_connection() {
    let engine = counting_engine();
    let store = record_store(&engine, solar_schema(), None);

    let first = store.handle().open().await.unwrap();
    let second = store.handle().open().await.unwrap();
    assert!(same_connection(&first, &second));
    assert_eq!(engine.opens(), 1);
}

#[tokio::test]
async fn concurrent_opens_are_coalesced() {
    let engine = counting_engine();
    let store = record_store(&engine, solar_schema(), None);
    let handle = store.handle();

    let (a, b, c) = tokio::join!(handle.open(), handle.open(), handle.open());
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    assert!(same_connection(&a, &b));
    assert!(same_connection(&b, &c));
    assert_eq!(engine.opens(), 1);
    assert_eq!(engine.inner().open_connections("orbit"), 1);
}

#[tokio::test]
async fn concurrent_opens_across_tasks() {
    let engine = counting_engine();
    let store = Arc::new(record_store(&engine, solar_schema(), None));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.handle().open().await.map(|c| c.version()) })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 1);
    }
    assert_eq!(engine.opens(), 1);
}

#[tokio::test]
async fn open_at_lower_version_is_connection_error() {
    let engine = counting_engine();
    let store = record_store(&engine, solar_schema(), Some(3));
    store.handle().open().await.unwrap();
    store.handle().close().await;

    let older = record_store(&engine, solar_schema(), Some(2));
    let err = older.handle().open().await.unwrap_err();
    assert!(err.is_connection());
    assert!(matches!(
        err.storage_error(),
        Some(StorageError::VersionTooLow { requested: 2, current: 3, .. })
    ));
}

#[tokio::test]
async fn upgrade_blocked_by_other_connection() {
    let engine = counting_engine();
    let first = record_store(&engine, solar_schema(), None);
    first.handle().open().await.unwrap();

    let second = record_store(&engine, solar_schema(), Some(2));
    let err = second.handle().open().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Connection {
            source: StorageError::Blocked { .. },
            ..
        }
    ));
}

// ============================================================================
// Close / Reopen
// ============================================================================

#[tokio::test]
async fn close_is_idempotent_and_keeps_data() {
    let engine = counting_engine();
    let store = record_store(&engine, solar_schema(), None);
    store.put(&planet("earth", "Earth")).await.unwrap();

    store.handle().close().await;
    store.handle().close().await;
    assert!(!store.handle().is_open().await);
    assert_eq!(engine.inner().open_connections("orbit"), 0);

    assert!(store.get_one("planet", "earth").await.unwrap().is_some());
    assert_eq!(engine.opens(), 2);
}

#[tokio::test]
async fn reopen_issues_a_new_open() {
    let engine = counting_engine();
    let store = record_store(&engine, solar_schema(), None);

    let before = store.handle().open().await.unwrap();
    let after = store.handle().reopen().await.unwrap();
    assert!(before.is_closed());
    assert!(!after.is_closed());
    assert!(!same_connection(&before, &after));
    assert_eq!(engine.opens(), 2);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn delete_removes_data_and_reopen_recreates_partitions() {
    let engine = counting_engine();
    let schema = solar_schema();
    let store = record_store(&engine, Arc::clone(&schema), None);
    store.put(&planet("earth", "Earth")).await.unwrap();

    store.handle().delete().await.unwrap();
    assert_eq!(engine.inner().namespace_version("orbit").await.unwrap(), None);

    schema.upgrade(["planet", "moon", "star"], 2);
    assert!(store.get_one("planet", "earth").await.unwrap().is_none());
    assert_eq!(
        store.list_partitions().await.unwrap(),
        names(&["moon", "planet", "star"])
    );
}

#[tokio::test]
async fn clear_after_delete_does_not_recreate_namespace() {
    let engine = counting_engine();
    let store = record_store(&engine, solar_schema(), None);
    store.handle().open().await.unwrap();
    assert!(store.handle().has_been_opened());

    store.handle().delete().await.unwrap();
    assert!(!store.handle().has_been_opened());

    store.clear("planet").await.unwrap();
    assert_eq!(engine.opens(), 1);
    assert_eq!(engine.inner().namespace_version("orbit").await.unwrap(), None);
}

#[tokio::test]
async fn delete_blocked_by_connection_elsewhere() {
    let engine = counting_engine();
    let store = record_store(&engine, solar_schema(), None);
    let other = record_store(&engine, solar_schema(), None);
    other.handle().open().await.unwrap();
    store.handle().open().await.unwrap();

    let err = store.handle().delete().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Deletion {
            source: StorageError::Blocked { .. },
            ..
        }
    ));
    assert_eq!(engine.deletes(), 1);
    assert!(!store.handle().is_open().await);
    assert!(store.handle().has_been_opened());
}

#[tokio::test]
async fn delete_never_opened_namespace() {
    let engine = counting_engine();
    let store = record_store(&engine, solar_schema(), None);
    store.handle().delete().await.unwrap();
    assert_eq!(engine.opens(), 0);
}

// ============================================================================
// Version Changes
// ============================================================================

#[tokio::test]
async fn version_increase_without_migration_fails() {
    let engine = counting_engine();
    let store = record_store(&engine, solar_schema(), None);
    store.put(&planet("earth", "Earth")).await.unwrap();
    store.handle().close().await;

    store.handle().set_version(2);
    let err = store.handle().open().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Migration {
            old_version: 1,
            new_version: 2,
            ..
        }
    ));
    assert!(err.is_connection());

    // Upgrade aborted: still at version 1 with data intact
    assert_eq!(engine.inner().namespace_version("orbit").await.unwrap(), Some(1));
    let conn = match engine.inner().open("orbit", None).await.unwrap() {
        OpenOutcome::Ready(conn) => conn,
        OpenOutcome::UpgradeNeeded(_) => panic!("expected ready"),
    };
    assert!(conn.get("planet", "earth").await.unwrap().is_some());
}

#[tokio::test]
async fn migration_runs_with_old_and_new_versions() {
    let engine = counting_engine();
    let schema = solar_schema();
    store_earth(&engine, Arc::clone(&schema)).await;

    schema.upgrade(["planet", "moon", "star"], 2);
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let migration: Arc<dyn Migration> = {
        let seen = Arc::clone(&seen);
        let schema = Arc::clone(&schema);
        Arc::new(
            move |change: &mut dyn VersionChange, old: u32, new: u32| -> cairn_core::Result<()> {
                seen.lock().push((old, new));
                create_missing_partitions(&schema, change)
            },
        )
    };

    let store = record_store_with(&engine, Arc::clone(&schema), Some(2), Some(migration));
    let conn = store.handle().open().await.unwrap();
    assert_eq!(conn.version(), 2);
    assert_eq!(*seen.lock(), vec![(1, 2)]);
    assert!(conn.partition_names().unwrap().contains("star"));
    assert!(store.get_one("planet", "earth").await.unwrap().is_some());
}

#[tokio::test]
async fn failing_migration_aborts_upgrade() {
    let engine = counting_engine();
    let schema = solar_schema();
    store_earth(&engine, Arc::clone(&schema)).await;

    let migration: Arc<dyn Migration> = Arc::new(
        |change: &mut dyn VersionChange, _old: u32, _new: u32| -> cairn_core::Result<()> {
            change
                .delete_partition("planet")
                .map_err(|e| Error::connection(change.namespace(), e))?;
            Err(Error::Config {
                reason: "migration refused".to_string(),
            })
        },
    );

    let store = record_store_with(&engine, schema, Some(2), Some(migration));
    assert!(store.handle().open().await.is_err());
    assert_eq!(engine.inner().namespace_version("orbit").await.unwrap(), Some(1));

    store.handle().set_version(1);
    assert!(store.get_one("planet", "earth").await.unwrap().is_some());
}

async fn store_earth(engine: &TestEngine, schema: Arc<Schema>) {
    let store = record_store(engine, schema, None);
    store.put(&planet("earth", "Earth")).await.unwrap();
    store.handle().close().await;
}

// ============================================================================
// Partition Creation Failures
// ============================================================================

/// Version change whose partition creation is always rejected
struct RejectingChange;

#[async_trait::async_trait]
impl VersionChange for RejectingChange {
    fn namespace(&self) -> &str {
        "orbit"
    }

    fn old_version(&self) -> u32 {
        0
    }

    fn new_version(&self) -> u32 {
        1
    }

    fn partition_names(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn contains_partition(&self, _name: &str) -> bool {
        false
    }

    fn create_partition(&mut self, _name: &str, _key_path: Option<&str>) -> StorageResult<()> {
        Err(StorageError::Unavailable {
            reason: "read-only".to_string(),
        })
    }

    fn delete_partition(&mut self, _name: &str) -> StorageResult<()> {
        Ok(())
    }

    fn rename_partition(&mut self, _from: &str, _to: &str) -> StorageResult<()> {
        Ok(())
    }

    fn scan(&self, _partition: &str) -> StorageResult<Vec<(String, Value)>> {
        Ok(Vec::new())
    }

    fn put(&mut self, _partition: &str, key: Option<&str>, _value: Value) -> StorageResult<String> {
        Ok(key.unwrap_or_default().to_string())
    }

    fn delete(&mut self, _partition: &str, _key: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<Arc<dyn Connection>> {
        Err(StorageError::Unavailable {
            reason: "read-only".to_string(),
        })
    }
}

/// Collects the targets of error-level events
struct ErrorTargets(Arc<Mutex<Vec<String>>>);

impl tracing::Subscriber for ErrorTargets {
    fn enabled(&self, _metadata: &tracing::Metadata<'_>) -> bool {
        true
    }

    fn new_span(&self, _span: &tracing::span::Attributes<'_>) -> tracing::span::Id {
        tracing::span::Id::from_u64(1)
    }

    fn record(&self, _span: &tracing::span::Id, _values: &tracing::span::Record<'_>) {}

    fn record_follows_from(&self, _span: &tracing::span::Id, _follows: &tracing::span::Id) {}

    fn event(&self, event: &tracing::Event<'_>) {
        if *event.metadata().level() == tracing::Level::ERROR {
            self.0.lock().push(event.metadata().target().to_string());
        }
    }

    fn enter(&self, _span: &tracing::span::Id) {}

    fn exit(&self, _span: &tracing::span::Id) {}
}

#[test]
fn partition_creation_failure_is_logged() {
    let targets = Arc::new(Mutex::new(Vec::new()));
    let subscriber = ErrorTargets(Arc::clone(&targets));

    let err = tracing::subscriber::with_default(subscriber, || {
        create_missing_partitions(&Schema::new(["planet"]), &mut RejectingChange).unwrap_err()
    });

    assert!(matches!(
        err,
        Error::Connection {
            source: StorageError::Unavailable { .. },
            ..
        }
    ));
    assert_eq!(*targets.lock(), vec!["cairn::store".to_string()]);
}
