//! Shared helpers for the engine crate's integration tests.
//!
//! Import via `mod common;`.

#![allow(dead_code)]

use std::sync::Arc;

use cairn_core::{Record, Schema};
use cairn_engine::{Migration, RecordStore};
use cairn_storage::testing::CountingEngine;
use cairn_storage::{EmbeddedEngine, Engine};

pub type TestEngine = Arc<CountingEngine<EmbeddedEngine>>;

/// Ephemeral engine wrapped in a request counter
pub fn counting_engine() -> TestEngine {
    Arc::new(CountingEngine::new(EmbeddedEngine::ephemeral()))
}

/// Schema with `planet` and `moon`
pub fn solar_schema() -> Arc<Schema> {
    Arc::new(Schema::new(["planet", "moon"]))
}

/// Record store over `engine` in namespace `orbit`
pub fn record_store(engine: &TestEngine, schema: Arc<Schema>, version: Option<u32>) -> RecordStore {
    record_store_with(engine, schema, version, None)
}

pub fn record_store_with(
    engine: &TestEngine,
    schema: Arc<Schema>,
    version: Option<u32>,
    migration: Option<Arc<dyn Migration>>,
) -> RecordStore {
    let engine: Arc<dyn Engine> = engine.clone();
    RecordStore::new(engine, schema, "orbit", version, migration).unwrap()
}

pub fn planet(id: &str, name: &str) -> Record {
    Record::new("planet", id).with_attribute("name", name)
}

pub fn moon(id: &str, name: &str) -> Record {
    Record::new("moon", id).with_attribute("name", name)
}
