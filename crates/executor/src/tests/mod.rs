//! Test modules for the executor crate.

use std::sync::Arc;

use cairn_storage::testing::CountingEngine;
use cairn_storage::{EmbeddedEngine, Engine};

use crate::{Record, RecordIdentity, RecordSource, Schema};

pub mod push;

type TestEngine = Arc<CountingEngine<EmbeddedEngine>>;

/// Ephemeral engine wrapped in a request counter.
fn counting_engine() -> TestEngine {
    Arc::new(CountingEngine::new(EmbeddedEngine::ephemeral()))
}

fn solar_schema() -> Arc<Schema> {
    Arc::new(Schema::new(["planet", "moon"]))
}

/// Default-configured source over `engine` with the solar schema.
fn create_test_source(engine: &TestEngine) -> RecordSource {
    let engine: Arc<dyn Engine> = engine.clone();
    RecordSource::with_defaults(engine, solar_schema()).unwrap()
}

fn planet(id: &str, name: &str) -> Record {
    Record::new("planet", id).with_attribute("name", name)
}

fn moon(id: &str, name: &str) -> Record {
    Record::new("moon", id).with_attribute("name", name)
}

fn identity(record_type: &str, id: &str) -> RecordIdentity {
    RecordIdentity::new(record_type, id)
}
