//! # Cairn Executor
//!
//! Record sources and bucket storage over a versioned object store.
//!
//! This is the crate callers import. It provides:
//! - [`RecordSource`] - applies transforms and answers queries
//! - [`BucketHandle`] - flat key/value storage
//! - [`EmbeddedEngine`] - in-memory or on-disk engine to run them on
//!
//! ## Quick Start
//!
//! ```text
//! use std::sync::Arc;
//! use cairn_executor::{EmbeddedEngine, Operation, Pullable, Pushable, Query, Record,
//!     RecordSource, Schema, Transform};
//!
//! let engine = Arc::new(EmbeddedEngine::ephemeral());
//! let schema = Arc::new(Schema::new(["planet", "moon"]));
//! let source = RecordSource::with_defaults(engine, schema)?;
//!
//! let earth = Record::new("planet", "earth").with_attribute("name", "Earth");
//! source.push(Transform::from(Operation::add_record(earth))).await?;
//!
//! let result = source.pull(Query::records(["planet"])).await?;
//! ```
//!
//! ## Operator Tables
//!
//! | Table | Entries |
//! |-------|---------|
//! | **Transform** | addRecord, replaceRecord, removeRecord, replaceKey, replaceAttribute, addToHasMany, removeFromHasMany, replaceHasMany, replaceHasOne |
//! | **Query** | records, record |

#![warn(missing_docs)]

pub mod operators;
mod source;

#[cfg(test)]
mod tests;

pub use source::RecordSource;

pub use cairn_core::{
    Bucket, Error, Operation, Pullable, Pushable, Query, QueryExpression, Record, RecordIdentity,
    Relationship, RelationshipData, Result, Schema, SchemaState, StorageError, Syncable,
    Transform, Value,
};
pub use cairn_engine::{
    create_missing_partitions, BucketConfig, BucketHandle, Migration, RecordStore, SourceConfig,
    StoreHandle,
};
pub use cairn_storage::{Connection, EmbeddedEngine, Engine, OpenOutcome, VersionChange};
