//! Core types and traits for Cairn
//!
//! This crate defines the record model shared by every other crate:
//! - Value: structured value persisted by the engine
//! - Record, Relationship, RelationshipData: normalized records
//! - RecordIdentity: `(type, id)` and the `"type:id"` identifier string
//! - Operation: field-level and whole-record mutations
//! - Transform, Query: ordered mutations and read requests
//! - Schema: known models, version and upgrade notification
//! - Error, StorageError: error hierarchy
//! - Traits: capability traits (Pushable, Pullable, Syncable, Bucket)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod identity;
pub mod operation;
pub mod record;
pub mod schema;
pub mod traits;
pub mod transform;
pub mod value;

pub use error::{Error, Result, StorageError, StorageResult};
pub use identity::RecordIdentity;
pub use operation::Operation;
pub use record::{Record, Relationship, RelationshipData, ShapeError};
pub use schema::{Schema, SchemaState};
pub use traits::{Bucket, Pullable, Pushable, Syncable};
pub use transform::{Query, QueryExpression, Transform};
pub use value::Value;
