//! Cairn - record and transform persistence over a versioned object store
//!
//! Cairn keeps records in a namespace of partitions (one per record type),
//! applies transforms to them and answers queries with transforms.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use cairn::{EmbeddedEngine, Operation, Pullable, Pushable, Query, Record, RecordSource,
//!     Schema, Transform};
//!
//! let engine = Arc::new(EmbeddedEngine::open("/path/to/data")?);
//! let schema = Arc::new(Schema::new(["planet", "moon"]));
//! let source = RecordSource::with_defaults(engine, schema)?;
//!
//! let earth = Record::new("planet", "earth").with_attribute("name", "Earth");
//! source.push(Transform::from(Operation::add_record(earth))).await?;
//!
//! let planets = source.pull(Query::records(["planet"])).await?;
//! ```
//!
//! # Architecture
//!
//! The [`Engine`] owns namespaces; a [`StoreHandle`] manages one connection
//! to one namespace; [`RecordSource`] and [`BucketHandle`] sit on top.
//! Everything public is re-exported from the executor crate.

pub use cairn_executor::*;
