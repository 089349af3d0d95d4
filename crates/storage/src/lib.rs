//! Storage layer for Cairn
//!
//! This crate implements the object-store engine the record layer runs on:
//! - Engine, Connection, VersionChange: the engine contract
//! - EmbeddedEngine: in-process engine, ephemeral or snapshot-backed
//! - Partition, NamespaceState: ordered key/value partitions of a namespace
//! - snapshot: checksummed namespace file format (write-fsync-rename)
//! - testing: counting and unavailable engines for tests
//!
//! # Versioning
//!
//! Namespaces carry a version that only moves forward. Partitions can only be
//! created, deleted or renamed inside a version change.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod embedded;
pub mod engine;
pub mod partition;
pub mod snapshot;
pub mod testing;

pub use embedded::{EmbeddedEngine, LOCK_FILE_NAME};
pub use engine::{Connection, Engine, OpenOutcome, VersionChange};
pub use partition::{NamespaceState, Partition};
pub use snapshot::SnapshotError;
