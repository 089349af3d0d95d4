//! Store lifecycle and record access for Cairn
//!
//! This crate sits between the engine and the operator tables:
//! - StoreHandle: open/close/reopen/delete of one namespace, upgrade hooks
//! - RecordStore: records kept one partition per type
//! - BucketHandle: flat key/value partition
//! - SourceConfig, BucketConfig: TOML configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bucket;
pub mod config;
pub mod handle;
pub mod records;

pub use bucket::BucketHandle;
pub use config::{BucketConfig, SourceConfig};
pub use handle::{Migration, StoreHandle, UpgradeHooks};
pub use records::{create_missing_partitions, RecordStore, RECORD_KEY_PATH};
