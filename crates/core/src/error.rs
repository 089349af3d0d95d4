//! Error types for Cairn
//!
//! Two layers, both built on `thiserror`:
//!
//! - [`StorageError`]: what an object-store engine reports for a single request
//!   (open, delete, get, put, clear, ...). Engines know nothing about records.
//! - [`Error`]: what callers of the record store, bucket and source see. Each
//!   variant attaches the context the engine does not have (namespace,
//!   operation, partition).
//!
//! Absent records are never an error at any layer.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for engine requests
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for record store, bucket and source operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by an object-store engine
#[derive(Debug, Error)]
pub enum StorageError {
    /// The engine cannot be used in this environment
    #[error("storage engine unavailable: {reason}")]
    Unavailable {
        /// Why the engine is unavailable
        reason: String,
    },

    /// Open requested a version lower than the one already persisted
    #[error("namespace '{namespace}' is at version {current}, cannot open at version {requested}")]
    VersionTooLow {
        /// Namespace being opened
        namespace: String,
        /// Version asked for
        requested: u32,
        /// Version on record
        current: u32,
    },

    /// Versions start at 1
    #[error("invalid version {version}: versions start at 1")]
    InvalidVersion {
        /// Rejected version
        version: u32,
    },

    /// Another connection or a pending version change prevents the request
    #[error("namespace '{namespace}' is blocked: {reason}")]
    Blocked {
        /// Namespace the request targeted
        namespace: String,
        /// What is holding the namespace
        reason: String,
    },

    /// The named partition does not exist in the namespace
    #[error("partition not found: {partition}")]
    PartitionNotFound {
        /// Missing partition
        partition: String,
    },

    /// A partition with this name already exists
    #[error("partition already exists: {partition}")]
    PartitionExists {
        /// Duplicate partition
        partition: String,
    },

    /// The connection was closed before the request was issued
    #[error("connection to '{namespace}' is closed")]
    ConnectionClosed {
        /// Namespace of the closed connection
        namespace: String,
    },

    /// The value lacks a string at the partition's key path
    #[error("value for partition '{partition}' has no string key at '{key_path}'")]
    MissingKey {
        /// Target partition
        partition: String,
        /// Key path the partition was created with
        key_path: String,
    },

    /// The partition has no key path, so the caller must supply the key
    #[error("partition '{partition}' stores out-of-line keys; an explicit key is required")]
    KeyRequired {
        /// Target partition
        partition: String,
    },

    /// The partition derives keys from values; an explicit key is not allowed
    #[error("partition '{partition}' derives keys from values; an explicit key is not allowed")]
    UnexpectedKey {
        /// Target partition
        partition: String,
    },

    /// The engine directory is held by another process
    #[error("engine directory '{}' is locked by another process", path.display())]
    Locked {
        /// Locked directory
        path: PathBuf,
    },

    /// I/O error (snapshot files, lock files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Persisted data failed validation
    #[error("data corruption: {0}")]
    Corruption(String),
}

/// Errors surfaced by the record store, bucket and source
///
/// # Categories
///
/// | Variant | When |
/// |---------|------|
/// | `Capability` | Engine unavailable; raised at construction |
/// | `Connection` | Open or upgrade rejected by the engine |
/// | `Migration` | Version increased but no migration could run |
/// | `Deletion` | Namespace deletion rejected |
/// | `Operation` | A single get/put/delete/clear/scan failed |
/// | `InvalidRecord` | A stored value is not record-shaped |
/// | `InvalidOperation` | An operation payload cannot be applied |
/// | `Transform` | An operation inside a transform failed (wraps the cause) |
/// | `Config` | Configuration failed validation or parsing |
#[derive(Debug, Error)]
pub enum Error {
    /// The storage engine is not available in this environment
    #[error("storage capability unavailable: {reason}")]
    Capability {
        /// Why the capability check failed
        reason: String,
    },

    /// Opening (or upgrading) the namespace failed
    #[error("failed to open '{namespace}': {source}")]
    Connection {
        /// Namespace being opened
        namespace: String,
        /// Engine error
        #[source]
        source: StorageError,
    },

    /// A version increase was requested but no migration handled it
    #[error(
        "namespace '{namespace}' needs migration from version {old_version} to {new_version}: {reason}"
    )]
    Migration {
        /// Namespace being upgraded
        namespace: String,
        /// Persisted version
        old_version: u32,
        /// Requested version
        new_version: u32,
        /// What went wrong
        reason: String,
    },

    /// Deleting the namespace failed
    #[error("failed to delete '{namespace}': {source}")]
    Deletion {
        /// Namespace being deleted
        namespace: String,
        /// Engine error
        #[source]
        source: StorageError,
    },

    /// A single store request failed
    #[error("{operation} on '{partition}' failed: {source}")]
    Operation {
        /// Request kind (`get`, `scan`, `put`, `delete`, `clear`)
        operation: &'static str,
        /// Partition the request targeted
        partition: String,
        /// Engine error
        #[source]
        source: StorageError,
    },

    /// A stored value could not be read back as a record
    #[error("invalid record in '{partition}': {reason}")]
    InvalidRecord {
        /// Partition holding the value
        partition: String,
        /// What is wrong with it
        reason: String,
    },

    /// An operation payload cannot be applied
    #[error("invalid {op} operation: {reason}")]
    InvalidOperation {
        /// Operation kind
        op: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// An operation inside a transform failed; earlier operations stay applied
    #[error("transform {transform} failed at operation {index} ({op}): {source}")]
    Transform {
        /// Transform id
        transform: Uuid,
        /// Zero-based index of the failing operation
        index: usize,
        /// Kind of the failing operation
        op: &'static str,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Configuration is invalid
    #[error("invalid configuration: {reason}")]
    Config {
        /// What is wrong
        reason: String,
    },
}

impl Error {
    /// Wrap an engine error raised while opening `namespace`
    pub fn connection(namespace: impl Into<String>, source: StorageError) -> Self {
        Error::Connection {
            namespace: namespace.into(),
            source,
        }
    }

    /// Wrap an engine error raised while deleting `namespace`
    pub fn deletion(namespace: impl Into<String>, source: StorageError) -> Self {
        Error::Deletion {
            namespace: namespace.into(),
            source,
        }
    }

    /// Wrap an engine error raised by a single store request
    pub fn operation(
        operation: &'static str,
        partition: impl Into<String>,
        source: StorageError,
    ) -> Self {
        Error::Operation {
            operation,
            partition: partition.into(),
            source,
        }
    }

    /// Innermost error, looking through transform wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::Transform { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for failures to establish or upgrade a connection
    pub fn is_connection(&self) -> bool {
        matches!(
            self.root(),
            Error::Connection { .. } | Error::Migration { .. }
        )
    }

    /// True for failures of a single store request
    pub fn is_operation(&self) -> bool {
        matches!(self.root(), Error::Operation { .. })
    }

    /// The engine error underneath, if there is one
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self.root() {
            Error::Connection { source, .. }
            | Error::Deletion { source, .. }
            | Error::Operation { source, .. } => Some(source),
            _ => None,
        }
    }
}
