//! Namespace snapshot file format
//!
//! Each namespace of a disk-backed engine lives in one file, rewritten in full
//! after every committed change.
//!
//! # Format
//!
//! ```text
//! +--------------------+
//! | Magic: "CRNS"      | 4 bytes
//! | Format Version     | 4 bytes (u32 LE)
//! | Namespace Version  | 4 bytes (u32 LE)
//! | Payload Length     | 8 bytes (u64 LE)
//! | Payload            | variable (MessagePack partitions)
//! | CRC32              | 4 bytes
//! +--------------------+
//! ```

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cairn_core::{StorageError, StorageResult};

use crate::partition::{NamespaceState, Partition};

/// Snapshot magic bytes: "CRNS"
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"CRNS";

/// Current snapshot format version
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// File extension of namespace snapshots
pub const SNAPSHOT_EXTENSION: &str = "ns";

const HEADER_LEN: usize = 4 + 4 + 4 + 8;
const CRC_LEN: usize = 4;

/// Errors decoding a snapshot
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// File shorter than header plus checksum
    #[error("snapshot too short")]
    TooShort,

    /// Invalid magic bytes
    #[error("invalid magic bytes")]
    InvalidMagic,

    /// Written by an unknown format version
    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u32),

    /// Payload length does not match the file
    #[error("payload length {declared} does not match {actual} available bytes")]
    LengthMismatch {
        /// Length from the header
        declared: u64,
        /// Bytes actually present
        actual: u64,
    },

    /// Checksum mismatch
    #[error("checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// CRC32 stored in the file
        expected: u32,
        /// CRC32 of the file contents
        computed: u32,
    },

    /// Payload is not valid MessagePack partitions
    #[error("payload decode failed: {0}")]
    Payload(String),
}

impl From<SnapshotError> for StorageError {
    fn from(e: SnapshotError) -> Self {
        StorageError::Corruption(e.to_string())
    }
}

/// Serialize a namespace to snapshot bytes
pub fn encode(state: &NamespaceState) -> StorageResult<Vec<u8>> {
    let payload = rmp_serde::to_vec_named(&state.partitions)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len() + CRC_LEN);
    bytes.extend_from_slice(&SNAPSHOT_MAGIC);
    bytes.extend_from_slice(&SNAPSHOT_FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&state.version.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&payload);

    // CRC32 of all preceding bytes
    let crc = crc32fast::hash(&bytes);
    bytes.extend_from_slice(&crc.to_le_bytes());

    Ok(bytes)
}

/// Deserialize snapshot bytes
pub fn decode(bytes: &[u8]) -> Result<NamespaceState, SnapshotError> {
    if bytes.len() < HEADER_LEN + CRC_LEN {
        return Err(SnapshotError::TooShort);
    }
    if bytes[0..4] != SNAPSHOT_MAGIC {
        return Err(SnapshotError::InvalidMagic);
    }

    let (data, crc_bytes) = bytes.split_at(bytes.len() - CRC_LEN);
    let expected = u32::from_le_bytes(le_array(crc_bytes));
    let computed = crc32fast::hash(data);
    if expected != computed {
        return Err(SnapshotError::ChecksumMismatch { expected, computed });
    }

    let format_version = u32::from_le_bytes(le_array(&data[4..8]));
    if format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(format_version));
    }

    let version = u32::from_le_bytes(le_array(&data[8..12]));
    let declared = u64::from_le_bytes(le_array(&data[12..20]));
    let payload = &data[HEADER_LEN..];
    if declared != payload.len() as u64 {
        return Err(SnapshotError::LengthMismatch {
            declared,
            actual: payload.len() as u64,
        });
    }

    let partitions: BTreeMap<String, Partition> =
        rmp_serde::from_slice(payload).map_err(|e| SnapshotError::Payload(e.to_string()))?;

    Ok(NamespaceState {
        version,
        partitions,
    })
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Snapshot path for a namespace inside `dir`
///
/// Names are percent-encoded so any namespace maps to a single file name.
pub fn snapshot_path(dir: &Path, namespace: &str) -> PathBuf {
    let mut file_name = String::with_capacity(namespace.len() + 3);
    for byte in namespace.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => file_name.push(byte as char),
            other => file_name.push_str(&format!("%{:02X}", other)),
        }
    }
    file_name.push('.');
    file_name.push_str(SNAPSHOT_EXTENSION);
    dir.join(file_name)
}

/// Load a namespace snapshot; `None` if the file does not exist
pub fn load(path: &Path) -> StorageResult<Option<NamespaceState>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(decode(&bytes)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Persist a namespace snapshot atomically (write-fsync-rename)
pub fn persist(path: &Path, state: &NamespaceState) -> StorageResult<()> {
    let bytes = encode(state)?;
    let temp_path = path.with_extension("tmp");

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&temp_path, path)?;

    // Sync parent directory
    if let Some(parent) = path.parent() {
        if parent.exists() {
            File::open(parent)?.sync_all()?;
        }
    }

    Ok(())
}

/// Remove a namespace snapshot; a missing file is not an error
pub fn remove(path: &Path) -> StorageResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
