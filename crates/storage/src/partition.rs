//! Partitions and namespace state

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use cairn_core::{StorageError, StorageResult, Value};

/// Ordered key/value entries plus an optional key path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    /// Field of the stored value that holds its key; `None` for out-of-line keys
    pub key_path: Option<String>,
    /// Entries in ascending key order
    pub entries: BTreeMap<String, Value>,
}

impl Partition {
    /// Create an empty partition
    pub fn new(key_path: Option<&str>) -> Self {
        Partition {
            key_path: key_path.map(str::to_string),
            entries: BTreeMap::new(),
        }
    }

    /// Resolve the key for a write
    ///
    /// With a key path the key comes from the value and an explicit key is
    /// rejected; without one the caller must supply it.
    pub fn resolve_key(&self, name: &str, key: Option<&str>, value: &Value) -> StorageResult<String> {
        match (&self.key_path, key) {
            (Some(path), None) => value
                .field(path)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| StorageError::MissingKey {
                    partition: name.to_string(),
                    key_path: path.clone(),
                }),
            (Some(_), Some(_)) => Err(StorageError::UnexpectedKey {
                partition: name.to_string(),
            }),
            (None, Some(key)) => Ok(key.to_string()),
            (None, None) => Err(StorageError::KeyRequired {
                partition: name.to_string(),
            }),
        }
    }

    /// Write a value, returning the key used
    pub fn put(&mut self, name: &str, key: Option<&str>, value: Value) -> StorageResult<String> {
        let key = self.resolve_key(name, key, &value)?;
        self.entries.insert(key.clone(), value);
        Ok(key)
    }

    /// Entries in ascending key order
    pub fn scan(&self) -> Vec<(String, Value)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Persisted state of one namespace
///
/// Version 0 marks a namespace that has never been committed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceState {
    /// Committed version
    pub version: u32,
    /// Partitions by name
    pub partitions: BTreeMap<String, Partition>,
}

impl NamespaceState {
    /// Look up a partition
    pub fn partition(&self, name: &str) -> StorageResult<&Partition> {
        self.partitions
            .get(name)
            .ok_or_else(|| StorageError::PartitionNotFound {
                partition: name.to_string(),
            })
    }

    /// Look up a partition for writing
    pub fn partition_mut(&mut self, name: &str) -> StorageResult<&mut Partition> {
        self.partitions
            .get_mut(name)
            .ok_or_else(|| StorageError::PartitionNotFound {
                partition: name.to_string(),
            })
    }

    /// Add a partition
    pub fn create_partition(&mut self, name: &str, key_path: Option<&str>) -> StorageResult<()> {
        if self.partitions.contains_key(name) {
            return Err(StorageError::PartitionExists {
                partition: name.to_string(),
            });
        }
        self.partitions
            .insert(name.to_string(), Partition::new(key_path));
        Ok(())
    }

    /// Remove a partition and its entries
    pub fn delete_partition(&mut self, name: &str) -> StorageResult<()> {
        self.partitions
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::PartitionNotFound {
                partition: name.to_string(),
            })
    }

    /// Rename a partition, keeping its entries
    pub fn rename_partition(&mut self, from: &str, to: &str) -> StorageResult<()> {
        if self.partitions.contains_key(to) {
            return Err(StorageError::PartitionExists {
                partition: to.to_string(),
            });
        }
        let partition = self
            .partitions
            .remove(from)
            .ok_or_else(|| StorageError::PartitionNotFound {
                partition: from.to_string(),
            })?;
        self.partitions.insert(to.to_string(), partition);
        Ok(())
    }
}
