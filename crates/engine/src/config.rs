//! Source and bucket configuration
//!
//! Both configurations are plain serde structs that can be read from and
//! written to TOML. Every field has a default, so an empty file is a valid
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use cairn_core::{Error, Result};

/// Default source name
pub const DEFAULT_SOURCE_NAME: &str = "indexedDB";
/// Default namespace of a record source
pub const DEFAULT_SOURCE_NAMESPACE: &str = "orbit";
/// Default bucket name
pub const DEFAULT_BUCKET_NAME: &str = "bucket";
/// Default namespace of a bucket
pub const DEFAULT_BUCKET_NAMESPACE: &str = "orbit-bucket";
/// Default partition of a bucket
pub const DEFAULT_BUCKET_STORE: &str = "data";

/// Configuration of a record source.
///
/// # Example
///
/// ```toml
/// name = "indexedDB"
/// namespace = "orbit"
/// # Target version; defaults to the schema version
/// # version = 2
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Name of the source
    #[serde(default = "default_source_name")]
    pub name: String,
    /// Namespace holding the source's partitions
    #[serde(default = "default_source_namespace")]
    pub namespace: String,
    /// Version to open the namespace at; `None` uses the schema version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

fn default_source_name() -> String {
    DEFAULT_SOURCE_NAME.to_string()
}

fn default_source_namespace() -> String {
    DEFAULT_SOURCE_NAMESPACE.to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: default_source_name(),
            namespace: default_source_namespace(),
            version: None,
        }
    }
}

impl SourceConfig {
    /// Check names are non-empty and the version, if set, is at least 1.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        require_non_empty("namespace", &self.namespace)?;
        if let Some(version) = self.version {
            require_version(version)?;
        }
        Ok(())
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SourceConfig = toml::from_str(content).map_err(|e| Error::Config {
            reason: format!("failed to parse source config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_toml_str(&read_file(path)?)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        write_file(path, toml::to_string_pretty(self))
    }
}

/// Configuration of a bucket.
///
/// # Example
///
/// ```toml
/// name = "bucket"
/// namespace = "orbit-bucket"
/// store_name = "data"
/// version = 1
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Name of the bucket
    #[serde(default = "default_bucket_name")]
    pub name: String,
    /// Namespace holding the bucket partition
    #[serde(default = "default_bucket_namespace")]
    pub namespace: String,
    /// Partition holding the items
    #[serde(default = "default_bucket_store")]
    pub store_name: String,
    /// Version to open the namespace at
    #[serde(default = "default_bucket_version")]
    pub version: u32,
}

fn default_bucket_name() -> String {
    DEFAULT_BUCKET_NAME.to_string()
}

fn default_bucket_namespace() -> String {
    DEFAULT_BUCKET_NAMESPACE.to_string()
}

fn default_bucket_store() -> String {
    DEFAULT_BUCKET_STORE.to_string()
}

fn default_bucket_version() -> u32 {
    1
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            name: default_bucket_name(),
            namespace: default_bucket_namespace(),
            store_name: default_bucket_store(),
            version: default_bucket_version(),
        }
    }
}

impl BucketConfig {
    /// Check names are non-empty and the version is at least 1.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        require_non_empty("namespace", &self.namespace)?;
        require_non_empty("store_name", &self.store_name)?;
        require_version(self.version)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BucketConfig = toml::from_str(content).map_err(|e| Error::Config {
            reason: format!("failed to parse bucket config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_toml_str(&read_file(path)?)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        write_file(path, toml::to_string_pretty(self))
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Config {
            reason: format!("'{}' must not be empty", field),
        });
    }
    Ok(())
}

fn require_version(version: u32) -> Result<()> {
    if version == 0 {
        return Err(Error::Config {
            reason: "'version' must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::Config {
        reason: format!("failed to read config file '{}': {}", path.display(), e),
    })
}

fn write_file(
    path: &Path,
    content: std::result::Result<String, toml::ser::Error>,
) -> Result<()> {
    let content = content.map_err(|e| Error::Config {
        reason: format!("failed to serialize config: {}", e),
    })?;
    std::fs::write(path, content).map_err(|e| Error::Config {
        reason: format!("failed to write config file '{}': {}", path.display(), e),
    })
}
