//! Record identity and its canonical string form
//!
//! A record is identified by `(type, id)`. The canonical identifier string is
//! `"{type}:{id}"`; it is the key inside to-many relationship data and the
//! value of to-one relationship data. Parsing splits at the first `:`, so ids
//! may themselves contain colons.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a record: its type and id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordIdentity {
    /// Record type (also the partition name)
    #[serde(rename = "type")]
    pub record_type: String,
    /// Primary key within the partition
    pub id: String,
}

impl RecordIdentity {
    /// Create an identity from a type and an id
    pub fn new(record_type: impl Into<String>, id: impl Into<String>) -> Self {
        RecordIdentity {
            record_type: record_type.into(),
            id: id.into(),
        }
    }

    /// Canonical identifier string, `"{type}:{id}"`
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.record_type, self.id)
    }

    /// Parse a canonical identifier string
    ///
    /// Returns `None` when the string contains no `:`.
    pub fn parse(identifier: &str) -> Option<Self> {
        let (record_type, id) = identifier.split_once(':')?;
        Some(RecordIdentity::new(record_type, id))
    }
}

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.record_type, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_format() {
        let identity = RecordIdentity::new("planet", "jupiter");
        assert_eq!(identity.identifier(), "planet:jupiter");
        assert_eq!(identity.to_string(), "planet:jupiter");
    }

    #[test]
    fn test_parse_splits_at_first_colon() {
        let identity = RecordIdentity::parse("moon:io:1").unwrap();
        assert_eq!(identity.record_type, "moon");
        assert_eq!(identity.id, "io:1");
    }

    #[test]
    fn test_parse_without_colon() {
        assert!(RecordIdentity::parse("jupiter").is_none());
    }

    #[test]
    fn test_parse_inverts_identifier() {
        let identity = RecordIdentity::new("planet", "earth");
        assert_eq!(RecordIdentity::parse(&identity.identifier()), Some(identity));
    }
}
