//! Record operations
//!
//! An [`Operation`] is one field-level or whole-record mutation. Transforms
//! carry an ordered list of them; queries answer with synthesized
//! `AddRecord` operations.

use crate::identity::RecordIdentity;
use crate::record::Record;
use crate::value::Value;

/// A single mutation of a record
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Store a record, overwriting any existing one
    ///
    /// `record` is `None` only in query results for a record that is not
    /// stored; applying such an operation is an error.
    AddRecord {
        /// Record to store
        record: Option<Record>,
    },
    /// Store a record, overwriting any existing one
    ReplaceRecord {
        /// Record to store
        record: Record,
    },
    /// Remove a record
    RemoveRecord {
        /// Record to remove
        record: RecordIdentity,
    },
    /// Set one secondary key
    ReplaceKey {
        /// Target record
        record: RecordIdentity,
        /// Key name
        key: String,
        /// Key value
        value: String,
    },
    /// Set one attribute
    ReplaceAttribute {
        /// Target record
        record: RecordIdentity,
        /// Attribute name
        attribute: String,
        /// Attribute value
        value: Value,
    },
    /// Add a member to a to-many relationship
    AddToHasMany {
        /// Target record
        record: RecordIdentity,
        /// Relationship name
        relationship: String,
        /// Member to add
        related_record: RecordIdentity,
    },
    /// Remove a member from a to-many relationship
    RemoveFromHasMany {
        /// Target record
        record: RecordIdentity,
        /// Relationship name
        relationship: String,
        /// Member to remove
        related_record: RecordIdentity,
    },
    /// Replace the members of a to-many relationship
    ReplaceHasMany {
        /// Target record
        record: RecordIdentity,
        /// Relationship name
        relationship: String,
        /// New members
        related_records: Vec<RecordIdentity>,
    },
    /// Replace the data of a to-one relationship
    ReplaceHasOne {
        /// Target record
        record: RecordIdentity,
        /// Relationship name
        relationship: String,
        /// New target, or `None` for null
        related_record: Option<RecordIdentity>,
    },
}

impl Operation {
    /// Operation kind as it appears in logs and errors
    pub fn op_name(&self) -> &'static str {
        match self {
            Operation::AddRecord { .. } => "addRecord",
            Operation::ReplaceRecord { .. } => "replaceRecord",
            Operation::RemoveRecord { .. } => "removeRecord",
            Operation::ReplaceKey { .. } => "replaceKey",
            Operation::ReplaceAttribute { .. } => "replaceAttribute",
            Operation::AddToHasMany { .. } => "addToHasMany",
            Operation::RemoveFromHasMany { .. } => "removeFromHasMany",
            Operation::ReplaceHasMany { .. } => "replaceHasMany",
            Operation::ReplaceHasOne { .. } => "replaceHasOne",
        }
    }

    /// Identity of the record the operation targets, if known
    pub fn target(&self) -> Option<RecordIdentity> {
        match self {
            Operation::AddRecord { record } => record.as_ref().map(Record::identity),
            Operation::ReplaceRecord { record } => Some(record.identity()),
            Operation::RemoveRecord { record }
            | Operation::ReplaceKey { record, .. }
            | Operation::ReplaceAttribute { record, .. }
            | Operation::AddToHasMany { record, .. }
            | Operation::RemoveFromHasMany { record, .. }
            | Operation::ReplaceHasMany { record, .. }
            | Operation::ReplaceHasOne { record, .. } => Some(record.clone()),
        }
    }

    /// `addRecord`
    pub fn add_record(record: Record) -> Self {
        Operation::AddRecord {
            record: Some(record),
        }
    }

    /// `replaceRecord`
    pub fn replace_record(record: Record) -> Self {
        Operation::ReplaceRecord { record }
    }

    /// `removeRecord`
    pub fn remove_record(record: RecordIdentity) -> Self {
        Operation::RemoveRecord { record }
    }

    /// `replaceKey`
    pub fn replace_key(
        record: RecordIdentity,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Operation::ReplaceKey {
            record,
            key: key.into(),
            value: value.into(),
        }
    }

    /// `replaceAttribute`
    pub fn replace_attribute(
        record: RecordIdentity,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Operation::ReplaceAttribute {
            record,
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// `addToHasMany`
    pub fn add_to_has_many(
        record: RecordIdentity,
        relationship: impl Into<String>,
        related_record: RecordIdentity,
    ) -> Self {
        Operation::AddToHasMany {
            record,
            relationship: relationship.into(),
            related_record,
        }
    }

    /// `removeFromHasMany`
    pub fn remove_from_has_many(
        record: RecordIdentity,
        relationship: impl Into<String>,
        related_record: RecordIdentity,
    ) -> Self {
        Operation::RemoveFromHasMany {
            record,
            relationship: relationship.into(),
            related_record,
        }
    }

    /// `replaceHasMany`
    pub fn replace_has_many(
        record: RecordIdentity,
        relationship: impl Into<String>,
        related_records: Vec<RecordIdentity>,
    ) -> Self {
        Operation::ReplaceHasMany {
            record,
            relationship: relationship.into(),
            related_records,
        }
    }

    /// `replaceHasOne`
    pub fn replace_has_one(
        record: RecordIdentity,
        relationship: impl Into<String>,
        related_record: Option<RecordIdentity>,
    ) -> Self {
        Operation::ReplaceHasOne {
            record,
            relationship: relationship.into(),
            related_record,
        }
    }
}
