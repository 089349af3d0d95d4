//! Transforms and queries
//!
//! A [`Transform`] is an ordered list of operations with a fresh UUID v4.
//! A [`Query`] is a single expression, also with a fresh id.

use crate::identity::RecordIdentity;
use crate::operation::Operation;
use uuid::Uuid;

/// Ordered list of operations; order is significant
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Transform id (UUID v4)
    pub id: Uuid,
    /// Operations, applied in order
    pub operations: Vec<Operation>,
}

impl Transform {
    /// Create a transform with a fresh id
    pub fn new(operations: Vec<Operation>) -> Self {
        Transform {
            id: Uuid::new_v4(),
            operations,
        }
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// True if the transform carries no operations
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl From<Operation> for Transform {
    fn from(op: Operation) -> Self {
        Transform::new(vec![op])
    }
}

impl From<Vec<Operation>> for Transform {
    fn from(ops: Vec<Operation>) -> Self {
        Transform::new(ops)
    }
}

/// Query expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryExpression {
    /// All records of the given types; empty means every partition
    Records {
        /// Types to read, in order
        types: Vec<String>,
    },
    /// One record by identity
    Record {
        /// Record to read
        identity: RecordIdentity,
    },
}

/// A read request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Query id (UUID v4)
    pub id: Uuid,
    /// What to read
    pub expression: QueryExpression,
}

impl Query {
    /// Create a query with a fresh id
    pub fn new(expression: QueryExpression) -> Self {
        Query {
            id: Uuid::new_v4(),
            expression,
        }
    }

    /// All records of the given types
    pub fn records<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query::new(QueryExpression::Records {
            types: types.into_iter().map(Into::into).collect(),
        })
    }

    /// All records of every type
    pub fn all_records() -> Self {
        Query::new(QueryExpression::Records { types: Vec::new() })
    }

    /// One record by identity
    pub fn record(identity: RecordIdentity) -> Self {
        Query::new(QueryExpression::Record { identity })
    }
}
