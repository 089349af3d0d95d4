//! Query operator handlers.
//!
//! Each handler answers with a single transform of `addRecord` operations,
//! so query results flow downstream exactly like mutations.

use cairn_core::{Operation, QueryExpression, RecordIdentity, Result, Transform};
use cairn_engine::RecordStore;

/// Evaluate one query expression.
pub async fn evaluate(store: &RecordStore, expression: &QueryExpression) -> Result<Vec<Transform>> {
    match expression {
        QueryExpression::Records { types } => records(store, types).await,
        QueryExpression::Record { identity } => record(store, identity).await,
    }
}

/// Handle records: every record of `types`, or of every partition when empty.
///
/// Types are read in order; records within a type come in ascending id order.
pub async fn records(store: &RecordStore, types: &[String]) -> Result<Vec<Transform>> {
    let types: Vec<String> = if types.is_empty() {
        store.list_partitions().await?.into_iter().collect()
    } else {
        types.to_vec()
    };

    let mut operations = Vec::new();
    for record_type in &types {
        let found = store.get_all(record_type).await?;
        operations.extend(found.into_iter().map(Operation::add_record));
    }

    Ok(vec![Transform::new(operations)])
}

/// Handle record: one record by identity.
///
/// An absent record yields an `addRecord` with no record, not an error.
pub async fn record(store: &RecordStore, identity: &RecordIdentity) -> Result<Vec<Transform>> {
    let found = store.get_one(&identity.record_type, &identity.id).await?;
    Ok(vec![Transform::from(Operation::AddRecord { record: found })])
}
