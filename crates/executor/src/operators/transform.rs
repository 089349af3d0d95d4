//! Transform operator handlers.
//!
//! One handler per operation kind. Field-level handlers read the target
//! record (or a bare `{type, id}` skeleton when it is not stored), change one
//! field and write the whole record back. Each handler is its own store
//! transaction.

use tracing::debug;

use cairn_core::{Error, Operation, Record, RecordIdentity, Result, Transform, Value};
use cairn_engine::RecordStore;

/// Apply one operation.
pub async fn apply(store: &RecordStore, operation: &Operation) -> Result<()> {
    match operation {
        Operation::AddRecord { record } => match record {
            Some(record) => add_record(store, record).await,
            None => Err(Error::InvalidOperation {
                op: operation.op_name(),
                reason: "no record to add".to_string(),
            }),
        },
        Operation::ReplaceRecord { record } => replace_record(store, record).await,
        Operation::RemoveRecord { record } => remove_record(store, record).await,
        Operation::ReplaceKey { record, key, value } => {
            replace_key(store, record, key, value).await
        }
        Operation::ReplaceAttribute {
            record,
            attribute,
            value,
        } => replace_attribute(store, record, attribute, value).await,
        Operation::AddToHasMany {
            record,
            relationship,
            related_record,
        } => add_to_has_many(store, record, relationship, related_record).await,
        Operation::RemoveFromHasMany {
            record,
            relationship,
            related_record,
        } => remove_from_has_many(store, record, relationship, related_record).await,
        Operation::ReplaceHasMany {
            record,
            relationship,
            related_records,
        } => replace_has_many(store, record, relationship, related_records).await,
        Operation::ReplaceHasOne {
            record,
            relationship,
            related_record,
        } => replace_has_one(store, record, relationship, related_record.as_ref()).await,
    }
}

/// Apply every operation of `transform` in order.
///
/// Stops at the first failure; operations already applied stay applied.
/// The failure is wrapped with the transform id and the failing index.
pub async fn apply_transform(store: &RecordStore, transform: &Transform) -> Result<()> {
    for (index, operation) in transform.operations.iter().enumerate() {
        debug!(
            target: "cairn::source",
            transform = %transform.id,
            index,
            op = operation.op_name(),
            "Applying operation"
        );
        apply(store, operation).await.map_err(|source| Error::Transform {
            transform: transform.id,
            index,
            op: operation.op_name(),
            source: Box::new(source),
        })?;
    }
    Ok(())
}

// =============================================================================
// Individual Handlers
// =============================================================================

/// Stored record for `identity`, or a bare skeleton when absent.
async fn get_record(store: &RecordStore, identity: &RecordIdentity) -> Result<Record> {
    Ok(store
        .get_one(&identity.record_type, &identity.id)
        .await?
        .unwrap_or_else(|| Record::skeleton(identity)))
}

/// Handle addRecord.
pub async fn add_record(store: &RecordStore, record: &Record) -> Result<()> {
    store.put(record).await
}

/// Handle replaceRecord.
pub async fn replace_record(store: &RecordStore, record: &Record) -> Result<()> {
    store.put(record).await
}

/// Handle removeRecord.
pub async fn remove_record(store: &RecordStore, record: &RecordIdentity) -> Result<()> {
    store.remove(&record.record_type, &record.id).await
}

/// Handle replaceKey.
pub async fn replace_key(
    store: &RecordStore,
    record: &RecordIdentity,
    key: &str,
    value: &str,
) -> Result<()> {
    let mut stored = get_record(store, record).await?;
    stored.set_key(key, value);
    store.put(&stored).await
}

/// Handle replaceAttribute.
pub async fn replace_attribute(
    store: &RecordStore,
    record: &RecordIdentity,
    attribute: &str,
    value: &Value,
) -> Result<()> {
    let mut stored = get_record(store, record).await?;
    stored.set_attribute(attribute, value.clone());
    store.put(&stored).await
}

/// Handle addToHasMany.
pub async fn add_to_has_many(
    store: &RecordStore,
    record: &RecordIdentity,
    relationship: &str,
    related_record: &RecordIdentity,
) -> Result<()> {
    let mut stored = get_record(store, record).await?;
    stored.add_to_has_many(relationship, related_record.identifier());
    store.put(&stored).await
}

/// Handle removeFromHasMany.
///
/// Writes only when the member was actually present.
pub async fn remove_from_has_many(
    store: &RecordStore,
    record: &RecordIdentity,
    relationship: &str,
    related_record: &RecordIdentity,
) -> Result<()> {
    let Some(mut stored) = store.get_one(&record.record_type, &record.id).await? else {
        return Ok(());
    };
    if stored.remove_from_has_many(relationship, &related_record.identifier()) {
        store.put(&stored).await?;
    }
    Ok(())
}

/// Handle replaceHasMany.
pub async fn replace_has_many(
    store: &RecordStore,
    record: &RecordIdentity,
    relationship: &str,
    related_records: &[RecordIdentity],
) -> Result<()> {
    let mut stored = get_record(store, record).await?;
    stored.replace_has_many(relationship, related_records.iter().map(RecordIdentity::identifier));
    store.put(&stored).await
}

/// Handle replaceHasOne.
pub async fn replace_has_one(
    store: &RecordStore,
    record: &RecordIdentity,
    relationship: &str,
    related_record: Option<&RecordIdentity>,
) -> Result<()> {
    let mut stored = get_record(store, record).await?;
    stored.replace_has_one(relationship, related_record.map(RecordIdentity::identifier));
    store.put(&stored).await
}
