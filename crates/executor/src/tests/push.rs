//! Push tests: transform operators applied through a record source.

use std::collections::BTreeSet;

use super::*;
use crate::{Connection, Error, Operation, Pushable, StorageError, Syncable, Transform, Value};

async fn get(source: &RecordSource, record_type: &str, id: &str) -> Option<Record> {
    source.store().get_one(record_type, id).await.unwrap()
}

fn members(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Records
// =============================================================================

#[tokio::test]
async fn test_add_record_then_get() {
    let engine = counting_engine();
    let source = create_test_source(&engine);
    let earth = planet("earth", "Earth").with_key("remoteId", "p3");

    let applied = source
        .push(Transform::from(Operation::add_record(earth.clone())))
        .await
        .unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].len(), 1);

    assert_eq!(get(&source, "planet", "earth").await, Some(earth));
}

#[tokio::test]
async fn test_push_returns_the_applied_transform() {
    let engine = counting_engine();
    let source = create_test_source(&engine);
    let transform = Transform::from(Operation::add_record(planet("earth", "Earth")));
    let id = transform.id;

    let applied = source.push(transform).await.unwrap();
    assert_eq!(applied[0].id, id);
}

#[tokio::test]
async fn test_replace_record() {
    let engine = counting_engine();
    let source = create_test_source(&engine);
    let original = planet("earth", "Earth").with_attribute("order", 3i64);
    let replacement = planet("earth", "Terra");

    source
        .push(Transform::new(vec![
            Operation::add_record(original),
            Operation::replace_record(replacement.clone()),
        ]))
        .await
        .unwrap();

    assert_eq!(get(&source, "planet", "earth").await, Some(replacement));
}

#[tokio::test]
async fn test_remove_record() {
    let engine = counting_engine();
    let source = create_test_source(&engine);

    source
        .push(Transform::new(vec![
            Operation::add_record(planet("earth", "Earth")),
            Operation::remove_record(identity("planet", "earth")),
        ]))
        .await
        .unwrap();
    assert_eq!(get(&source, "planet", "earth").await, None);

    // Removing an absent record succeeds
    source
        .sync(Transform::from(Operation::remove_record(identity("planet", "earth"))))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_add_record_without_payload_is_rejected() {
    let engine = counting_engine();
    let source = create_test_source(&engine);

    let err = source
        .sync(Transform::from(Operation::AddRecord { record: None }))
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Error::InvalidOperation { op: "addRecord", .. }));
}

// =============================================================================
// Fields
// =============================================================================

#[tokio::test]
async fn test_replace_key_on_absent_record_creates_skeleton() {
    let engine = counting_engine();
    let source = create_test_source(&engine);

    source
        .sync(Transform::from(Operation::replace_key(
            identity("planet", "mars"),
            "remoteId",
            "p4",
        )))
        .await
        .unwrap();

    let mars = get(&source, "planet", "mars").await.unwrap();
    assert_eq!(mars, Record::new("planet", "mars").with_key("remoteId", "p4"));
    assert!(mars.attributes.is_none());
}

#[tokio::test]
async fn test_replace_attribute_twice_equals_once() {
    let engine = counting_engine();
    let source = create_test_source(&engine);
    source
        .sync(Transform::from(Operation::add_record(planet("earth", "Earth"))))
        .await
        .unwrap();

    let op = Operation::replace_attribute(identity("planet", "earth"), "order", 3i64);
    source.sync(Transform::from(op.clone())).await.unwrap();
    let once = get(&source, "planet", "earth").await;
    source.sync(Transform::from(op)).await.unwrap();
    let twice = get(&source, "planet", "earth").await;

    assert_eq!(once, twice);
    let earth = twice.unwrap();
    assert_eq!(earth.attribute("order"), Some(&Value::Int(3)));
    assert_eq!(earth.attribute("name"), Some(&Value::from("Earth")));
}

#[tokio::test]
async fn test_field_update_keeps_fields_outside_record_model() {
    let engine = counting_engine();
    let source = create_test_source(&engine);
    let conn = source.store().handle().open().await.unwrap();

    let stored = Value::from(serde_json::json!({
        "type": "planet",
        "id": "jupiter",
        "meta": "imported",
        "relationships": {
            "moons": { "data": { "moon:io": false, "moon:europa": true }, "meta": "x" }
        }
    }));
    conn.put("planet", None, stored).await.unwrap();

    source
        .sync(Transform::from(Operation::replace_attribute(
            identity("planet", "jupiter"),
            "name",
            "Jupiter",
        )))
        .await
        .unwrap();

    let expected = Value::from(serde_json::json!({
        "type": "planet",
        "id": "jupiter",
        "meta": "imported",
        "attributes": { "name": "Jupiter" },
        "relationships": {
            "moons": { "data": { "moon:io": false, "moon:europa": true }, "meta": "x" }
        }
    }));
    assert_eq!(conn.get("planet", "jupiter").await.unwrap(), Some(expected));

    let jupiter = get(&source, "planet", "jupiter").await.unwrap();
    assert_eq!(jupiter.has_many("moons"), Some(&members(&["moon:europa"])));
}

// =============================================================================
// Relationships
// =============================================================================

#[tokio::test]
async fn test_add_to_has_many_is_idempotent() {
    let engine = counting_engine();
    let source = create_test_source(&engine);
    let op = Operation::add_to_has_many(identity("planet", "jupiter"), "moons", identity("moon", "io"));

    source
        .sync(Transform::new(vec![op.clone(), op]))
        .await
        .unwrap();

    let jupiter = get(&source, "planet", "jupiter").await.unwrap();
    assert_eq!(jupiter.has_many("moons"), Some(&members(&["moon:io"])));
}

#[tokio::test]
async fn test_add_to_has_many_replaces_to_one_data() {
    let engine = counting_engine();
    let source = create_test_source(&engine);

    source
        .sync(Transform::new(vec![
            Operation::replace_has_one(identity("moon", "io"), "planet", Some(identity("planet", "jupiter"))),
            Operation::add_to_has_many(identity("moon", "io"), "planet", identity("planet", "saturn")),
        ]))
        .await
        .unwrap();

    let io = get(&source, "moon", "io").await.unwrap();
    assert_eq!(io.has_many("planet"), Some(&members(&["planet:saturn"])));
}

#[tokio::test]
async fn test_remove_from_has_many() {
    let engine = counting_engine();
    let source = create_test_source(&engine);
    let jupiter = identity("planet", "jupiter");

    source
        .sync(Transform::new(vec![
            Operation::add_to_has_many(jupiter.clone(), "moons", identity("moon", "io")),
            Operation::add_to_has_many(jupiter.clone(), "moons", identity("moon", "europa")),
            Operation::remove_from_has_many(jupiter.clone(), "moons", identity("moon", "io")),
        ]))
        .await
        .unwrap();

    let stored = get(&source, "planet", "jupiter").await.unwrap();
    assert_eq!(stored.has_many("moons"), Some(&members(&["moon:europa"])));
}

#[tokio::test]
async fn test_remove_from_has_many_absent_is_noop() {
    let engine = counting_engine();
    let source = create_test_source(&engine);
    source
        .sync(Transform::from(Operation::add_record(planet("earth", "Earth"))))
        .await
        .unwrap();

    source
        .sync(Transform::new(vec![
            // No such record
            Operation::remove_from_has_many(identity("planet", "pluto"), "moons", identity("moon", "charon")),
            // No such relationship
            Operation::remove_from_has_many(identity("planet", "earth"), "moons", identity("moon", "luna")),
        ]))
        .await
        .unwrap();

    assert_eq!(get(&source, "planet", "pluto").await, None);
    assert_eq!(get(&source, "planet", "earth").await, Some(planet("earth", "Earth")));
}

#[tokio::test]
async fn test_replace_has_many_replaces_wholesale() {
    let engine = counting_engine();
    let source = create_test_source(&engine);
    let jupiter = identity("planet", "jupiter");

    source
        .sync(Transform::new(vec![
            Operation::replace_has_many(
                jupiter.clone(),
                "moons",
                vec![identity("moon", "a"), identity("moon", "b")],
            ),
            Operation::replace_has_many(jupiter.clone(), "moons", vec![identity("moon", "c")]),
        ]))
        .await
        .unwrap();

    let stored = get(&source, "planet", "jupiter").await.unwrap();
    assert_eq!(stored.has_many("moons"), Some(&members(&["moon:c"])));
}

#[tokio::test]
async fn test_replace_has_one() {
    let engine = counting_engine();
    let source = create_test_source(&engine);
    let luna = identity("moon", "luna");

    source
        .sync(Transform::from(Operation::replace_has_one(
            luna.clone(),
            "planet",
            Some(identity("planet", "earth")),
        )))
        .await
        .unwrap();
    let stored = get(&source, "moon", "luna").await.unwrap();
    assert_eq!(stored.has_one("planet"), Some(Some("planet:earth")));

    source
        .sync(Transform::from(Operation::replace_has_one(luna, "planet", None)))
        .await
        .unwrap();
    let stored = get(&source, "moon", "luna").await.unwrap();
    assert_eq!(stored.has_one("planet"), Some(None));
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_partial_failure_keeps_earlier_operations() {
    let engine = counting_engine();
    let source = create_test_source(&engine);
    let transform = Transform::new(vec![
        Operation::add_record(planet("earth", "Earth")),
        Operation::add_record(Record::new("comet", "halley")),
        Operation::add_record(moon("luna", "Luna")),
    ]);
    let transform_id = transform.id;

    let err = source.push(transform).await.unwrap_err();
    match &err {
        Error::Transform {
            transform,
            index,
            op,
            source,
        } => {
            assert_eq!(*transform, transform_id);
            assert_eq!(*index, 1);
            assert_eq!(*op, "addRecord");
            assert!(source.is_operation());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(
        err.storage_error(),
        Some(StorageError::PartitionNotFound { .. })
    ));

    assert!(get(&source, "planet", "earth").await.is_some());
    assert_eq!(get(&source, "moon", "luna").await, None);
}

#[tokio::test]
async fn test_empty_transform_opens_store() {
    let engine = counting_engine();
    let source = create_test_source(&engine);

    source.push(Transform::new(Vec::new())).await.unwrap();
    assert!(source.store().handle().is_open().await);
    assert_eq!(engine.opens(), 1);
}
