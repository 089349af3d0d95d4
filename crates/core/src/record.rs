//! Records and relationships
//!
//! A record is stored verbatim as a [`Value::Object`]:
//!
//! ```text
//! {
//!   "type": "planet",
//!   "id": "jupiter",
//!   "keys":          { "remoteId": "p5" },                 (optional)
//!   "attributes":    { "name": "Jupiter", "order": 5 },    (optional)
//!   "relationships": {                                     (optional)
//!     "moons": { "data": { "moon:io": true, "moon:europa": true } },
//!     "sun":   { "data": "star:sol" },
//!     "ring":  { "data": null }
//!   }
//! }
//! ```
//!
//! To-many data is a set of identifier strings encoded as a map whose values
//! are `true`. To-one data is an identifier string or `null`. A relationship
//! object without `data` is kept as-is.
//!
//! Fields the record model does not know about, at the top level or inside a
//! relationship, are carried in `extra` and written back unchanged. To-many
//! entries whose value is not `true` are not members; they are kept in
//! `inactive` and written back unchanged unless the member is set.
//!
//! The mutation helpers on [`Record`] create missing nesting levels on demand,
//! so they work on a bare `{type, id}` skeleton.

use crate::identity::RecordIdentity;
use crate::value::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

const TYPE: &str = "type";
const ID: &str = "id";
const KEYS: &str = "keys";
const ATTRIBUTES: &str = "attributes";
const RELATIONSHIPS: &str = "relationships";
const DATA: &str = "data";
const RECORD_FIELDS: [&str; 5] = [TYPE, ID, KEYS, ATTRIBUTES, RELATIONSHIPS];

/// A stored value that does not have record shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ShapeError(String);

impl ShapeError {
    fn new(reason: impl Into<String>) -> Self {
        ShapeError(reason.into())
    }
}

/// Relationship data: a single identifier or a set of identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipData {
    /// To-one: identifier string, or `None` for an explicit null
    ToOne(Option<String>),
    /// To-many: set of identifier strings
    ToMany(BTreeSet<String>),
}

/// A named relationship of a record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Relationship {
    /// Relationship data; `None` when the relationship object has no `data`
    pub data: Option<RelationshipData>,
    /// To-many entries whose value is not `true`
    pub inactive: BTreeMap<String, Value>,
    /// Relationship fields other than `data`
    pub extra: BTreeMap<String, Value>,
}

impl Relationship {
    /// Relationship holding `data` and nothing else
    pub fn with_data(data: RelationshipData) -> Self {
        Relationship {
            data: Some(data),
            ..Relationship::default()
        }
    }
}

/// A normalized record
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Record type (partition name)
    pub record_type: String,
    /// Primary key
    pub id: String,
    /// Secondary keys
    pub keys: Option<BTreeMap<String, String>>,
    /// Attribute values
    pub attributes: Option<BTreeMap<String, Value>>,
    /// Relationships by name
    pub relationships: Option<BTreeMap<String, Relationship>>,
    /// Top-level fields other than the ones above
    pub extra: BTreeMap<String, Value>,
}

impl Record {
    /// Create a bare `{type, id}` record
    pub fn new(record_type: impl Into<String>, id: impl Into<String>) -> Self {
        Record {
            record_type: record_type.into(),
            id: id.into(),
            keys: None,
            attributes: None,
            relationships: None,
            extra: BTreeMap::new(),
        }
    }

    /// Bare record for an identity; stands in for a record that is not stored
    pub fn skeleton(identity: &RecordIdentity) -> Self {
        Record::new(identity.record_type.clone(), identity.id.clone())
    }

    /// Identity of this record
    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity::new(self.record_type.clone(), self.id.clone())
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_attribute(name, value.into());
        self
    }

    /// Builder-style key setter
    pub fn with_key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_key(name, value);
        self
    }

    /// Builder-style relationship setter
    pub fn with_relationship(mut self, name: impl Into<String>, data: RelationshipData) -> Self {
        self.relationship_mut(name).data = Some(data);
        self
    }

    /// Builder-style setter for a field outside the record model
    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Set `keys[name] = value`, creating `keys` if absent
    pub fn set_key(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.keys
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
    }

    /// Set `attributes[name] = value`, creating `attributes` if absent
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        self.attributes
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value);
    }

    /// Look up an attribute
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.as_ref()?.get(name)
    }

    /// Look up a relationship
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.as_ref()?.get(name)
    }

    /// Relationship entry, creating `relationships` and the entry if absent
    pub fn relationship_mut(&mut self, name: impl Into<String>) -> &mut Relationship {
        self.relationships
            .get_or_insert_with(BTreeMap::new)
            .entry(name.into())
            .or_default()
    }

    /// Add `identifier` to a to-many relationship
    ///
    /// Missing levels are created. Data that is absent or to-one is replaced
    /// by a to-many set. Adding a member twice leaves one member.
    pub fn add_to_has_many(&mut self, relationship: impl Into<String>, identifier: String) {
        let rel = self.relationship_mut(relationship);
        match &mut rel.data {
            Some(RelationshipData::ToMany(members)) => {
                rel.inactive.remove(&identifier);
                members.insert(identifier);
            }
            data => {
                *data = Some(RelationshipData::ToMany(BTreeSet::from([identifier])));
                rel.inactive.clear();
            }
        }
    }

    /// Remove `identifier` from a to-many relationship
    ///
    /// Only acts when the relationship exists with to-many data containing the
    /// member. Inactive entries are not members and are left alone. Returns
    /// whether anything changed.
    pub fn remove_from_has_many(&mut self, relationship: &str, identifier: &str) -> bool {
        let Some(rel) = self
            .relationships
            .as_mut()
            .and_then(|rels| rels.get_mut(relationship))
        else {
            return false;
        };
        match &mut rel.data {
            Some(RelationshipData::ToMany(members)) => members.remove(identifier),
            _ => false,
        }
    }

    /// Replace a relationship's data with exactly `identifiers`
    pub fn replace_has_many<I>(&mut self, relationship: impl Into<String>, identifiers: I)
    where
        I: IntoIterator<Item = String>,
    {
        let rel = self.relationship_mut(relationship);
        rel.data = Some(RelationshipData::ToMany(identifiers.into_iter().collect()));
        rel.inactive.clear();
    }

    /// Replace a relationship's data with a single identifier or null
    pub fn replace_has_one(&mut self, relationship: impl Into<String>, identifier: Option<String>) {
        let rel = self.relationship_mut(relationship);
        rel.data = Some(RelationshipData::ToOne(identifier));
        rel.inactive.clear();
    }

    /// Members of a to-many relationship, if it has to-many data
    pub fn has_many(&self, relationship: &str) -> Option<&BTreeSet<String>> {
        match self.relationship(relationship)?.data.as_ref()? {
            RelationshipData::ToMany(members) => Some(members),
            RelationshipData::ToOne(_) => None,
        }
    }

    /// Data of a to-one relationship; `Some(None)` is an explicit null
    pub fn has_one(&self, relationship: &str) -> Option<Option<&str>> {
        match self.relationship(relationship)?.data.as_ref()? {
            RelationshipData::ToOne(identifier) => Some(identifier.as_deref()),
            RelationshipData::ToMany(_) => None,
        }
    }

    /// Encode as the stored object value
    pub fn to_value(&self) -> Value {
        let mut object = self.extra.clone();
        object.insert(TYPE.to_string(), Value::String(self.record_type.clone()));
        object.insert(ID.to_string(), Value::String(self.id.clone()));

        if let Some(keys) = &self.keys {
            let keys = keys
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            object.insert(KEYS.to_string(), Value::Object(keys));
        }

        if let Some(attributes) = &self.attributes {
            object.insert(ATTRIBUTES.to_string(), Value::Object(attributes.clone()));
        }

        if let Some(relationships) = &self.relationships {
            let relationships = relationships
                .iter()
                .map(|(name, rel)| (name.clone(), relationship_to_value(rel)))
                .collect();
            object.insert(RELATIONSHIPS.to_string(), Value::Object(relationships));
        }

        Value::Object(object)
    }

    /// Decode a stored object value
    pub fn from_value(value: &Value) -> Result<Self, ShapeError> {
        let object = value
            .as_object()
            .ok_or_else(|| ShapeError::new(format!("expected Object, got {}", value.type_name())))?;

        let record_type = required_string(object, TYPE)?;
        let id = required_string(object, ID)?;

        let keys = match optional_object(object, KEYS)? {
            None => None,
            Some(keys) => Some(
                keys.iter()
                    .map(|(k, v)| match v {
                        Value::String(s) => Ok((k.clone(), s.clone())),
                        other => Err(ShapeError::new(format!(
                            "key '{}' must be String, got {}",
                            k,
                            other.type_name()
                        ))),
                    })
                    .collect::<Result<_, _>>()?,
            ),
        };

        let attributes = optional_object(object, ATTRIBUTES)?.cloned();

        let relationships = match optional_object(object, RELATIONSHIPS)? {
            None => None,
            Some(rels) => Some(
                rels.iter()
                    .map(|(name, v)| Ok((name.clone(), relationship_from_value(name, v)?)))
                    .collect::<Result<_, ShapeError>>()?,
            ),
        };

        let extra = object
            .iter()
            .filter(|(field, _)| !RECORD_FIELDS.contains(&field.as_str()))
            .map(|(field, v)| (field.clone(), v.clone()))
            .collect();

        Ok(Record {
            record_type,
            id,
            keys,
            attributes,
            relationships,
            extra,
        })
    }
}

impl From<&Record> for Value {
    fn from(record: &Record) -> Self {
        record.to_value()
    }
}

impl TryFrom<&Value> for Record {
    type Error = ShapeError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Record::from_value(value)
    }
}

fn required_string(object: &BTreeMap<String, Value>, field: &str) -> Result<String, ShapeError> {
    match object.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ShapeError::new(format!(
            "'{}' must be String, got {}",
            field,
            other.type_name()
        ))),
        None => Err(ShapeError::new(format!("missing '{}'", field))),
    }
}

fn optional_object<'a>(
    object: &'a BTreeMap<String, Value>,
    field: &str,
) -> Result<Option<&'a BTreeMap<String, Value>>, ShapeError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(o)) => Ok(Some(o)),
        Some(other) => Err(ShapeError::new(format!(
            "'{}' must be Object, got {}",
            field,
            other.type_name()
        ))),
    }
}

fn relationship_to_value(rel: &Relationship) -> Value {
    let mut object = rel.extra.clone();
    match &rel.data {
        None => {}
        Some(RelationshipData::ToOne(identifier)) => {
            object.insert(DATA.to_string(), Value::from(identifier.clone()));
        }
        Some(RelationshipData::ToMany(members)) => {
            let mut set = rel.inactive.clone();
            set.extend(members.iter().map(|m| (m.clone(), Value::Bool(true))));
            object.insert(DATA.to_string(), Value::Object(set));
        }
    }
    Value::Object(object)
}

fn relationship_from_value(name: &str, value: &Value) -> Result<Relationship, ShapeError> {
    let object = value.as_object().ok_or_else(|| {
        ShapeError::new(format!(
            "relationship '{}' must be Object, got {}",
            name,
            value.type_name()
        ))
    })?;

    let mut inactive = BTreeMap::new();
    let data = match object.get(DATA) {
        None => None,
        Some(Value::Null) => Some(RelationshipData::ToOne(None)),
        Some(Value::String(s)) => Some(RelationshipData::ToOne(Some(s.clone()))),
        Some(Value::Object(entries)) => {
            let mut members = BTreeSet::new();
            for (identifier, flag) in entries {
                if *flag == Value::Bool(true) {
                    members.insert(identifier.clone());
                } else {
                    inactive.insert(identifier.clone(), flag.clone());
                }
            }
            Some(RelationshipData::ToMany(members))
        }
        Some(other) => {
            return Err(ShapeError::new(format!(
                "relationship '{}' data must be String, Null or Object, got {}",
                name,
                other.type_name()
            )))
        }
    };

    let extra = object
        .iter()
        .filter(|(field, _)| field.as_str() != DATA)
        .map(|(field, v)| (field.clone(), v.clone()))
        .collect();

    Ok(Relationship {
        data,
        inactive,
        extra,
    })
}
