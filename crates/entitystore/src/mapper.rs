//! Entity <-> document mapping.
//!
//! Handles conversion between entities and the document backend's BSON
//! documents. Attribute order always comes from the entity, never from the
//! document.

use bson::oid::ObjectId;
use bson::{Bson, Document};
use chrono::{TimeZone, Utc};

use entitystore_common::StoreError;

use crate::core::Value;
use crate::entity::{Attribute, AttributeType, Entity};
use crate::identity::{self, PRIMARY_KEY};

/// How the identity attribute is written back after a backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityWrite {
    /// Read it from the document's primary key
    FromDocument,
    /// Set it to a newly assigned native key
    Assign(ObjectId),
    /// Leave it untouched
    Keep,
}

/// Convert a scalar value to BSON
#[must_use]
pub fn value_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Integer(i) => Bson::Int64(*i),
        Value::Float(f) => Bson::Double(*f),
        Value::String(s) => Bson::String(s.clone()),
        Value::Date(d) => Bson::DateTime(bson::DateTime::from_millis(d.timestamp_millis())),
    }
}

/// Convert a BSON field to a scalar value
pub fn bson_to_value(field: &str, bson: &Bson) -> Result<Value, StoreError> {
    match bson {
        Bson::Null | Bson::Undefined => Ok(Value::Null),
        Bson::Boolean(b) => Ok(Value::Bool(*b)),
        Bson::Int32(i) => Ok(Value::Integer(i64::from(*i))),
        Bson::Int64(i) => Ok(Value::Integer(*i)),
        Bson::Double(f) => Ok(Value::Float(*f)),
        Bson::String(s) => Ok(Value::String(s.clone())),
        Bson::ObjectId(oid) => Ok(identity::from_native(oid)),
        Bson::DateTime(dt) => Utc
            .timestamp_millis_opt(dt.timestamp_millis())
            .single()
            .map(Value::Date)
            .ok_or_else(|| StoreError::UnsupportedValue {
                field: field.to_string(),
                kind: format!("date out of range: {dt}"),
            }),
        other => Err(StoreError::UnsupportedValue {
            field: field.to_string(),
            kind: format!("{:?}", other.element_type()),
        }),
    }
}

/// Outgoing field value of a non-identity attribute.
///
/// Non-empty `Id`-typed values are references to other entities and are
/// stored as native keys.
pub fn attribute_to_bson(attribute: &Attribute) -> Result<Bson, StoreError> {
    match (&attribute.value, attribute.attribute_type) {
        (value, AttributeType::Id) if !value.is_empty() => {
            let id = value.as_str().ok_or_else(|| {
                StoreError::InvalidId(format!(
                    "{} must be a string, got {}",
                    attribute.name,
                    value.type_name()
                ))
            })?;
            Ok(Bson::ObjectId(identity::to_native(id)?))
        }
        (value, _) => Ok(value_to_bson(value)),
    }
}

/// Build the document for a write. The identity attribute is not included.
pub fn entity_to_document(entity: &Entity) -> Result<Document, StoreError> {
    let mut document = Document::new();
    for attribute in entity.attributes.iter().skip(1) {
        document.insert(attribute.name.clone(), attribute_to_bson(attribute)?);
    }
    Ok(document)
}

/// Value of `attribute` as held by `document`. Missing fields read as null.
pub fn read_attribute(
    entity: &Entity,
    attribute: &Attribute,
    document: &Document,
) -> Result<Value, StoreError> {
    if entity.is_identity(&attribute.name) {
        return Ok(identity::key_to_value(document.get(PRIMARY_KEY)));
    }
    match document.get(&attribute.name) {
        None => Ok(Value::Null),
        Some(bson) => bson_to_value(&attribute.name, bson),
    }
}

/// One row of values in the entity's declared attribute order
pub fn document_to_row(entity: &Entity, document: &Document) -> Result<Vec<Value>, StoreError> {
    entity
        .attributes
        .iter()
        .map(|attribute| read_attribute(entity, attribute, document))
        .collect()
}

/// Copy `document` into the entity's attribute values.
///
/// Nothing is written unless every field converts.
pub fn populate_entity(
    entity: &mut Entity,
    document: &Document,
    identity_write: IdentityWrite,
) -> Result<(), StoreError> {
    let mut values = document_to_row(entity, document)?;
    if let Some(identity_value) = values.first_mut() {
        match identity_write {
            IdentityWrite::FromDocument => {}
            IdentityWrite::Assign(oid) => *identity_value = identity::from_native(&oid),
            IdentityWrite::Keep => *identity_value = entity.identity().clone(),
        }
    }
    for (attribute, value) in entity.attributes.iter_mut().zip(values) {
        attribute.value = value;
    }
    Ok(())
}
