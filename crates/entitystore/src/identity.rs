//! Identity resolution.
//!
//! The identity attribute is always index 0. Its external form is a string;
//! the document backend's native form is a 12-byte [`ObjectId`] stored under
//! [`PRIMARY_KEY`].

use bson::oid::ObjectId;
use bson::Bson;

use entitystore_common::StoreError;

use crate::core::{Operation, Value};
use crate::entity::Entity;

/// Native primary-key field of the document backend
pub const PRIMARY_KEY: &str = "_id";

/// What a write should do, decided from the identity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent<'a> {
    /// Identity empty: insert and assign a new identity
    Create,
    /// Identity is a string: address the stored entity by it
    Update(&'a str),
    /// Identity present but not a string
    Malformed,
}

/// Decide the intent for `entity`.
#[must_use]
pub fn resolve(entity: &Entity) -> Intent<'_> {
    match entity.identity() {
        v if v.is_empty() => Intent::Create,
        Value::String(id) => Intent::Update(id),
        _ => Intent::Malformed,
    }
}

/// Domain error for a malformed identity.
///
/// Deletes report a missing id, reads and writes a missing model.
#[must_use]
pub fn malformed(operation: Operation) -> StoreError {
    match operation {
        Operation::DeleteModel => StoreError::IdNotFound,
        _ => StoreError::ModelNotFound,
    }
}

/// External identity string to native reference
pub fn to_native(id: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(id).map_err(|e| StoreError::InvalidId(format!("{id}: {e}")))
}

/// Native reference to external identity string
#[must_use]
pub fn from_native(id: &ObjectId) -> Value {
    Value::String(id.to_hex())
}

/// External form of whatever a document holds under its primary key
#[must_use]
pub fn key_to_value(key: Option<&Bson>) -> Value {
    match key {
        None | Some(Bson::Null) => Value::Null,
        Some(Bson::ObjectId(id)) => from_native(id),
        Some(Bson::String(s)) => Value::String(s.clone()),
        Some(other) => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_intent() {
        let mut entity = Entity::new("Person");
        assert_eq!(resolve(&entity), Intent::Create);

        entity.set("id", "");
        assert_eq!(resolve(&entity), Intent::Create);

        entity.set("id", "65f4a0c2e13b5a0f9c8d7e6b");
        assert_eq!(resolve(&entity), Intent::Update("65f4a0c2e13b5a0f9c8d7e6b"));

        entity.set("id", 7);
        assert_eq!(resolve(&entity), Intent::Malformed);
    }

    #[test]
    fn test_malformed_error_depends_on_operation() {
        assert_eq!(malformed(Operation::DeleteModel), StoreError::IdNotFound);
        assert_eq!(malformed(Operation::GetModel), StoreError::ModelNotFound);
        assert_eq!(malformed(Operation::PutModel), StoreError::ModelNotFound);
    }

    #[test]
    fn test_native_conversion() {
        let oid = ObjectId::new();
        let value = from_native(&oid);
        assert_eq!(to_native(value.as_str().unwrap()).unwrap(), oid);

        let err = to_native("not-an-object-id").unwrap_err();
        assert!(matches!(err, StoreError::InvalidId(_)));
    }

    #[test]
    fn test_key_to_value() {
        let oid = ObjectId::new();
        assert_eq!(key_to_value(Some(&Bson::ObjectId(oid))), Value::String(oid.to_hex()));
        assert_eq!(key_to_value(Some(&Bson::String("k1".into()))), Value::from("k1"));
        assert_eq!(key_to_value(None), Value::Null);
    }
}
