//! Entities and their typed attributes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use entitystore_common::PreconditionError;

use crate::core::Value;

/// Name of the identity attribute, always at index 0.
pub const ID_ATTRIBUTE: &str = "id";

/// Declared attribute kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    /// Identity or reference to another entity's identity
    Id,
    /// Point in time; filters match a whole calendar day
    Date,
    String,
    Number,
    Boolean,
    /// Opaque value, not type checked
    Object,
}

impl AttributeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AttributeType::Id => "ID",
            AttributeType::Date => "Date",
            AttributeType::String => "String",
            AttributeType::Number => "Number",
            AttributeType::Boolean => "Boolean",
            AttributeType::Object => "Object",
        }
    }

    /// Whether `value` is acceptable for an attribute of this type.
    /// Null is acceptable everywhere.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (AttributeType::Object, _) => true,
            (AttributeType::Id | AttributeType::String, Value::String(_)) => true,
            (AttributeType::Date, Value::Date(_)) => true,
            (AttributeType::Number, Value::Integer(_) | Value::Float(_)) => true,
            (AttributeType::Boolean, Value::Bool(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "id" => Ok(AttributeType::Id),
            "date" => Ok(AttributeType::Date),
            "string" => Ok(AttributeType::String),
            "number" => Ok(AttributeType::Number),
            "boolean" | "bool" => Ok(AttributeType::Boolean),
            "object" => Ok(AttributeType::Object),
            other => Err(format!("unknown attribute type: {other}")),
        }
    }
}

/// One named, typed field of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub attribute_type: AttributeType,
    pub value: Value,
}

impl Attribute {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            value: Value::Null,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }
}

/// A generic attributed record.
///
/// The attribute order is fixed at construction and is the only order rows
/// are ever reported in. Index 0 is the identity attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Collection (table) the entity is stored in
    pub model_type: String,
    pub attributes: Vec<Attribute>,
}

impl Entity {
    /// New entity with only the identity attribute
    pub fn new(model_type: impl Into<String>) -> Self {
        Self {
            model_type: model_type.into(),
            attributes: vec![Attribute::new(ID_ATTRIBUTE, AttributeType::Id)],
        }
    }

    /// Append an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, attribute_type: AttributeType) -> Self {
        self.attributes.push(Attribute::new(name, attribute_type));
        self
    }

    /// Builder-style [`Entity::set`]
    #[must_use]
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attributes.iter_mut().find(|a| a.name == name)
    }

    /// Declared type of the named attribute
    #[must_use]
    pub fn attribute_type(&self, name: &str) -> Option<AttributeType> {
        self.attribute(name).map(|a| a.attribute_type)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attribute(name).map(|a| &a.value)
    }

    /// Set the named attribute's value; false if there is no such attribute
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> bool {
        match self.attribute_mut(name) {
            Some(attribute) => {
                attribute.value = value.into();
                true
            }
            None => false,
        }
    }

    /// Name of the identity attribute
    #[must_use]
    pub fn identity_name(&self) -> &str {
        self.attributes.first().map_or(ID_ATTRIBUTE, |a| a.name.as_str())
    }

    /// Value of the identity attribute
    #[must_use]
    pub fn identity(&self) -> &Value {
        static NULL: Value = Value::Null;
        self.attributes.first().map_or(&NULL, |a| &a.value)
    }

    pub(crate) fn set_identity(&mut self, value: Value) {
        if let Some(identity) = self.attributes.first_mut() {
            identity.value = value;
        }
    }

    /// True when `name` is the identity attribute
    #[must_use]
    pub fn is_identity(&self, name: &str) -> bool {
        self.attributes.first().is_some_and(|a| a.name == name)
    }

    /// Self-validation: every problem with this entity's state.
    #[must_use]
    pub fn state_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.model_type.is_empty() {
            errors.push("model type is required".to_string());
        }

        match self.attributes.first() {
            Some(first) if first.name == ID_ATTRIBUTE && first.attribute_type == AttributeType::Id => {}
            Some(_) => errors.push(format!("first attribute must be {ID_ATTRIBUTE} of type ID")),
            None => errors.push("model has no attributes".to_string()),
        }

        let mut seen = HashSet::new();
        for (index, attribute) in self.attributes.iter().enumerate() {
            if attribute.name.is_empty() {
                errors.push(format!("attribute {index} has no name"));
            } else if !seen.insert(attribute.name.as_str()) {
                errors.push(format!("duplicate attribute: {}", attribute.name));
            }
            // identity values are checked by the store, not here
            if index > 0 && !attribute.attribute_type.accepts(&attribute.value) {
                errors.push(format!(
                    "{} must be {}, got {}",
                    attribute.name,
                    attribute.attribute_type,
                    attribute.value.type_name()
                ));
            }
        }

        errors
    }

    /// Fail with "model has validation errors" unless [`Entity::state_errors`] is empty
    pub fn ensure_valid(&self) -> Result<(), PreconditionError> {
        let errors = self.state_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PreconditionError::ValidationFailed(errors))
        }
    }
}
