//! Model Definitions
//!
//! A model describes one kind of configuration entity: where it lives in the
//! document, whether it is a singleton or a collection of siblings, whether
//! other entities may reference it, and which properties it declares.
//!
//! ## Example Definition
//!
//! ```json
//! {
//!   "id": "network.interface",
//!   "kind": { "type": "collection", "key": "uuid" },
//!   "referenceable": true,
//!   "description": "Physical and virtual network interfaces",
//!   "properties": [
//!     { "name": "name", "type": "string", "required": true },
//!     { "name": "enabled", "type": "boolean", "default": true },
//!     { "name": "mtu", "type": "integer", "default": 1500 }
//!   ]
//! }
//! ```
//!
//! The id `network.interface` addresses `/network/interface` in the document.

use crate::db::path::is_identifier;
use crate::models::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Default key property for collection models
pub const DEFAULT_KEY_PROPERTY: &str = "uuid";

fn default_key() -> String {
    DEFAULT_KEY_PROPERTY.to_string()
}

/// Whether a model has one instance or a list of sibling instances
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelKind {
    /// Exactly one instance in the document
    #[default]
    Singleton,

    /// Zero or more siblings, each identified by a unique `key` property
    Collection {
        #[serde(default = "default_key")]
        key: String,
    },
}

/// Declared type of a model property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl PropertyType {
    /// Check whether a JSON value is acceptable for this type
    ///
    /// `null` is accepted for every type and means "unset".
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::String, Value::String(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Number, Value::Number(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Object, Value::Object(_)) => true,
            (Self::Array, Value::Array(_)) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// Name of the JSON type of a value, for error messages
pub(crate) fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Definition of a single property in a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Property name (unique within the model)
    pub name: String,

    /// Declared value type
    #[serde(rename = "type")]
    pub property_type: PropertyType,

    /// Whether new objects must carry a non-null value
    #[serde(default)]
    pub required: bool,

    /// Value assigned to new objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            required: false,
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Complete definition of a configuration model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Dot-separated model id, e.g. `network.interface`
    pub id: String,

    #[serde(default)]
    pub kind: ModelKind,

    /// Whether other entities may point at instances by key value
    #[serde(default)]
    pub referenceable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

impl ModelDefinition {
    /// Create a singleton model definition
    pub fn singleton(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ModelKind::Singleton,
            referenceable: false,
            description: None,
            properties: Vec::new(),
        }
    }

    /// Create a collection model definition keyed by `key`
    pub fn collection(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ModelKind::Collection { key: key.into() },
            referenceable: false,
            description: None,
            properties: Vec::new(),
        }
    }

    pub fn referenceable(mut self, referenceable: bool) -> Self {
        self.referenceable = referenceable;
        self
    }

    pub fn with_property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }

    pub fn is_iterable(&self) -> bool {
        matches!(self.kind, ModelKind::Collection { .. })
    }

    pub fn is_referenceable(&self) -> bool {
        self.referenceable
    }

    /// Key property name for collection models, `None` for singletons
    pub fn key_property(&self) -> Option<&str> {
        match &self.kind {
            ModelKind::Singleton => None,
            ModelKind::Collection { key } => Some(key.as_str()),
        }
    }

    /// Document path segments derived from the model id
    pub fn path_segments(&self) -> impl Iterator<Item = &str> {
        self.id.split('.')
    }

    /// Get a property definition by name
    pub fn get_property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Property map for a freshly constructed object
    ///
    /// Declared properties appear in declaration order. Properties without a
    /// default are left out.
    pub fn defaults(&self) -> Map<String, Value> {
        self.properties
            .iter()
            .filter_map(|p| p.default.clone().map(|d| (p.name.clone(), d)))
            .collect()
    }

    /// Check the definition for structural problems
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.id.is_empty() || !self.id.split('.').all(is_identifier) {
            return Err(ModelError::invalid_id(&self.id));
        }

        if let ModelKind::Collection { key } = &self.kind {
            if !is_identifier(key) {
                return Err(ModelError::invalid_definition(
                    &self.id,
                    format!("invalid key property '{}'", key),
                ));
            }
            if let Some(prop) = self.get_property(key) {
                if prop.property_type != PropertyType::String {
                    return Err(ModelError::invalid_definition(
                        &self.id,
                        format!("key property '{}' must be a string", key),
                    ));
                }
            }
        }

        let mut seen = HashSet::new();
        for prop in &self.properties {
            if !is_identifier(&prop.name) {
                return Err(ModelError::invalid_definition(
                    &self.id,
                    format!("invalid property name '{}'", prop.name),
                ));
            }
            if !seen.insert(prop.name.as_str()) {
                return Err(ModelError::invalid_definition(
                    &self.id,
                    format!("duplicate property '{}'", prop.name),
                ));
            }
            if let Some(default) = &prop.default {
                if !prop.property_type.accepts(default) {
                    return Err(ModelError::TypeMismatch {
                        model: self.id.clone(),
                        property: prop.name.clone(),
                        expected: prop.property_type.as_str().to_string(),
                        actual: value_type_name(default).to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
