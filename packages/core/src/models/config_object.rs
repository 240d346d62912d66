//! Configuration Objects
//!
//! A `ConfigObject` is the in-memory form of one configuration entity. It is
//! bound to a `ModelDefinition` and holds the entity's properties as an
//! ordered JSON map.
//!
//! # Lifecycle
//!
//! - `ConfigObject::new` builds a NEW object from model defaults. Collection
//!   objects get a fresh UUID in their key property.
//! - `ConfigObject::from_raw` wraps data loaded from the document. The object
//!   is not new.
//! - Once `Database::set` persists a new object it stops being new. There is
//!   no transition back.

use crate::models::model::value_type_name;
use crate::models::{ModelDefinition, ModelError};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

/// One configuration entity bound to its model
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigObject {
    model: Arc<ModelDefinition>,
    properties: Map<String, Value>,
    is_new: bool,
}

impl ConfigObject {
    /// Create a new object populated from the model's defaults
    pub fn new(model: Arc<ModelDefinition>) -> Self {
        let mut properties = Map::new();
        if let Some(key) = model.key_property() {
            properties.insert(key.to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        for (name, value) in model.defaults() {
            properties.entry(name).or_insert(value);
        }

        Self {
            model,
            properties,
            is_new: true,
        }
    }

    /// Wrap raw node data loaded from the document
    ///
    /// Non-object values produce an object with no properties.
    pub fn from_raw(model: Arc<ModelDefinition>, raw: Value) -> Self {
        let properties = match raw {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Self {
            model,
            properties,
            is_new: false,
        }
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_iterable(&self) -> bool {
        self.model.is_iterable()
    }

    pub fn is_referenceable(&self) -> bool {
        self.model.is_referenceable()
    }

    pub fn model(&self) -> &Arc<ModelDefinition> {
        &self.model
    }

    pub fn model_id(&self) -> &str {
        &self.model.id
    }

    /// Get a property value
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    /// Get a property as a string slice, if it holds a string
    pub fn get_str(&self, property: &str) -> Option<&str> {
        self.properties.get(property).and_then(Value::as_str)
    }

    /// Set a property value
    ///
    /// Declared properties are type-checked. Undeclared properties are
    /// stored as-is. The key property only takes a non-empty string and is
    /// fixed once the object is persisted.
    pub fn set(&mut self, property: &str, value: impl Into<Value>) -> Result<(), ModelError> {
        let value = value.into();

        if self.model.key_property() == Some(property)
            && !value.as_str().is_some_and(|key| !key.is_empty())
        {
            return Err(ModelError::invalid_key(&self.model.id, value.to_string()));
        }

        if let Some(definition) = self.model.get_property(property) {
            if !definition.property_type.accepts(&value) {
                return Err(ModelError::TypeMismatch {
                    model: self.model.id.clone(),
                    property: property.to_string(),
                    expected: definition.property_type.as_str().to_string(),
                    actual: value_type_name(&value).to_string(),
                });
            }
        }

        if !self.is_new && self.model.key_property() == Some(property) {
            return Err(ModelError::invalid_definition(
                &self.model.id,
                format!("key property '{}' cannot change after persisting", property),
            ));
        }

        self.properties.insert(property.to_string(), value);
        Ok(())
    }

    /// Remove a property, returning its previous value
    pub fn remove(&mut self, property: &str) -> Option<Value> {
        if self.model.key_property() == Some(property) {
            return None;
        }
        self.properties.shift_remove(property)
    }

    /// Identifying key value for collection objects
    pub fn key(&self) -> Option<&str> {
        self.model
            .key_property()
            .and_then(|key| self.properties.get(key))
            .and_then(Value::as_str)
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Node data written to the document
    pub fn to_value(&self) -> Value {
        Value::Object(self.properties.clone())
    }

    /// Names of required properties that are missing or null
    pub fn missing_required(&self) -> Vec<&str> {
        self.model
            .properties
            .iter()
            .filter(|p| p.required)
            .filter(|p| self.properties.get(&p.name).map_or(true, Value::is_null))
            .map(|p| p.name.as_str())
            .collect()
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.is_new = false;
    }
}
