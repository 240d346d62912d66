//! Query Builder
//!
//! Translates model-level intents into path expressions. Pure and without
//! I/O: the database facade hands the resulting strings to the backend.
//!
//! A model id maps to a document path by its dot-separated segments, so
//! `network.interface` lives at `/network/interface`. Collection members
//! are addressed by a predicate on the key property.

use crate::db::path::{quote_literal, scalar_text};
use crate::models::{ConfigObject, ModelDefinition};

/// Path expression builder for one model
#[derive(Debug, Clone)]
pub struct QueryBuilder<'a> {
    model: &'a ModelDefinition,
    base: String,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(model: &'a ModelDefinition) -> Self {
        let base = model
            .path_segments()
            .map(|segment| format!("/{}", segment))
            .collect();
        Self { model, base }
    }

    /// Path of the model's node (singleton) or of all its members (collection)
    pub fn base_path(&self) -> &str {
        &self.base
    }

    /// Path for reading
    ///
    /// A collection without `key` matches every member. With a key it
    /// matches at most one. Singletons ignore `key`.
    pub fn build_get_query(&self, key: Option<&str>) -> String {
        match (self.model.key_property(), key) {
            (Some(key_property), Some(key)) => self.member_path(key_property, key),
            _ => self.base.clone(),
        }
    }

    /// Path for writing `object`
    ///
    /// New collection members are appended at the collection path. Anything
    /// else is replaced in place.
    pub fn build_set_query(&self, object: &ConfigObject) -> String {
        if object.is_new() && self.model.is_iterable() {
            self.base.clone()
        } else {
            self.exact_path(object)
        }
    }

    /// Exact path of `object`
    pub fn build_delete_query(&self, object: &ConfigObject) -> String {
        self.exact_path(object)
    }

    /// Members whose `property` equals any of `values`
    ///
    /// Returns `None` for an empty candidate list, which can match nothing.
    pub fn build_exists_query<S: AsRef<str>>(&self, property: &str, values: &[S]) -> Option<String> {
        if values.is_empty() {
            return None;
        }
        let alternatives: Vec<String> = values
            .iter()
            .map(|value| format!("{}={}", property, quote_literal(value.as_ref())))
            .collect();
        Some(format!("{}[{}]", self.base, alternatives.join(" or ")))
    }

    /// Other members sharing `object`'s value for `property`
    ///
    /// Returns `None` when the check is trivially satisfied: singletons, and
    /// objects with no scalar value for `property`.
    pub fn build_is_unique_query(&self, object: &ConfigObject, property: &str) -> Option<String> {
        let key_property = self.model.key_property()?;
        let value = object.get(property).and_then(scalar_text)?;
        let key = object.key().unwrap_or_default();
        Some(format!(
            "{}[{}={} and {}!={}]",
            self.base,
            property,
            quote_literal(&value),
            key_property,
            quote_literal(key)
        ))
    }

    /// Nodes anywhere in the document holding `object`'s key as a direct
    /// property, except `object` itself
    ///
    /// Returns `None` for objects without a key value.
    pub fn build_is_referenced_query(&self, object: &ConfigObject) -> Option<String> {
        let key_property = self.model.key_property()?;
        let key = quote_literal(object.key()?);
        Some(format!("//*[*={} and {}!={}]", key, key_property, key))
    }

    fn exact_path(&self, object: &ConfigObject) -> String {
        match self.model.key_property() {
            Some(key_property) => self.member_path(key_property, object.key().unwrap_or_default()),
            None => self.base.clone(),
        }
    }

    fn member_path(&self, key_property: &str, key: &str) -> String {
        format!("{}[{}={}]", self.base, key_property, quote_literal(key))
    }
}
