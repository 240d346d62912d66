//! Database Facade
//!
//! Model-level access to the configuration document. Callers work with
//! model ids and [`ConfigObject`]s; the facade resolves models through the
//! registry, builds path expressions with [`QueryBuilder`], and runs them
//! on the [`Backend`].
//!
//! # Object lifecycle
//!
//! An object starts out new (from [`Database::new_object`]) or persisted
//! (from [`Database::get`]). [`Database::set`] inserts new collection members
//! and replaces everything else in place; afterwards the object is
//! persisted. [`Database::delete`] removes it from the document.
//!
//! # Concurrency
//!
//! The backend sits behind a mutex, so a shared `&Database` serializes
//! in-process callers. Cross-process writers are serialized by the
//! backend's file lock.

use crate::config::DatabaseConfig;
use crate::db::path::{is_identifier, scalar_text};
use crate::db::{Backend, BackendError, RevisionInfo};
use crate::models::{ConfigObject, ModelDefinition, ModelError, ModelRegistry};
use crate::services::{DatabaseError, QueryBuilder};
use parking_lot::Mutex;
use std::sync::Arc;

/// How checks report a failed condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckMode {
    /// Return the boolean outcome
    #[default]
    Quiet,

    /// Turn a failed condition into an error
    Strict,
}

/// Result of [`Database::get`]
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    One(ConfigObject),
    Many(Vec<ConfigObject>),
}

impl Fetched {
    pub fn into_vec(self) -> Vec<ConfigObject> {
        match self {
            Self::One(object) => vec![object],
            Self::Many(objects) => objects,
        }
    }

    /// The single object, `None` for a list result
    pub fn into_one(self) -> Option<ConfigObject> {
        match self {
            Self::One(object) => Some(object),
            Self::Many(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(objects) => objects.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Configuration database
pub struct Database {
    backend: Mutex<Backend>,
    registry: Arc<dyn ModelRegistry>,
}

impl Database {
    /// Open the document described by `config`
    pub fn open(
        config: &DatabaseConfig,
        registry: Arc<dyn ModelRegistry>,
    ) -> Result<Self, DatabaseError> {
        let backend = Backend::open(config)?;
        Ok(Self::with_backend(backend, registry))
    }

    /// Wrap an already opened backend
    pub fn with_backend(backend: Backend, registry: Arc<dyn ModelRegistry>) -> Self {
        Self {
            backend: Mutex::new(backend),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<dyn ModelRegistry> {
        &self.registry
    }

    /// Look up a model definition
    pub fn model(&self, id: &str) -> Result<Arc<ModelDefinition>, DatabaseError> {
        self.registry
            .get_model(id)
            .ok_or_else(|| DatabaseError::unknown_model(id))
    }

    /// Read objects of model `id`
    ///
    /// A collection without `key` yields every member in document order,
    /// possibly none. Anything else yields exactly one object or fails
    /// with `NotFound`.
    ///
    /// External edits are noticed by the document's (mtime, length). An
    /// edit of the same length within the filesystem's timestamp
    /// granularity is only seen after [`Database::reload`].
    pub fn get(&self, id: &str, key: Option<&str>) -> Result<Fetched, DatabaseError> {
        let model = self.model(id)?;
        let query = QueryBuilder::new(&model).build_get_query(key);
        tracing::debug!("get {}: {}", id, query);

        let mut backend = self.backend.lock();
        if model.is_iterable() && key.is_none() {
            let raw = backend
                .get_list(&query)
                .map_err(|e| DatabaseError::operation_failed(&query, e))?;
            let objects = raw
                .into_iter()
                .map(|value| ConfigObject::from_raw(model.clone(), value))
                .collect();
            return Ok(Fetched::Many(objects));
        }

        match backend.get(&query) {
            Ok(Some(value)) => Ok(Fetched::One(ConfigObject::from_raw(model.clone(), value))),
            Ok(None) => Err(DatabaseError::not_found(query)),
            Err(e) => Err(DatabaseError::operation_failed(query, e)),
        }
    }

    /// Read exactly one object
    ///
    /// For a collection without `key` this succeeds only when the
    /// collection holds a single member.
    pub fn get_one(&self, id: &str, key: Option<&str>) -> Result<ConfigObject, DatabaseError> {
        match self.get(id, key)? {
            Fetched::One(object) => Ok(object),
            Fetched::Many(mut objects) => {
                let query = self.model(id).map(|m| QueryBuilder::new(&m).build_get_query(None))?;
                match objects.len() {
                    0 => Err(DatabaseError::not_found(query)),
                    1 => Ok(objects.remove(0)),
                    count => Err(DatabaseError::operation_failed(
                        query.clone(),
                        BackendError::Ambiguous { path: query, count },
                    )),
                }
            }
        }
    }

    /// Read every object of model `id`
    pub fn get_list(&self, id: &str) -> Result<Vec<ConfigObject>, DatabaseError> {
        Ok(self.get(id, None)?.into_vec())
    }

    /// Create a new, unsaved object with the model's defaults
    pub fn new_object(&self, id: &str) -> Result<ConfigObject, DatabaseError> {
        Ok(ConfigObject::new(self.model(id)?))
    }

    /// Persist `object`
    ///
    /// New collection members are appended; everything else replaces the
    /// stored node. The object is no longer new afterwards. Appending a
    /// member whose key is already taken fails with `NotUnique`.
    pub fn set(&self, object: &mut ConfigObject) -> Result<(), DatabaseError> {
        ensure_key(object)?;
        let missing = object.missing_required();
        if !missing.is_empty() {
            return Err(ModelError::MissingRequired {
                model: object.model_id().to_string(),
                properties: missing.into_iter().map(str::to_string).collect(),
            }
            .into());
        }

        let model = object.model().clone();
        let query = QueryBuilder::new(&model).build_set_query(object);
        let insert = object.is_new() && model.is_iterable();

        let result = {
            let mut backend = self.backend.lock();
            if insert {
                let taken = QueryBuilder::new(&model).build_get_query(object.key());
                backend.set_unless_exists(&query, object.to_value(), &taken)
            } else {
                backend.replace(&query, object.to_value()).map(|_| true)
            }
        };
        let written = result.map_err(|e| DatabaseError::operation_failed(&query, e))?;
        if !written {
            return Err(DatabaseError::not_unique(
                &model.id,
                model.key_property().unwrap_or_default(),
                object.key().unwrap_or_default(),
            ));
        }

        tracing::info!(
            "{} {} at {}",
            if insert { "Inserted" } else { "Stored" },
            model.id,
            query
        );
        object.mark_persisted();
        Ok(())
    }

    /// Remove `object` from the document
    pub fn delete(&self, object: &ConfigObject) -> Result<(), DatabaseError> {
        ensure_key(object)?;
        let query = QueryBuilder::new(object.model()).build_delete_query(object);

        let removed = self
            .backend
            .lock()
            .delete(&query)
            .map_err(|e| DatabaseError::operation_failed(&query, e))?;
        if !removed {
            return Err(DatabaseError::operation_failed(
                query.clone(),
                BackendError::no_match(query),
            ));
        }

        tracing::info!("Deleted {} at {}", object.model_id(), query);
        Ok(())
    }

    /// Whether another node refers to `object` by its key
    ///
    /// Fails with `NotReferenceable` for models that cannot be referenced,
    /// whatever the mode. In `Strict` mode a reference is an error.
    pub fn is_referenced(&self, object: &ConfigObject, mode: CheckMode) -> Result<bool, DatabaseError> {
        if !object.is_referenceable() {
            return Err(DatabaseError::not_referenceable(object.model_id()));
        }

        let Some(query) = QueryBuilder::new(object.model()).build_is_referenced_query(object) else {
            return Ok(false);
        };
        let referenced = self
            .backend
            .lock()
            .exists(&query)
            .map_err(|e| DatabaseError::operation_failed(&query, e))?;

        if referenced && mode == CheckMode::Strict {
            return Err(DatabaseError::referenced(
                object.model_id(),
                object.key().unwrap_or_default(),
            ));
        }
        Ok(referenced)
    }

    /// Whether any object of model `id` has `property` equal to one of
    /// `candidates`
    pub fn exists<S: AsRef<str>>(
        &self,
        id: &str,
        property: &str,
        candidates: &[S],
    ) -> Result<bool, DatabaseError> {
        let model = self.model(id)?;
        ensure_property_name(&model.id, property)?;
        let Some(query) = QueryBuilder::new(&model).build_exists_query(property, candidates) else {
            return Ok(false);
        };

        self.backend
            .lock()
            .exists(&query)
            .map_err(|e| DatabaseError::operation_failed(query, e))
    }

    /// Whether no other object of the same model shares `object`'s value
    /// for `property`
    ///
    /// Singletons and objects without a value are unique. In `Strict` mode
    /// a duplicate is an error.
    pub fn is_unique(
        &self,
        object: &ConfigObject,
        property: &str,
        mode: CheckMode,
    ) -> Result<bool, DatabaseError> {
        ensure_property_name(object.model_id(), property)?;
        let Some(query) = QueryBuilder::new(object.model()).build_is_unique_query(object, property)
        else {
            return Ok(true);
        };

        let duplicate = self
            .backend
            .lock()
            .exists(&query)
            .map_err(|e| DatabaseError::operation_failed(&query, e))?;

        if duplicate && mode == CheckMode::Strict {
            let value = object.get(property).and_then(scalar_text).unwrap_or_default();
            return Err(DatabaseError::not_unique(object.model_id(), property, value));
        }
        Ok(!duplicate)
    }

    /// Stored revisions, oldest first
    pub fn list_revisions(&self) -> Result<Vec<RevisionInfo>, DatabaseError> {
        Ok(self.backend.lock().list_revisions()?)
    }

    pub fn delete_revision(&self, name: &str) -> Result<(), DatabaseError> {
        Ok(self.backend.lock().delete_revision(name)?)
    }

    /// Delete every revision, returning how many were removed
    pub fn unlink_revisions(&self) -> Result<usize, DatabaseError> {
        Ok(self.backend.lock().unlink_revisions()?)
    }

    /// Restore the document from revision `name`, or the newest one
    pub fn revert(&self, name: Option<&str>) -> Result<RevisionInfo, DatabaseError> {
        let mut backend = self.backend.lock();
        match backend.revert(name) {
            Ok(info) => Ok(info),
            Err(e) => {
                let message = backend
                    .last_error()
                    .map(str::to_string)
                    .unwrap_or_else(|| e.to_string());
                Err(DatabaseError::revert_failed(message))
            }
        }
    }

    /// Re-read the document from disk
    pub fn reload(&self) -> Result<(), DatabaseError> {
        Ok(self.backend.lock().reload()?)
    }

    /// Message of the most recent failed backend operation
    pub fn last_error(&self) -> Option<String> {
        self.backend.lock().last_error().map(str::to_string)
    }
}

/// Collection objects must carry a key to be addressed
fn ensure_key(object: &ConfigObject) -> Result<(), DatabaseError> {
    let Some(key_property) = object.model().key_property() else {
        return Ok(());
    };
    if object.key().is_some_and(|key| !key.is_empty()) {
        return Ok(());
    }
    let value = object
        .get(key_property)
        .map_or_else(|| "missing".to_string(), |v| v.to_string());
    Err(ModelError::invalid_key(object.model_id(), value).into())
}

fn ensure_property_name(model: &str, property: &str) -> Result<(), DatabaseError> {
    if is_identifier(property) {
        Ok(())
    } else {
        Err(DatabaseError::invalid_property(model, property))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("backend", &*self.backend.lock())
            .finish_non_exhaustive()
    }
}

// Facade tests in separate module
#[cfg(test)]
#[path = "database_test.rs"]
mod database_test;
