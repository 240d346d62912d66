//! Model Registry
//!
//! The registry is the schema system the database consults for every model
//! id. The database only needs `get_model`; `StaticModelRegistry` is the
//! in-process implementation used by applications and tests.

use crate::models::{ModelDefinition, ModelError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Lookup of model definitions by id
pub trait ModelRegistry: Send + Sync {
    /// Get the definition for a model id, `None` if unknown
    fn get_model(&self, id: &str) -> Option<Arc<ModelDefinition>>;
}

/// In-memory model registry
#[derive(Debug, Default, Clone)]
pub struct StaticModelRegistry {
    models: HashMap<String, Arc<ModelDefinition>>,
}

impl StaticModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of definitions
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ModelDefinition>,
    ) -> Result<Self, ModelError> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    /// Load a registry from a JSON file holding an array of definitions
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| ModelError::load(path, e.to_string()))?;
        let definitions: Vec<ModelDefinition> =
            serde_json::from_str(&contents).map_err(|e| ModelError::load(path, e.to_string()))?;

        let registry = Self::from_definitions(definitions)?;
        tracing::debug!(
            "Loaded {} model definitions from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Register a definition, replacing any previous one with the same id
    pub fn register(&mut self, definition: ModelDefinition) -> Result<(), ModelError> {
        definition.validate()?;
        self.models
            .insert(definition.id.clone(), Arc::new(definition));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ModelRegistry for StaticModelRegistry {
    fn get_model(&self, id: &str) -> Option<Arc<ModelDefinition>> {
        self.models.get(id).cloned()
    }
}
