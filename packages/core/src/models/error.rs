//! Model Error Types
//!
//! Errors raised while defining models, loading a model registry, or
//! assigning property values on a `ConfigObject`.

use std::path::PathBuf;
use thiserror::Error;

/// Model definition and property validation errors
#[derive(Error, Debug)]
pub enum ModelError {
    /// Model id is not a dot-separated list of identifiers
    #[error("Invalid model id: {0}")]
    InvalidId(String),

    /// Model definition is internally inconsistent
    #[error("Invalid definition for model {model}: {reason}")]
    InvalidDefinition { model: String, reason: String },

    /// Value does not match the declared property type
    #[error("Property {model}.{property} expects {expected}, got {actual}")]
    TypeMismatch {
        model: String,
        property: String,
        expected: String,
        actual: String,
    },

    /// Key property value is not a non-empty string
    #[error("Invalid key value for {model}: {value}")]
    InvalidKey { model: String, value: String },

    /// Required properties are missing or null
    #[error("Model {model} is missing required properties: {}", properties.join(", "))]
    MissingRequired {
        model: String,
        properties: Vec<String>,
    },

    /// Registry file could not be read or parsed
    #[error("Failed to load model registry from {path}: {reason}")]
    Load { path: PathBuf, reason: String },
}

impl ModelError {
    /// Create an invalid id error
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    /// Create an invalid definition error
    pub fn invalid_definition(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(model: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidKey {
            model: model.into(),
            value: value.into(),
        }
    }

    /// Create a registry load error
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
