//! Service Layer Error Types
//!
//! This module defines the error type surfaced by the database facade. Backend
//! failures are wrapped with the path expression that was attempted.

use crate::db::BackendError;
use crate::models::ModelError;
use thiserror::Error;

/// Database facade errors
///
/// The single error type callers of [`crate::services::Database`] see.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Nothing resolves for a single-object read
    #[error("No configuration object found at '{query}'")]
    NotFound { query: String },

    /// Backend rejected a read or write
    #[error("Operation on '{query}' failed: {source}")]
    OperationFailed {
        query: String,
        #[source]
        source: BackendError,
    },

    /// Object is referenced elsewhere and the check was strict
    #[error("{model} '{key}' is referenced by other configuration")]
    Referenced { model: String, key: String },

    /// Another object of the same model shares the value
    #[error("{model}.{property} value '{value}' is not unique")]
    NotUnique {
        model: String,
        property: String,
        value: String,
    },

    /// Reference check requested on a model that cannot be referenced
    #[error("Model '{model}' is not referenceable")]
    NotReferenceable { model: String },

    /// Revert failed, carrying the backend's last error
    #[error("Revert failed: {message}")]
    RevertFailed { message: String },

    /// Property name cannot be used in a path expression
    #[error("Invalid property name for {model}: '{property}'")]
    InvalidProperty { model: String, property: String },

    /// Registry has no model with this id
    #[error("Unknown model: {id}")]
    UnknownModel { id: String },

    /// Object or model definition problem
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Backend failure outside any query
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl DatabaseError {
    /// Create a not found error
    pub fn not_found(query: impl Into<String>) -> Self {
        Self::NotFound {
            query: query.into(),
        }
    }

    /// Create an operation failed error
    pub fn operation_failed(query: impl Into<String>, source: BackendError) -> Self {
        Self::OperationFailed {
            query: query.into(),
            source,
        }
    }

    /// Create a referenced error
    pub fn referenced(model: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Referenced {
            model: model.into(),
            key: key.into(),
        }
    }

    /// Create a not unique error
    pub fn not_unique(
        model: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::NotUnique {
            model: model.into(),
            property: property.into(),
            value: value.into(),
        }
    }

    /// Create a not referenceable error
    pub fn not_referenceable(model: impl Into<String>) -> Self {
        Self::NotReferenceable {
            model: model.into(),
        }
    }

    /// Create a revert failed error
    pub fn revert_failed(message: impl Into<String>) -> Self {
        Self::RevertFailed {
            message: message.into(),
        }
    }

    /// Create an invalid property error
    pub fn invalid_property(model: impl Into<String>, property: impl Into<String>) -> Self {
        Self::InvalidProperty {
            model: model.into(),
            property: property.into(),
        }
    }

    /// Create an unknown model error
    pub fn unknown_model(id: impl Into<String>) -> Self {
        Self::UnknownModel { id: id.into() }
    }

    /// Path expression that was attempted, when known
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::NotFound { query } | Self::OperationFailed { query, .. } => Some(query),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
