//! Backend Error Types
//!
//! This module defines error types for the backend store: document I/O,
//! path parsing and resolution, file locking, and revision handling.

use std::path::PathBuf;
use thiserror::Error;

/// Backend store errors
///
/// Covers every failure below the database facade. The facade wraps these
/// with the path expression it attempted.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Reading or writing a file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Document or revision file is not valid JSON
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Document parsed but does not have the expected shape
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Path expression could not be parsed or used for this operation
    #[error("Invalid path expression '{expr}': {reason}")]
    InvalidPath { expr: String, reason: String },

    /// Path expression matched nothing
    #[error("No node matches '{path}'")]
    NoMatch { path: String },

    /// Path expression matched more nodes than the operation allows
    #[error("Path '{path}' matches {count} nodes, expected one")]
    Ambiguous { path: String, count: usize },

    /// Value cannot be stored as a node
    #[error("Invalid node value: {0}")]
    InvalidValue(String),

    /// Advisory lock could not be acquired
    #[error("Failed to lock {path}: {reason}")]
    Lock { path: PathBuf, reason: String },

    /// Named revision does not exist
    #[error("Revision not found: {0}")]
    RevisionNotFound(String),

    /// Revert requested without a name and no revisions exist
    #[error("No revisions available")]
    NoRevisions,

    /// Revision name is not one this store produces
    #[error("Invalid revision name: {0}")]
    InvalidRevisionName(String),
}

impl BackendError {
    /// Create an I/O error for a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a parse error for a path
    pub fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid path error
    pub fn invalid_path(expr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            expr: expr.into(),
            reason: reason.into(),
        }
    }

    /// Create a no-match error
    pub fn no_match(path: impl Into<String>) -> Self {
        Self::NoMatch { path: path.into() }
    }

    /// Create a lock error
    pub fn lock(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Lock {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error means "nothing matched"
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch { .. })
    }
}
