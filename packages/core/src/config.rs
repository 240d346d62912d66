//! Configuration for the configuration database
//!
//! Loaded from a JSON file or built in code. Every field has a default so
//! partial files deserialize without error.

use crate::db::BackendError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration document
pub const DEFAULT_DOCUMENT_PATH: &str = "/var/lib/confdb/config.json";

/// Environment variable overriding `document_path`
pub const DOCUMENT_PATH_ENV: &str = "CONFDB_DOCUMENT_PATH";

/// Environment variable overriding `revisions_dir`
pub const REVISIONS_DIR_ENV: &str = "CONFDB_REVISIONS_DIR";

/// What happens to revision history after a revert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevertPolicy {
    /// Remove every revision
    #[default]
    ClearAll,

    /// Remove only revisions newer than the restored one
    PruneNewer,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the persisted document
    pub document_path: PathBuf,

    /// Directory for revision files (default: `<document dir>/revisions`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revisions_dir: Option<PathBuf>,

    /// Snapshot the document before every mutation
    pub versioning: bool,

    /// Keep at most this many revisions, oldest removed first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_revisions: Option<usize>,

    pub revert_policy: RevertPolicy,

    /// How long to wait for the document lock
    pub lock_timeout_ms: u64,

    /// Write an empty document at open time when none exists
    pub create_if_missing: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from(DEFAULT_DOCUMENT_PATH),
            revisions_dir: None,
            versioning: true,
            max_revisions: None,
            revert_policy: RevertPolicy::default(),
            lock_timeout_ms: 5000,
            create_if_missing: false,
        }
    }
}

impl DatabaseConfig {
    /// Default configuration for a document at `document_path`
    pub fn new(document_path: impl Into<PathBuf>) -> Self {
        Self {
            document_path: document_path.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| BackendError::io(path, e))?;
        serde_json::from_str(&contents).map_err(|e| BackendError::parse(path, e))
    }

    /// Apply `CONFDB_DOCUMENT_PATH` and `CONFDB_REVISIONS_DIR` overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var(DOCUMENT_PATH_ENV) {
            tracing::info!("Using document path from {}: {}", DOCUMENT_PATH_ENV, path);
            self.document_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var(REVISIONS_DIR_ENV) {
            tracing::info!("Using revisions directory from {}: {}", REVISIONS_DIR_ENV, dir);
            self.revisions_dir = Some(PathBuf::from(dir));
        }
        self
    }

    /// Resolved revisions directory
    pub fn revisions_dir(&self) -> PathBuf {
        match &self.revisions_dir {
            Some(dir) => dir.clone(),
            None => self.document_dir().join("revisions"),
        }
    }

    /// Directory holding the document
    pub fn document_dir(&self) -> PathBuf {
        match self.document_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Advisory lock file next to the document
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.document_path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Prefix shared by revision file names
    pub fn document_stem(&self) -> String {
        self.document_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("config")
            .to_string()
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.document_path.as_os_str().is_empty() {
            return Err("document_path cannot be empty".to_string());
        }

        if self.document_path.file_name().is_none() {
            return Err(format!(
                "document_path must name a file: {}",
                self.document_path.display()
            ));
        }

        if self.max_revisions == Some(0) {
            return Err("max_revisions must be greater than 0 when set".to_string());
        }

        if let Some(dir) = &self.revisions_dir {
            if dir.as_os_str().is_empty() {
                return Err("revisions_dir cannot be empty when set".to_string());
            }
        }

        Ok(())
    }
}
