//! Document Revisions
//!
//! A revision is a byte-for-byte copy of the on-disk document taken right
//! before a mutation. Revisions are named `<stem>.<unix-micros>.json` and
//! live in a dedicated directory, so ordering by name suffix is ordering by
//! creation time.

use crate::db::BackendError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Metadata for one stored revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionInfo {
    /// File name, used to select the revision
    pub name: String,

    /// Creation time encoded in the name
    pub created_at: DateTime<Utc>,

    /// Size of the snapshot in bytes
    pub size_bytes: u64,
}

impl RevisionInfo {
    fn micros(&self) -> i64 {
        self.created_at.timestamp_micros()
    }
}

/// Directory of revision files for one document
#[derive(Debug, Clone)]
pub struct RevisionStore {
    dir: PathBuf,
    stem: String,
    max_revisions: Option<usize>,
}

impl RevisionStore {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>, max_revisions: Option<usize>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
            max_revisions,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store `contents` as a new revision and apply retention
    pub fn snapshot(&self, contents: &[u8]) -> Result<RevisionInfo, BackendError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| BackendError::io(&self.dir, e))?;

        // Names must be unique and increasing even for snapshots taken
        // within the same microsecond.
        let newest = self.list()?.last().map(RevisionInfo::micros);
        let mut micros = Utc::now().timestamp_micros();
        if let Some(newest) = newest {
            micros = micros.max(newest + 1);
        }

        let (name, path) = loop {
            let name = self.name_for(micros);
            let path = self.dir.join(&name);
            if !path.exists() {
                break (name, path);
            }
            micros += 1;
        };

        std::fs::write(&path, contents).map_err(|e| BackendError::io(&path, e))?;
        let info = RevisionInfo {
            created_at: DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now),
            name,
            size_bytes: contents.len() as u64,
        };
        tracing::debug!("Stored revision {} ({} bytes)", info.name, info.size_bytes);

        self.enforce_retention()?;
        Ok(info)
    }

    /// All revisions, oldest first
    pub fn list(&self) -> Result<Vec<RevisionInfo>, BackendError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BackendError::io(&self.dir, e)),
        };

        let mut revisions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BackendError::io(&self.dir, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(micros) = self.parse_micros(&name) else {
                continue;
            };
            let Some(created_at) = DateTime::from_timestamp_micros(micros) else {
                continue;
            };
            let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            revisions.push(RevisionInfo {
                name,
                created_at,
                size_bytes,
            });
        }

        revisions.sort_by_key(RevisionInfo::micros);
        Ok(revisions)
    }

    /// Most recent revision, if any
    pub fn latest(&self) -> Result<Option<RevisionInfo>, BackendError> {
        Ok(self.list()?.pop())
    }

    /// Find a revision by name
    pub fn find(&self, name: &str) -> Result<RevisionInfo, BackendError> {
        self.check_name(name)?;
        self.list()?
            .into_iter()
            .find(|r| r.name == name)
            .ok_or_else(|| BackendError::RevisionNotFound(name.to_string()))
    }

    /// Read the stored bytes of a revision
    pub fn read(&self, name: &str) -> Result<Vec<u8>, BackendError> {
        self.check_name(name)?;
        let path = self.dir.join(name);
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BackendError::RevisionNotFound(name.to_string()),
            _ => BackendError::io(&path, e),
        })
    }

    /// Delete one revision
    pub fn delete(&self, name: &str) -> Result<(), BackendError> {
        self.check_name(name)?;
        let path = self.dir.join(name);
        std::fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BackendError::RevisionNotFound(name.to_string()),
            _ => BackendError::io(&path, e),
        })
    }

    /// Delete every revision, returning how many were removed
    pub fn clear(&self) -> Result<usize, BackendError> {
        let revisions = self.list()?;
        for revision in &revisions {
            self.delete(&revision.name)?;
        }
        Ok(revisions.len())
    }

    /// Delete every revision newer than `name`, returning how many were removed
    pub fn prune_newer_than(&self, name: &str) -> Result<usize, BackendError> {
        let pivot = self.find(name)?.micros();
        let newer: Vec<RevisionInfo> = self
            .list()?
            .into_iter()
            .filter(|r| r.micros() > pivot)
            .collect();
        for revision in &newer {
            self.delete(&revision.name)?;
        }
        Ok(newer.len())
    }

    fn enforce_retention(&self) -> Result<(), BackendError> {
        let Some(max) = self.max_revisions else {
            return Ok(());
        };
        let revisions = self.list()?;
        let excess = revisions.len().saturating_sub(max);
        for revision in revisions.iter().take(excess) {
            tracing::debug!("Retention removes revision {}", revision.name);
            self.delete(&revision.name)?;
        }
        Ok(())
    }

    fn name_for(&self, micros: i64) -> String {
        format!("{}.{}.json", self.stem, micros)
    }

    fn parse_micros(&self, name: &str) -> Option<i64> {
        let rest = name.strip_prefix(&self.stem)?.strip_prefix('.')?;
        let digits = rest.strip_suffix(".json")?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    fn check_name(&self, name: &str) -> Result<(), BackendError> {
        if self.parse_micros(name).is_some() {
            Ok(())
        } else {
            Err(BackendError::InvalidRevisionName(name.to_string()))
        }
    }
}
