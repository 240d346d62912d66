//! Backend Store
//!
//! Owns the persisted document and is the only component that touches the
//! document file and its revisions.
//!
//! # Write cycle
//!
//! Every mutation runs the same sequence under an exclusive advisory lock:
//!
//! 1. re-read the on-disk document (another process may have written it)
//! 2. apply the change to a copy
//! 3. snapshot the on-disk bytes as a revision (when versioning is on)
//! 4. write the copy to a temp file and rename it over the document
//!
//! A failure at any step leaves the on-disk document unchanged. Reads take a
//! shared lock and re-load only when the file stamp changed.
//!
//! # Errors
//!
//! Operations return `Result`. The message of the most recent failure is
//! also kept and exposed through `last_error()`.

use crate::config::{DatabaseConfig, RevertPolicy};
use crate::db::document::Document;
use crate::db::lock::{FileLock, LockMode};
use crate::db::path::PathExpr;
use crate::db::revisions::{RevisionInfo, RevisionStore};
use crate::db::BackendError;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Identity of the on-disk document at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> Result<Self, BackendError> {
        let metadata = std::fs::metadata(path).map_err(|e| BackendError::io(path, e))?;
        Ok(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

/// File-backed document store with revisions
#[derive(Debug)]
pub struct Backend {
    document_path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
    versioning: bool,
    revert_policy: RevertPolicy,
    revisions: RevisionStore,
    document: Document,
    stamp: Option<FileStamp>,
    last_error: Option<String>,
}

impl Backend {
    /// Open the document described by `config` and load it
    ///
    /// Fails when the document is missing or corrupt, unless
    /// `create_if_missing` is set and the file does not exist yet.
    pub fn open(config: &DatabaseConfig) -> Result<Self, BackendError> {
        config.validate().map_err(BackendError::InvalidDocument)?;

        let mut backend = Self {
            document_path: config.document_path.clone(),
            lock_path: config.lock_path(),
            lock_timeout: config.lock_timeout(),
            versioning: config.versioning,
            revert_policy: config.revert_policy,
            revisions: RevisionStore::new(
                config.revisions_dir(),
                config.document_stem(),
                config.max_revisions,
            ),
            document: Document::empty(),
            stamp: None,
            last_error: None,
        };

        if config.create_if_missing && !backend.document_path.exists() {
            backend.initialize()?;
        }
        backend.load()?;

        tracing::info!(
            "Opened configuration document {} (versioning: {})",
            backend.document_path.display(),
            backend.versioning
        );
        Ok(backend)
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    /// In-memory copy of the document as last loaded or written
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Message of the most recent failed operation
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Read the persisted document into memory
    pub fn load(&mut self) -> Result<(), BackendError> {
        let result = self.load_locked();
        self.track(result)
    }

    /// Force a re-read of the persisted document
    pub fn reload(&mut self) -> Result<(), BackendError> {
        self.stamp = None;
        self.load()
    }

    /// Raw data at `path`, `None` when nothing matches
    pub fn get(&mut self, path: &str) -> Result<Option<Value>, BackendError> {
        let result = self
            .refresh()
            .and_then(|_| PathExpr::parse(path))
            .and_then(|expr| self.document.get(&expr));
        self.track(result)
    }

    /// Raw data of every node at `path`, in document order
    pub fn get_list(&mut self, path: &str) -> Result<Vec<Value>, BackendError> {
        let result = self
            .refresh()
            .and_then(|_| PathExpr::parse(path))
            .map(|expr| self.document.get_list(&expr));
        self.track(result)
    }

    /// Whether anything matches `path`
    pub fn exists(&mut self, path: &str) -> Result<bool, BackendError> {
        let result = self
            .refresh()
            .and_then(|_| PathExpr::parse(path))
            .map(|expr| self.document.exists(&expr));
        self.track(result)
    }

    /// Append a new node with `values` to the list at `path`
    pub fn set(&mut self, path: &str, values: Value) -> Result<(), BackendError> {
        let result = PathExpr::parse(path).and_then(|expr| {
            self.mutate(|document| {
                document.append(&expr, values)?;
                Ok(((), true))
            })
        });
        self.track(result)
    }

    /// Append like [`Backend::set`] unless `guard` already matches a node
    ///
    /// The check and the append run in one locked cycle. Returns whether the
    /// node was appended; nothing is written or snapshotted otherwise.
    pub fn set_unless_exists(
        &mut self,
        path: &str,
        values: Value,
        guard: &str,
    ) -> Result<bool, BackendError> {
        let result = PathExpr::parse(path).and_then(|expr| {
            let guard = PathExpr::parse(guard)?;
            self.mutate(|document| {
                if document.exists(&guard) {
                    return Ok((false, false));
                }
                document.append(&expr, values)?;
                Ok((true, true))
            })
        });
        self.track(result)
    }

    /// Overwrite the node(s) at `path` with `values`, returning how many
    pub fn replace(&mut self, path: &str, values: Value) -> Result<usize, BackendError> {
        let result = PathExpr::parse(path).and_then(|expr| {
            self.mutate(|document| {
                let written = document.replace(&expr, values)?;
                Ok((written, true))
            })
        });
        self.track(result)
    }

    /// Remove the node(s) at `path`, returning whether anything was removed
    pub fn delete(&mut self, path: &str) -> Result<bool, BackendError> {
        let result = PathExpr::parse(path).and_then(|expr| {
            self.mutate(|document| {
                let removed = document.remove(&expr);
                Ok((removed > 0, removed > 0))
            })
        });
        self.track(result)
    }

    /// Stored revisions, oldest first
    pub fn list_revisions(&mut self) -> Result<Vec<RevisionInfo>, BackendError> {
        let result = self.revisions.list();
        self.track(result)
    }

    /// Delete one revision by name
    pub fn delete_revision(&mut self, name: &str) -> Result<(), BackendError> {
        let result = self.revisions.delete(name);
        self.track(result)
    }

    /// Delete every revision, leaving the live document untouched
    pub fn unlink_revisions(&mut self) -> Result<usize, BackendError> {
        let result = self.with_lock(LockMode::Exclusive, |backend| backend.revisions.clear());
        if let Ok(count) = &result {
            tracing::info!("Removed {} revisions", count);
        }
        self.track(result)
    }

    /// Restore the document from revision `name`, or the newest one
    ///
    /// Afterwards the revision history is trimmed according to the
    /// configured `RevertPolicy`.
    pub fn revert(&mut self, name: Option<&str>) -> Result<RevisionInfo, BackendError> {
        let result = self.with_lock(LockMode::Exclusive, |backend| backend.revert_locked(name));
        self.track(result)
    }

    fn revert_locked(&mut self, name: Option<&str>) -> Result<RevisionInfo, BackendError> {
        let info = match name {
            Some(name) => self.revisions.find(name)?,
            None => self.revisions.latest()?.ok_or(BackendError::NoRevisions)?,
        };

        let bytes = self.revisions.read(&info.name)?;
        let snapshot_path = self.revisions.dir().join(&info.name);
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::parse(&snapshot_path, e))?;
        let restored = Document::from_value(value)?;

        self.write_document(&restored)?;
        self.document = restored;
        self.stamp = Some(FileStamp::of(&self.document_path)?);

        let removed = match self.revert_policy {
            RevertPolicy::ClearAll => self.revisions.clear()?,
            RevertPolicy::PruneNewer => self.revisions.prune_newer_than(&info.name)?,
        };
        tracing::info!(
            "Reverted {} to revision {} ({} revisions removed)",
            self.document_path.display(),
            info.name,
            removed
        );
        Ok(info)
    }

    fn initialize(&mut self) -> Result<(), BackendError> {
        if let Some(parent) = self.document_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| BackendError::io(parent, e))?;
            }
        }

        self.with_lock(LockMode::Exclusive, |backend| {
            if backend.document_path.exists() {
                return Ok(());
            }
            tracing::info!(
                "Creating empty configuration document at {}",
                backend.document_path.display()
            );
            backend.write_document(&Document::empty())
        })
    }

    fn load_locked(&mut self) -> Result<(), BackendError> {
        self.with_lock(LockMode::Shared, |backend| {
            let (_, document, stamp) = backend.read_from_disk()?;
            backend.document = document;
            backend.stamp = Some(stamp);
            tracing::debug!("Loaded {}", backend.document_path.display());
            Ok(())
        })
    }

    /// Re-load when the file changed since the last load or write
    ///
    /// Changes are detected by (mtime, length). A same-length edit within the
    /// filesystem's timestamp granularity goes unseen until `reload`.
    fn refresh(&mut self) -> Result<(), BackendError> {
        self.with_lock(LockMode::Shared, |backend| {
            let stamp = FileStamp::of(&backend.document_path)?;
            if backend.stamp == Some(stamp) {
                return Ok(());
            }
            let (_, document, stamp) = backend.read_from_disk()?;
            backend.document = document;
            backend.stamp = Some(stamp);
            tracing::debug!(
                "Document {} changed on disk, reloaded",
                backend.document_path.display()
            );
            Ok(())
        })
    }

    /// Run one load → mutate → snapshot → save cycle
    ///
    /// `op` returns its result and whether it changed the document. Nothing
    /// is written or snapshotted for unchanged documents.
    fn mutate<T>(
        &mut self,
        op: impl FnOnce(&mut Document) -> Result<(T, bool), BackendError>,
    ) -> Result<T, BackendError> {
        self.with_lock(LockMode::Exclusive, |backend| {
            let (bytes, current, stamp) = backend.read_from_disk()?;
            let mut working = current.clone();
            let outcome = op(&mut working);

            backend.document = current;
            backend.stamp = Some(stamp);
            let (value, changed) = outcome?;
            if !changed {
                return Ok(value);
            }

            if backend.versioning {
                backend.revisions.snapshot(&bytes)?;
            }
            backend.write_document(&working)?;
            backend.document = working;
            backend.stamp = Some(FileStamp::of(&backend.document_path)?);
            Ok(value)
        })
    }

    fn with_lock<T>(
        &mut self,
        mode: LockMode,
        f: impl FnOnce(&mut Self) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let _lock = FileLock::acquire(&self.lock_path, mode, self.lock_timeout)?;
        f(self)
    }

    fn read_from_disk(&self) -> Result<(Vec<u8>, Document, FileStamp), BackendError> {
        let path = &self.document_path;
        let stamp = FileStamp::of(path)?;
        let bytes = std::fs::read(path).map_err(|e| BackendError::io(path, e))?;
        let value: Value =
            serde_json::from_slice(&bytes).map_err(|e| BackendError::parse(path, e))?;
        let document = Document::from_value(value)?;
        Ok((bytes, document, stamp))
    }

    /// Atomically replace the document file
    fn write_document(&self, document: &Document) -> Result<(), BackendError> {
        let path = &self.document_path;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let text = document
            .to_pretty_string()
            .map_err(|e| BackendError::InvalidDocument(e.to_string()))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| BackendError::io(dir, e))?;
        temp.write_all(text.as_bytes())
            .map_err(|e| BackendError::io(temp.path(), e))?;
        // temp files are created 0600; keep the document's own mode
        if let Ok(metadata) = std::fs::metadata(path) {
            temp.as_file()
                .set_permissions(metadata.permissions())
                .map_err(|e| BackendError::io(temp.path(), e))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|e| BackendError::io(temp.path(), e))?;
        temp.persist(path)
            .map_err(|e| BackendError::io(path, e.error))?;
        Ok(())
    }

    fn track<T>(&mut self, result: Result<T, BackendError>) -> Result<T, BackendError> {
        if let Err(e) = &result {
            tracing::warn!("Backend operation failed: {}", e);
            self.last_error = Some(e.to_string());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_with(dir: &TempDir, contents: &str, tweak: impl FnOnce(&mut DatabaseConfig)) -> Backend {
        let path = dir.path().join("config.json");
        std::fs::write(&path, contents).unwrap();
        let mut config = DatabaseConfig::new(path);
        config.lock_timeout_ms = 200;
        tweak(&mut config);
        Backend::open(&config).unwrap()
    }

    fn open(dir: &TempDir) -> Backend {
        open_with(dir, r#"{ "system": { "hostname": "fw" } }"#, |_| {})
    }

    fn on_disk(backend: &Backend) -> Value {
        serde_json::from_slice(&std::fs::read(backend.document_path()).unwrap()).unwrap()
    }

    #[test]
    fn test_open_fails_for_missing_or_corrupt_document() {
        let dir = TempDir::new().unwrap();
        let missing = DatabaseConfig::new(dir.path().join("missing.json"));
        assert!(matches!(Backend::open(&missing), Err(BackendError::Io { .. })));

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{ broken").unwrap();
        assert!(matches!(
            Backend::open(&DatabaseConfig::new(&corrupt)),
            Err(BackendError::Parse { .. })
        ));

        let not_object = dir.path().join("array.json");
        std::fs::write(&not_object, "[]").unwrap();
        assert!(matches!(
            Backend::open(&DatabaseConfig::new(&not_object)),
            Err(BackendError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_create_if_missing() {
        let dir = TempDir::new().unwrap();
        let mut config = DatabaseConfig::new(dir.path().join("nested/config.json"));
        config.create_if_missing = true;

        let mut backend = Backend::open(&config).unwrap();
        assert_eq!(backend.document().root(), &json!({}));
        assert_eq!(backend.get_list("/anything").unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn test_set_appends_and_persists() {
        let dir = TempDir::new().unwrap();
        let mut backend = open(&dir);

        backend
            .set("/network/interface", json!({ "uuid": "u1" }))
            .unwrap();
        backend
            .set("/network/interface", json!({ "uuid": "u2" }))
            .unwrap();

        assert_eq!(
            on_disk(&backend)["network"]["interface"],
            json!([{ "uuid": "u1" }, { "uuid": "u2" }])
        );
        assert_eq!(backend.get_list("/network/interface").unwrap().len(), 2);
    }

    #[test]
    fn test_set_unless_exists() {
        let dir = TempDir::new().unwrap();
        let mut backend = open(&dir);

        let guard = "/network/interface[uuid='u1']";
        assert!(backend
            .set_unless_exists("/network/interface", json!({ "uuid": "u1" }), guard)
            .unwrap());
        assert!(!backend
            .set_unless_exists("/network/interface", json!({ "uuid": "u1" }), guard)
            .unwrap());

        assert_eq!(backend.get_list("/network/interface").unwrap().len(), 1);
        assert_eq!(backend.list_revisions().unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_keeps_document_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let mut backend = open(&dir);
        std::fs::set_permissions(
            backend.document_path(),
            std::fs::Permissions::from_mode(0o644),
        )
        .unwrap();

        backend.replace("/system", json!({ "hostname": "a" })).unwrap();

        let mode = std::fs::metadata(backend.document_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_reload_sees_same_length_edit() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_with(&dir, r#"{ "system": { "hostname": "aa" } }"#, |_| {});
        assert_eq!(
            backend.get("/system").unwrap(),
            Some(json!({ "hostname": "aa" }))
        );

        std::fs::write(
            backend.document_path(),
            r#"{ "system": { "hostname": "bb" } }"#,
        )
        .unwrap();
        backend.reload().unwrap();
        assert_eq!(
            backend.get("/system").unwrap(),
            Some(json!({ "hostname": "bb" }))
        );
    }

    #[test]
    fn test_get_none_vs_empty_list() {
        let dir = TempDir::new().unwrap();
        let mut backend = open(&dir);

        assert_eq!(backend.get("/network").unwrap(), None);
        assert!(backend.get_list("/network/interface").unwrap().is_empty());
        assert!(backend.exists("/system").unwrap());
        assert!(!backend.exists("/network").unwrap());
    }

    #[test]
    fn test_failed_mutation_leaves_disk_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut backend = open(&dir);
        let before = std::fs::read(backend.document_path()).unwrap();

        let err = backend
            .replace("/network/interface[uuid='nope']", json!({}))
            .unwrap_err();
        assert!(err.is_no_match());
        assert!(backend.last_error().unwrap().contains("nope"));
        assert_eq!(std::fs::read(backend.document_path()).unwrap(), before);
        assert!(backend.list_revisions().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_path_is_recorded() {
        let dir = TempDir::new().unwrap();
        let mut backend = open(&dir);

        assert!(matches!(
            backend.get("system"),
            Err(BackendError::InvalidPath { .. })
        ));
        assert!(backend.last_error().unwrap().contains("Invalid path expression"));
    }

    #[test]
    fn test_delete_reports_whether_anything_was_removed() {
        let dir = TempDir::new().unwrap();
        let mut backend = open(&dir);

        assert!(!backend.delete("/network").unwrap());
        assert!(backend.list_revisions().unwrap().is_empty());

        assert!(backend.delete("/system").unwrap());
        assert_eq!(on_disk(&backend), json!({}));
        assert_eq!(backend.list_revisions().unwrap().len(), 1);
    }

    #[test]
    fn test_every_change_snapshots_previous_state() {
        let dir = TempDir::new().unwrap();
        let mut backend = open(&dir);

        backend.replace("/system", json!({ "hostname": "a" })).unwrap();
        backend.replace("/system", json!({ "hostname": "b" })).unwrap();

        let revisions = backend.list_revisions().unwrap();
        assert_eq!(revisions.len(), 2);

        let first = backend.revisions.read(&revisions[0].name).unwrap();
        let first: Value = serde_json::from_slice(&first).unwrap();
        assert_eq!(first["system"]["hostname"], json!("fw"));
    }

    #[test]
    fn test_versioning_disabled() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_with(&dir, "{}", |c| c.versioning = false);

        backend.replace("/system", json!({ "hostname": "a" })).unwrap();
        assert!(backend.list_revisions().unwrap().is_empty());
        assert!(matches!(backend.revert(None), Err(BackendError::NoRevisions)));
        assert_eq!(backend.last_error(), Some("No revisions available"));
    }

    #[test]
    fn test_revert_latest_clears_history() {
        let dir = TempDir::new().unwrap();
        let mut backend = open(&dir);

        backend.replace("/system", json!({ "hostname": "a" })).unwrap();
        backend.replace("/system", json!({ "hostname": "b" })).unwrap();

        let restored = backend.revert(None).unwrap();
        assert!(restored.name.starts_with("config."));
        assert_eq!(on_disk(&backend)["system"]["hostname"], json!("a"));
        assert_eq!(
            backend.get("/system").unwrap(),
            Some(json!({ "hostname": "a" }))
        );
        assert!(backend.list_revisions().unwrap().is_empty());
    }

    #[test]
    fn test_revert_named_with_prune_newer() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_with(&dir, r#"{ "system": { "hostname": "fw" } }"#, |c| {
            c.revert_policy = RevertPolicy::PruneNewer
        });

        backend.replace("/system", json!({ "hostname": "a" })).unwrap();
        backend.replace("/system", json!({ "hostname": "b" })).unwrap();
        backend.replace("/system", json!({ "hostname": "c" })).unwrap();
        let revisions = backend.list_revisions().unwrap();

        backend.revert(Some(&revisions[1].name)).unwrap();
        assert_eq!(on_disk(&backend)["system"]["hostname"], json!("a"));

        let left: Vec<String> = backend
            .list_revisions()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(left, vec![revisions[0].name.clone(), revisions[1].name.clone()]);
    }

    #[test]
    fn test_revert_unknown_revision() {
        let dir = TempDir::new().unwrap();
        let mut backend = open(&dir);

        assert!(matches!(
            backend.revert(Some("config.1.json")),
            Err(BackendError::RevisionNotFound(_))
        ));
        assert!(matches!(
            backend.revert(Some("../../etc/passwd")),
            Err(BackendError::InvalidRevisionName(_))
        ));
    }

    #[test]
    fn test_unlink_revisions_keeps_document() {
        let dir = TempDir::new().unwrap();
        let mut backend = open(&dir);

        backend.replace("/system", json!({ "hostname": "a" })).unwrap();
        backend.replace("/system", json!({ "hostname": "b" })).unwrap();

        assert_eq!(backend.unlink_revisions().unwrap(), 2);
        assert!(backend.list_revisions().unwrap().is_empty());
        assert_eq!(on_disk(&backend)["system"]["hostname"], json!("b"));
    }

    #[test]
    fn test_sees_writes_from_other_handles() {
        let dir = TempDir::new().unwrap();
        let mut first = open(&dir);
        let config = DatabaseConfig::new(first.document_path());
        let mut second = Backend::open(&config).unwrap();

        second
            .set("/network/interface", json!({ "uuid": "u1" }))
            .unwrap();
        first
            .set("/network/interface", json!({ "uuid": "u2" }))
            .unwrap();

        assert_eq!(first.get_list("/network/interface").unwrap().len(), 2);
        assert_eq!(second.get_list("/network/interface").unwrap().len(), 2);
    }
}
