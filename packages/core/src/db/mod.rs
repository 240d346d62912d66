//! Storage Layer
//!
//! The configuration tree persisted as one JSON document:
//!
//! - [`path`] - path expression language used to address nodes
//! - [`Document`] - in-memory tree with append/replace/remove by path
//! - [`Backend`] - file-backed store with locking and atomic writes
//! - [`RevisionStore`] - snapshots of the document taken before each change
//!
//! # Architecture
//!
//! The backend is the only component that touches the document file. All
//! changes go through a single locked load → mutate → snapshot → save cycle,
//! so concurrent writers (threads or processes) never lose updates.

mod backend;
mod document;
mod error;
mod lock;
pub mod path;
mod revisions;

pub use backend::Backend;
pub use document::Document;
pub use error::BackendError;
pub use lock::{FileLock, LockMode};
pub use path::PathExpr;
pub use revisions::{RevisionInfo, RevisionStore};
