//! ConfDB Core: Hierarchical Configuration Database
//!
//! This crate stores application configuration as one JSON document and
//! exposes it as typed, model-bound objects.
//!
//! # Architecture
//!
//! - **Models**: each configuration entity has a model definition naming its
//!   place in the document and whether it is a singleton or a keyed collection
//! - **Path expressions**: an XPath-like subset addresses nodes in the document
//! - **Backend**: a file-backed store with cross-process locking, atomic
//!   writes, and a revision snapshot before every change
//! - **Facade**: `Database` translates model intents into path expressions
//!
//! # Modules
//!
//! - [`models`] - Model definitions, the registry, and `ConfigObject`
//! - [`db`] - Path expressions, document, backend store, and revisions
//! - [`services`] - `Database` facade and `QueryBuilder`
//! - [`config`] - `DatabaseConfig`
//! - [`logging`] - tracing subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use confdb_core::{Database, DatabaseConfig, ModelDefinition, PropertyDefinition, PropertyType, StaticModelRegistry};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = StaticModelRegistry::from_definitions([
//!     ModelDefinition::collection("network.interface", "uuid")
//!         .with_property(PropertyDefinition::new("name", PropertyType::String)),
//! ])?;
//! let db = Database::open(&DatabaseConfig::new("/etc/app/config.json"), Arc::new(registry))?;
//!
//! let mut eth0 = db.new_object("network.interface")?;
//! eth0.set("name", "eth0")?;
//! db.set(&mut eth0)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::{DatabaseConfig, RevertPolicy};
pub use db::{BackendError, RevisionInfo};
pub use models::*;
pub use services::*;
