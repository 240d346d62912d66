//! Database Services
//!
//! This module contains the model-level layer over the storage backend:
//!
//! - `Database` - get/set/delete of configuration objects, reference and
//!   uniqueness checks, revision management
//! - `QueryBuilder` - translation of model intents into path expressions
//!
//! Services coordinate between the model registry and the backend store,
//! enforcing object lifecycle rules on the way.

pub mod database;
pub mod error;
pub mod query_builder;

pub use database::{CheckMode, Database, Fetched};
pub use error::DatabaseError;
pub use query_builder::QueryBuilder;
