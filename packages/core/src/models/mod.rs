//! Data Models
//!
//! This module contains the schema side of the configuration database:
//!
//! - `ModelDefinition` - what a configuration entity looks like and where it lives
//! - `ModelRegistry` - lookup of definitions by model id
//! - `ConfigObject` - one entity instance bound to its model

mod config_object;
mod error;
pub mod model;
mod registry;

pub use config_object::ConfigObject;
pub use error::ModelError;
pub use model::{ModelDefinition, ModelKind, PropertyDefinition, PropertyType};
pub use registry::{ModelRegistry, StaticModelRegistry};
