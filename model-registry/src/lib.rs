//! Model Descriptor Registry
//!
//! Turns user input (a name, a model folder or file, a template) into
//! validated, immutable [`easel_engine::ModelDescriptor`]s and keeps them
//! unique by case-insensitive name.
//!
//! # Architecture
//!
//! - [`TemplateCatalog`]: built-in layouts (SD, SDXL, LCM, ...) plus user templates
//! - [`ModelFactory`]: resolves sub-component paths and family defaults
//! - [`ModelRegistry`]: validation and the descriptor store

pub mod error;
pub mod factory;
pub mod registry;
pub mod templates;

pub use error::{RegistryError, Result};
pub use factory::ModelFactory;
pub use registry::ModelRegistry;
pub use templates::{TemplateCatalog, UpscaleTemplate};
