//! Common types and utilities shared across the Easel crates.
//!
//! This crate provides the configuration, identity and model-family types
//! used by the registry, the residency caches and the generation
//! orchestrator.
//!
//! # Architecture
//!
//! The `common` crate sits at the bottom of the dependency hierarchy:
//! - Has NO dependencies on other workspace crates
//! - Owns the user-facing [`Settings`] (residency policy, memory mode,
//!   realtime refresh rate, default execution settings)
//! - Owns [`ModelKey`], the case-insensitive identity every cache is keyed by

pub mod logging;
pub mod models;
pub mod settings;

pub use models::{ControlNetType, DiffuserType, ModelTemplate, ModelType, PipelineFamily};
pub use settings::{
    ExecutionProviderKind, ExecutionSettings, MemoryMode, ResidencyPolicy, SessionExecutionMode,
    Settings, SettingsError,
};

/// Identity of a model descriptor.
///
/// Descriptor names are unique case-insensitively, so the key stores the
/// lower-cased, trimmed name. Two descriptors whose names differ only by case
/// resolve to the same cache entry.
///
/// ```
/// use common::ModelKey;
///
/// assert_eq!(ModelKey::new("SDXL-Base"), ModelKey::new("sdxl-base"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ModelKey(String);

impl ModelKey {
    /// Create a key from a descriptor name
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    /// Get the inner string reference
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModelKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ModelKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
