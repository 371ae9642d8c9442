//! User settings for model residency, memory usage and realtime pacing.
//!
//! Settings are plain serde structs; persistence belongs to the host
//! application, this module only parses TOML it is handed.

use crate::models::ModelTemplate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while reading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How many models of one category may be resident at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResidencyPolicy {
    /// Loading a model evicts every other resident model of the same category
    #[default]
    Single,
    /// Models stay resident until explicitly unloaded
    Multiple,
}

/// Memory budget hint forwarded to the engine and honoured by the
/// feature-extractor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMode {
    #[default]
    Maximum,
    /// Auxiliary models are released right after each use
    Minimum,
}

/// Hardware backend an inference session should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProviderKind {
    #[default]
    Cpu,
    Cuda,
    DirectML,
    TensorRT,
    CoreML,
    OpenVino,
}

impl ExecutionProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::DirectML => "directml",
            Self::TensorRT => "tensorrt",
            Self::CoreML => "coreml",
            Self::OpenVino => "openvino",
        }
    }
}

impl std::fmt::Display for ExecutionProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Graph execution strategy inside an inference session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

/// Per-model execution settings. Copied into every descriptor at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub device_id: i32,
    pub provider: ExecutionProviderKind,
    pub execution_mode: SessionExecutionMode,
    /// 0 lets the engine pick
    pub inter_op_threads: u32,
    /// 0 lets the engine pick
    pub intra_op_threads: u32,
    pub memory_mode: MemoryMode,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            device_id: 0,
            provider: ExecutionProviderKind::default(),
            execution_mode: SessionExecutionMode::default(),
            inter_op_threads: 0,
            intra_op_threads: 0,
            memory_mode: MemoryMode::default(),
        }
    }
}

/// Application settings consumed by the registry and the orchestrator.
///
/// # Example
///
/// ```
/// use common::{Settings, ResidencyPolicy};
///
/// let settings = Settings::from_toml_str(r#"
///     model_residency = "multiple"
///     realtime_refresh_rate_ms = 250
/// "#).unwrap();
///
/// assert_eq!(settings.model_residency, ResidencyPolicy::Multiple);
/// assert_eq!(settings.realtime_refresh_rate().as_millis(), 250);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Residency policy for base models
    pub model_residency: ResidencyPolicy,
    /// Residency policy for ControlNet models, independent of base models
    pub control_net_residency: ResidencyPolicy,
    /// Minimum period between realtime generations
    pub realtime_refresh_rate_ms: u64,
    pub execution: ExecutionSettings,
    /// Tokenizer used when a model folder ships without one
    pub default_tokenizer_path: Option<PathBuf>,
    /// User templates, merged into the built-in catalog
    pub templates: Vec<ModelTemplate>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_residency: ResidencyPolicy::Single,
            control_net_residency: ResidencyPolicy::Single,
            realtime_refresh_rate_ms: 100,
            execution: ExecutionSettings::default(),
            default_tokenizer_path: None,
            templates: Vec::new(),
        }
    }
}

impl Settings {
    /// Parse settings from a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML settings file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    pub fn realtime_refresh_rate(&self) -> Duration {
        Duration::from_millis(self.realtime_refresh_rate_ms)
    }
}
