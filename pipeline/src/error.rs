use easel_engine::EngineError;
use easel_model_cache::CacheError;
use thiserror::Error;

/// Errors surfaced by the generation orchestrator
#[derive(Debug, Error)]
pub enum DiffusionError {
    /// Request rejected before reaching the engine
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Pipeline not loaded: {0}")]
    PipelineNotLoaded(String),

    #[error("ControlNet not loaded: {0}")]
    ControlNetNotLoaded(String),

    #[error("Upscaler not loaded: {0}")]
    UpscalerNotLoaded(String),

    #[error("Engine failure: {0}")]
    Engine(EngineError),

    /// Cooperative cancellation; not a failure
    #[error("Generation cancelled")]
    Cancelled,
}

impl DiffusionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<EngineError> for DiffusionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Cancelled => Self::Cancelled,
            other => Self::Engine(other),
        }
    }
}

impl From<CacheError> for DiffusionError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Engine(e) => e.into(),
            wrong @ CacheError::WrongCategory { .. } => Self::Validation(wrong.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DiffusionError>;
