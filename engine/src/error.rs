use thiserror::Error;

/// Failures reported by the native inference engine
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// The engine observed the cancellation token and stopped early
    #[error("Generation cancelled")]
    Cancelled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Engine failure: {0}")]
    Failed(String),
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
