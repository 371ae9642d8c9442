use thiserror::Error;

/// Errors raised while creating or editing model descriptors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The descriptor was rejected: bad name, name collision, missing files,
    /// unknown template
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
