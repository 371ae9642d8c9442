use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// None of the listed providers can run here
    #[error("No execution provider available (tried {0})")]
    NotAvailable(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;
