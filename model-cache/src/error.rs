use easel_engine::{EngineError, ModelCategory};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("'{name}' is a {actual} model, this cache holds {expected} models")]
    WrongCategory {
        name: String,
        expected: ModelCategory,
        actual: ModelCategory,
    },
}

pub type Result<T> = std::result::Result<T, CacheError>;
