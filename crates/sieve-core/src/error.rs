use thiserror::Error;

/// Failures surfaced by the engine to its callers.
///
/// Collaborators (embedders, stores) report `anyhow::Error`; the engine folds
/// those into `Embedding` or `Retrieval` so callers can tell a bad upstream
/// model from an unreachable store.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn embedding(err: anyhow::Error) -> Self { Self::Embedding(format!("{err:#}")) }

    pub fn retrieval(err: anyhow::Error) -> Self { Self::Retrieval(format!("{err:#}")) }
}

pub type Result<T> = std::result::Result<T, Error>;
