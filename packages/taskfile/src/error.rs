use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskFileError {
    #[error("task '{0}' not found")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("could not acquire lock for task '{0}'")]
    LockFailed(String),
}
