use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewerError {
    #[error("review backend timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("review backend transport error: {0}")]
    Transport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
