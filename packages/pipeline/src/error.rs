use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Kg(#[from] warden_kg::KgError),
    #[error(transparent)]
    Governance(#[from] warden_governance::GovernanceError),
    #[error(transparent)]
    TaskFile(#[from] warden_taskfile::TaskFileError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
