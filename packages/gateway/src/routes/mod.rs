pub mod config;
pub mod dashboard;
pub mod documents;
pub mod governance;
pub mod health;
pub mod jobs;
pub mod projects;
pub mod quality;
pub mod research;
pub mod ws;

use std::sync::Arc;

use crate::app::AppState;
use crate::error::GatewayError;
use crate::project::ProjectState;

/// Looks up a started project's runtime state, or a typed 400 if it is
/// registered but not started.
pub async fn started_project(state: &AppState, id: &str) -> Result<Arc<ProjectState>, GatewayError> {
    state.registry.get(id).await?;
    state.projects.read().await.get(id).cloned().ok_or_else(|| GatewayError::ProjectNotStarted(id.to_string()))
}
