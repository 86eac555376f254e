use axum::extract::{Path, State};
use axum::Json;

use crate::app::AppState;
use crate::error::GatewayError;
use crate::project::ProjectConfig;
use crate::routes::started_project;

pub async fn get_config(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<ProjectConfig>, GatewayError> {
    let project = started_project(&state, &id).await?;
    Ok(Json(project.config.load().await))
}

pub async fn put_config(State(state): State<AppState>, Path(id): Path<String>, Json(config): Json<ProjectConfig>) -> Result<Json<ProjectConfig>, GatewayError> {
    let project = started_project(&state, &id).await?;
    project.config.save(&config).await?;
    Ok(Json(config))
}

/// Marks `.avt/project-config.json`'s `permissions_synced` flag, mirroring
/// whatever the per-project Claude settings sync step reports. The gateway
/// does not itself touch Claude's settings file; it only records the
/// outcome for the dashboard.
pub async fn sync_permissions(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<ProjectConfig>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let mut config = project.config.load().await;
    config.permissions_synced = true;
    project.config.save(&config).await?;
    Ok(Json(config))
}

pub async fn setup_readiness(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let config = project.config.load().await;
    Ok(Json(serde_json::json!({
        "setup_ready": config.setup_ready,
        "permissions_synced": config.permissions_synced,
        "api_token_issued": config.api_token.is_some(),
    })))
}
