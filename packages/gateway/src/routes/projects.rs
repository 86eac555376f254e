use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::GatewayError;
use crate::models::{Project, ProjectStatus};
use crate::project::ProjectState;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub path: String,
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<Project>> {
    Json(state.registry.list().await)
}

pub async fn create(State(state): State<AppState>, Json(req): Json<CreateProjectRequest>) -> Result<Json<Project>, GatewayError> {
    let project = state.registry.register(&req.name, std::path::Path::new(&req.path)).await?;
    Ok(Json(project))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Project>, GatewayError> {
    Ok(Json(state.registry.get(&id).await?))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>, GatewayError> {
    state.projects.write().await.remove(&id);
    state.registry.remove(&id).await?;
    Ok(Json(serde_json::json!({"removed": true})))
}

pub async fn start(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Project>, GatewayError> {
    let mut project = state.registry.get(&id).await?;
    state.registry.set_status(&id, ProjectStatus::Starting).await?;

    let jobs_dir = state.jobs_root.join(&id);
    match ProjectState::start(project.clone(), jobs_dir, state.llm_backend.clone()).await {
        Ok(running) => {
            state.projects.write().await.insert(id.clone(), std::sync::Arc::new(running));
            state.registry.set_status(&id, ProjectStatus::Running).await?;
            project.status = ProjectStatus::Running;
            Ok(Json(project))
        }
        Err(e) => {
            tracing::warn!(project = %id, error = %e, "failed to start project");
            state.registry.set_status(&id, ProjectStatus::Error).await?;
            Err(e)
        }
    }
}

pub async fn stop(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>, GatewayError> {
    state.registry.get(&id).await?;
    state.projects.write().await.remove(&id);
    state.registry.set_status(&id, ProjectStatus::Stopped).await?;
    Ok(Json(serde_json::json!({"stopped": true})))
}

pub async fn health(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>, GatewayError> {
    let project = state.registry.get(&id).await?;
    let running = state.projects.read().await.get(&id).cloned();
    Ok(Json(serde_json::json!({
        "project_id": id,
        "status": project.status,
        "mcp_connected": running.is_some(),
        "ws_connections": match &running {
            Some(p) => p.ws_channel.connection_count().await,
            None => 0,
        },
    })))
}
