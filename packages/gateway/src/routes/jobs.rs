use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::GatewayError;
use crate::models::Job;
use crate::routes::started_project;

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub kind: String,
    pub prompt: String,
}

pub async fn list(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Vec<Job>>, GatewayError> {
    let project = started_project(&state, &id).await?;
    Ok(Json(project.jobs.list().await?))
}

pub async fn submit(State(state): State<AppState>, Path(id): Path<String>, Json(req): Json<SubmitJobRequest>) -> Result<Json<Job>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let job = project.jobs.submit(&id, &req.kind, &req.prompt).await?;
    Ok(Json(job))
}

pub async fn get(State(state): State<AppState>, Path((id, job_id)): Path<(String, String)>) -> Result<Json<Job>, GatewayError> {
    let project = started_project(&state, &id).await?;
    Ok(Json(project.jobs.get(&job_id).await?))
}

pub async fn cancel(State(state): State<AppState>, Path((id, job_id)): Path<(String, String)>) -> Result<Json<Job>, GatewayError> {
    let project = started_project(&state, &id).await?;
    Ok(Json(project.jobs.cancel(&job_id).await?))
}
