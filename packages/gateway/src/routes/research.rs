//! Research job surface: queues long-running LLM research prompts through
//! the project's job runner rather than blocking the request, and lists the
//! resulting briefs (completed job results) back out.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::GatewayError;
use crate::models::{Job, JobStatus};
use crate::routes::started_project;

const RESEARCH_JOB_KIND: &str = "research";

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

pub async fn prompts(State(state): State<AppState>, Path(id): Path<String>, Json(req): Json<PromptRequest>) -> Result<Json<Job>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let job = project.jobs.submit(&id, RESEARCH_JOB_KIND, &req.prompt).await?;
    Ok(Json(job))
}

pub async fn briefs(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Vec<Job>>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let briefs: Vec<Job> = project.jobs.list().await?.into_iter().filter(|j| j.kind == RESEARCH_JOB_KIND && j.status == JobStatus::Completed).collect();
    Ok(Json(briefs))
}
