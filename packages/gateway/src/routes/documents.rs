//! Knowledge-graph document surface: proxies to the project's KG MCP
//! server rather than touching `warden-kg` storage directly, since each
//! project's KG store lives inside that project's own MCP server process.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::app::AppState;
use crate::error::GatewayError;
use crate::routes::started_project;

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub tier: String,
    pub name: String,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub observations: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct IngestFolderRequest {
    pub path: String,
    #[serde(default)]
    pub tier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FormatRequest {
    pub query: String,
}

pub async fn list(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let result = project.kg_client.call_tool("search_nodes", serde_json::json!({"query": ""})).await?;
    Ok(Json(result))
}

pub async fn create(State(state): State<AppState>, Path(id): Path<String>, Json(req): Json<CreateDocumentRequest>) -> Result<Json<Value>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let result = project
        .kg_client
        .call_tool(
            "create_entities",
            serde_json::json!({"entities": [{
                "name": req.name,
                "entityType": req.entity_type.unwrap_or_else(|| "document".to_string()),
                "tier": req.tier,
                "observations": req.observations,
            }]}),
        )
        .await?;
    Ok(Json(result))
}

pub async fn ingest(State(state): State<AppState>, Path(id): Path<String>, Json(req): Json<IngestFolderRequest>) -> Result<Json<Value>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let result = project
        .kg_client
        .call_tool("ingest_folder", serde_json::json!({"path": req.path, "tier": req.tier.unwrap_or_else(|| "quality".to_string())}))
        .await?;
    Ok(Json(result))
}

pub async fn format(State(state): State<AppState>, Path(id): Path<String>, Json(req): Json<FormatRequest>) -> Result<Json<Value>, GatewayError> {
    let project = started_project(&state, &id).await?;
    let result = project.kg_client.call_tool("search_nodes", serde_json::json!({"query": req.query})).await?;
    Ok(Json(result))
}
