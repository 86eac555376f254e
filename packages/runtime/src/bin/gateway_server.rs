//! HTTP/WebSocket gateway server: the one long-running binary in the fabric
//! (everything else is a short-lived hook process). Fronts the project
//! registry and starts/stops per-project MCP client trios on demand.
//! Grounded in `arbiter/src/bin/server.rs`'s server-main shape.

use std::sync::Arc;

use warden_gateway::{build_router, AppState, ProjectRegistry};
use warden_runtime::{env, Paths};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env::init_tracing();

    let paths = Paths::resolve();
    let registry = ProjectRegistry::open(paths.registry_path()).await?;
    let api_key = ensure_gateway_key(&paths.gateway_key_path()).await?;
    let llm_backend = env::llm_backend();

    let jobs_root = paths.gateway_jobs_root();
    tokio::fs::create_dir_all(&jobs_root).await?;

    let state = AppState::new(registry, api_key, jobs_root, llm_backend);
    let app = build_router(state);

    let port = std::env::var("GATEWAY_PORT").unwrap_or_else(|_| "8787".to_string());
    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr, "warden gateway listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct GatewayKeyFile {
    #[serde(default)]
    api_key: Option<String>,
}

/// Generates and persists a fresh bearer token on first run; reuses it on
/// every subsequent start.
async fn ensure_gateway_key(path: &std::path::Path) -> anyhow::Result<Arc<str>> {
    let existing: GatewayKeyFile = match tokio::fs::read_to_string(path).await {
        Ok(body) => serde_json::from_str(&body).unwrap_or_default(),
        Err(_) => GatewayKeyFile::default(),
    };
    if let Some(key) = existing.api_key {
        return Ok(key.into());
    }

    let key = uuid::Uuid::new_v4().to_string();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_string_pretty(&GatewayKeyFile { api_key: Some(key.clone()) })?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;

    tracing::info!("generated new gateway API key; see {}", path.display());
    Ok(key.into())
}
