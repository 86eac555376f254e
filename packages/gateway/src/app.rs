//! Shared application state and router assembly.

use std::collections::HashMap;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use warden_reviewer::ReviewBackend;

use crate::auth::require_api_key;
use crate::project::ProjectState;
use crate::registry::ProjectRegistry;
use crate::routes;

/// Shared, cheaply-clonable application state. Cloned into every axum
/// handler; the heavy bits (`projects`, `registry`) are `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProjectRegistry>,
    pub projects: Arc<RwLock<HashMap<String, Arc<ProjectState>>>>,
    pub api_key: Arc<str>,
    pub jobs_root: std::path::PathBuf,
    pub llm_backend: Arc<dyn ReviewBackend>,
}

impl AppState {
    pub fn new(registry: ProjectRegistry, api_key: impl Into<Arc<str>>, jobs_root: std::path::PathBuf, llm_backend: Arc<dyn ReviewBackend>) -> Self {
        Self { registry: Arc::new(registry), projects: Arc::new(RwLock::new(HashMap::new())), api_key: api_key.into(), jobs_root, llm_backend }
    }
}

pub fn build_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/api/projects", get(routes::projects::list).post(routes::projects::create))
        .route("/api/projects/{id}", get(routes::projects::get).delete(routes::projects::remove))
        .route("/api/projects/{id}/start", post(routes::projects::start))
        .route("/api/projects/{id}/stop", post(routes::projects::stop))
        .route("/api/projects/{id}/health", get(routes::projects::health))
        .route("/api/projects/{id}/config", get(routes::config::get_config).put(routes::config::put_config))
        .route("/api/projects/{id}/config/permissions-sync", post(routes::config::sync_permissions))
        .route("/api/projects/{id}/config/setup-readiness", get(routes::config::setup_readiness))
        .route("/api/projects/{id}/documents", get(routes::documents::list).post(routes::documents::create))
        .route("/api/projects/{id}/documents/ingest", post(routes::documents::ingest))
        .route("/api/projects/{id}/documents/format", post(routes::documents::format))
        .route("/api/projects/{id}/governance/tasks", get(routes::governance::tasks))
        .route("/api/projects/{id}/governance/status", get(routes::governance::status))
        .route("/api/projects/{id}/governance/decisions", get(routes::governance::decisions))
        .route("/api/projects/{id}/quality/findings", get(routes::quality::findings))
        .route("/api/projects/{id}/quality/findings/dismiss", post(routes::quality::dismiss))
        .route("/api/projects/{id}/quality/gates", get(routes::quality::gates))
        .route("/api/projects/{id}/research/prompts", post(routes::research::prompts))
        .route("/api/projects/{id}/research/briefs", get(routes::research::briefs))
        .route("/api/projects/{id}/jobs", get(routes::jobs::list).post(routes::jobs::submit))
        .route("/api/projects/{id}/jobs/{job_id}", get(routes::jobs::get))
        .route("/api/projects/{id}/jobs/{job_id}/cancel", post(routes::jobs::cancel))
        .route("/api/projects/{id}/dashboard", get(routes::dashboard::aggregate))
        .route("/api/ws", get(routes::ws::upgrade))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
