//! Per-project runtime state: the three MCP subconnections, the job
//! runner, the WebSocket channel, and the project-config service. Built
//! once when a project is started; torn down (dropped) on stop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::job_runner::JobRunner;
use crate::mcp_client::McpClient;
use crate::models::Project;
use crate::ws::{run_poll_loop, ProjectChannel};

/// Project-local config, read from `.avt/project-config.json` in the
/// project's working directory. Only the fields the gateway surfaces
/// through `/config` are modeled here; unknown keys round-trip via
/// `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub permissions_synced: bool,
    #[serde(default)]
    pub setup_ready: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub struct ProjectConfigService {
    path: PathBuf,
}

impl ProjectConfigService {
    pub fn new(project_path: impl AsRef<Path>) -> Self {
        Self { path: project_path.as_ref().join(".avt").join("project-config.json") }
    }

    pub async fn load(&self) -> ProjectConfig {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(body) => serde_json::from_str(&body).unwrap_or_default(),
            Err(_) => ProjectConfig::default(),
        }
    }

    pub async fn save(&self, config: &ProjectConfig) -> Result<(), GatewayError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(config)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Generates and persists a fresh bearer token, or returns the existing
    /// one if already set: generated on first start, reused thereafter.
    pub async fn ensure_token(&self) -> Result<String, GatewayError> {
        let mut config = self.load().await;
        if let Some(token) = &config.api_token {
            return Ok(token.clone());
        }
        let token = uuid::Uuid::new_v4().to_string();
        config.api_token = Some(token.clone());
        self.save(&config).await?;
        Ok(token)
    }
}

pub struct ProjectState {
    pub project: Project,
    pub kg_client: Arc<McpClient>,
    pub quality_client: Arc<McpClient>,
    pub governance_client: Arc<McpClient>,
    pub jobs: Arc<JobRunner>,
    pub config: ProjectConfigService,
    pub ws_channel: Arc<ProjectChannel>,
}

impl ProjectState {
    /// Connects the three MCP subconnections, opens the job runner, and
    /// spawns this project's WebSocket poll loop.
    pub async fn start(project: Project, jobs_dir: PathBuf, llm_backend: Arc<dyn warden_reviewer::ReviewBackend>) -> Result<Self, GatewayError> {
        let kg_client = Arc::new(McpClient::connect(format!("http://127.0.0.1:{}", project.kg_port())).await?);
        let quality_client = Arc::new(McpClient::connect(format!("http://127.0.0.1:{}", project.quality_port())).await?);
        let governance_client = Arc::new(McpClient::connect(format!("http://127.0.0.1:{}", project.governance_port())).await?);
        let jobs = Arc::new(JobRunner::open(jobs_dir, llm_backend).await?);
        let config = ProjectConfigService::new(&project.path);
        let ws_channel = Arc::new(ProjectChannel::default());

        tokio::spawn(run_poll_loop(ws_channel.clone(), governance_client.clone(), jobs.clone()));

        Ok(Self { project, kg_client, quality_client, governance_client, jobs, config, ws_channel })
    }
}
