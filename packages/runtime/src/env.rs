//! Environment-flag resolution and the fabric's well-known on-disk layout,
//! all rooted under a single project directory's `.avt` folder. Grounded in
//! the environment-flag conventions each component already follows
//! conventions (`warden-context::injector::avt_dir`, `warden-taskfile`'s
//! one-file-per-task directory, `warden-audit`'s `events.jsonl`/
//! `.checkpoint.json`/`.processor-lock`).

use std::path::PathBuf;
use std::sync::Arc;

use warden_reviewer::{CliBackend, MockBackend, ReviewBackend, ReviewerAdapter};

/// Resolved filesystem layout for one project workspace. Every hook binary
/// and the gateway's per-project services build one of these at startup.
#[derive(Debug, Clone)]
pub struct Paths {
    pub project_dir: PathBuf,
    pub avt_dir: PathBuf,
}

impl Paths {
    /// Resolves the project directory from `PROJECT_DIR` (the `PROJECT_DIR` flag,
    /// overrides the working-directory resolution for MCP servers), falling
    /// back to `CLAUDE_PROJECT_DIR` (hook-script scoping), then the process
    /// current directory.
    pub fn resolve() -> Self {
        let project_dir = std::env::var("PROJECT_DIR")
            .or_else(|_| std::env::var("CLAUDE_PROJECT_DIR"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let avt_dir = project_dir.join(".avt");
        Self { project_dir, avt_dir }
    }

    /// One-file-per-task directory, namespaced by `CLAUDE_CODE_TASK_LIST_ID`
    /// when present so multiple concurrent task lists in the same project
    /// workspace don't collide.
    pub fn tasks_dir(&self) -> PathBuf {
        match std::env::var("CLAUDE_CODE_TASK_LIST_ID") {
            Ok(list_id) if !list_id.is_empty() => self.avt_dir.join("tasks").join(list_id),
            _ => self.avt_dir.join("tasks"),
        }
    }

    pub fn kg_path(&self) -> PathBuf {
        self.avt_dir.join("knowledge-graph.jsonl")
    }

    pub fn governance_db_path(&self) -> PathBuf {
        self.avt_dir.join("governance.db")
    }

    pub fn trust_db_path(&self) -> PathBuf {
        self.avt_dir.join("trust.db")
    }

    /// Directory holding `events.jsonl`, `.checkpoint.json`,
    /// `.processor-lock`, `.pending-anomalies.json`, and the per-tier
    /// escalation output files.
    pub fn audit_dir(&self) -> PathBuf {
        self.avt_dir.join("audit")
    }

    pub fn stats_db_path(&self) -> PathBuf {
        self.audit_dir().join("statistics.db")
    }

    pub fn audit_config_path(&self) -> PathBuf {
        self.avt_dir.join("audit-config.json")
    }

    pub fn directives_path(&self) -> PathBuf {
        self.avt_dir.join("audit-directives.json")
    }

    /// Holistic review flag files live directly under `.avt` (same root the
    /// pipeline's `flag.rs` module writes `.holistic-review-pending-<id>` into).
    pub fn flag_dir(&self) -> PathBuf {
        self.avt_dir.clone()
    }

    pub fn global_config_path(&self) -> PathBuf {
        dirs_home().join(".avt").join("global-config.json")
    }

    pub fn project_config_path(&self) -> PathBuf {
        self.avt_dir.join("project-config.json")
    }

    pub fn registry_path(&self) -> PathBuf {
        dirs_home().join(".avt").join("gateway-registry.json")
    }

    /// Where the gateway's shared bearer token is generated once and
    /// persisted; generated once on first start, reused on every later one.
    pub fn gateway_key_path(&self) -> PathBuf {
        dirs_home().join(".avt").join("gateway-config.json")
    }

    /// `.avt/` root under the jobs directory the gateway's per-project
    /// `JobRunner`s persist their queues in.
    pub fn gateway_jobs_root(&self) -> PathBuf {
        dirs_home().join(".avt").join("gateway-jobs")
    }
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

/// True when `GOVERNANCE_MOCK_REVIEW` is set to any value.
pub fn mock_review_enabled() -> bool {
    std::env::var("GOVERNANCE_MOCK_REVIEW").is_ok()
}

/// Builds the reviewer adapter every hook binary consults: mock when
/// `GOVERNANCE_MOCK_REVIEW` is set, otherwise a CLI backend shelling out to
/// the program named by `GOVERNANCE_REVIEW_CLI` (default `claude`), per
/// shelling out to an external LLM CLI is the intended default backend.
pub fn reviewer_adapter() -> ReviewerAdapter {
    let cli = std::env::var("GOVERNANCE_REVIEW_CLI").unwrap_or_else(|_| "claude".to_string());
    let real: Arc<dyn ReviewBackend> = Arc::new(CliBackend::new(cli, vec!["-p".to_string()]));
    ReviewerAdapter::from_env(real)
}

/// The raw LLM backend (mock or CLI), used directly by components that
/// don't go through `ReviewerAdapter` (audit escalation, context
/// distillation) but honor the same env-flag short-circuit.
pub fn llm_backend() -> Arc<dyn ReviewBackend> {
    if mock_review_enabled() {
        Arc::new(MockBackend)
    } else {
        let cli = std::env::var("GOVERNANCE_REVIEW_CLI").unwrap_or_else(|_| "claude".to_string());
        Arc::new(CliBackend::new(cli, vec!["-p".to_string()]))
    }
}

/// Initializes the ambient `tracing` subscriber the same way across every
/// bin (env-filter init, one call per binary).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).try_init();
}
