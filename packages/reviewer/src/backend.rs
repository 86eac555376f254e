//! The external review collaborator: anything that can turn a prompt into
//! raw text. A real implementation shells out to an LLM CLI; the mock
//! backend short-circuits for deterministic E2E runs.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ReviewerError;

/// `review(prompt, timeout) -> text`. Implementations must
/// never panic: timeouts and transport failures are returned as typed errors
/// so the caller can fall back to `needs_human_review`.
#[async_trait]
pub trait ReviewBackend: Send + Sync {
    async fn run(&self, prompt: &str, timeout: Duration) -> Result<String, ReviewerError>;
}

/// Deterministic `approved` verdict, used when `GOVERNANCE_MOCK_REVIEW` is set.
/// Applies uniformly across all five review call sites.
pub struct MockBackend;

#[async_trait]
impl ReviewBackend for MockBackend {
    async fn run(&self, _prompt: &str, _timeout: Duration) -> Result<String, ReviewerError> {
        Ok(serde_json::json!({
            "verdict": "approved",
            "findings": [],
            "guidance": "Mock review: auto-approved for deterministic testing.",
            "standards_verified": ["mock"],
        })
        .to_string())
    }
}

/// Invokes an external LLM CLI via temp-file I/O, bypassing argv length
/// limits and pipe buffering. Grounded in `reviewer.py::_run_claude`.
pub struct CliBackend {
    program: String,
    args: Vec<String>,
}

impl CliBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl ReviewBackend for CliBackend {
    async fn run(&self, prompt: &str, timeout: Duration) -> Result<String, ReviewerError> {
        let input = tempfile::Builder::new()
            .prefix("warden-review-")
            .suffix("-input.md")
            .tempfile()?;
        tokio::fs::write(input.path(), prompt).await?;

        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let input_path = input.path().to_path_buf();
        command.arg(&input_path);

        let child = command.spawn().map_err(|e| ReviewerError::Transport(e.to_string()))?;
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ReviewerError::Timeout(timeout))?
            .map_err(|e| ReviewerError::Transport(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReviewerError::Transport(stderr.chars().take(500).collect()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
