//! Pre-tool-call hook: counts calls per session, and — once the threshold is
//! crossed — resolves at most one context injection from the session-context
//! / static-router two-layer resolver, spawning a distillation child when
//! needed. Grounded in `context-reinforcement.py::main`.

use warden_context::{ContextInjector, DistillationTrigger};
use warden_runtime::{hookio, Paths};

#[tokio::main]
async fn main() {
    warden_runtime::env::init_tracing();
    hookio::run_hook_safely("context-reinforcement", run).await;
}

async fn run() -> anyhow::Result<()> {
    let input = hookio::read_stdin_json();
    let paths = Paths::resolve();

    let session_id = hookio::str_field(&input, "session_id").unwrap_or_default();
    if session_id.is_empty() {
        hookio::write_stdout_json(&serde_json::json!({}));
        return Ok(());
    }
    let tool_input = input.get("tool_input").cloned().unwrap_or(serde_json::Value::Null);
    let transcript_path = hookio::str_field(&input, "transcript_path");

    let settings = warden_context::settings::load_settings(&paths.global_config_path(), &paths.project_config_path());
    let injector = ContextInjector::new(paths.avt_dir.clone());

    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs_f64();
    let (outcome, trigger) = injector.evaluate(&session_id, &tool_input, transcript_path.is_some(), &settings, now);

    match trigger {
        DistillationTrigger::Initial => spawn_distillation(&session_id, transcript_path.as_deref(), "initial"),
        DistillationTrigger::Refresh => spawn_distillation(&session_id, transcript_path.as_deref(), "refresh"),
        DistillationTrigger::None => {}
    }

    match outcome {
        warden_context::InjectionOutcome::Inject(text) => {
            warden_audit::emit(
                &paths.audit_dir().join("events.jsonl"),
                "context.injected",
                serde_json::json!({"session_id": session_id}),
                "context-reinforcement-hook",
                Some(session_id),
            )
            .await;
            hookio::write_stdout_json(&serde_json::json!({ "additionalContext": text }));
        }
        warden_context::InjectionOutcome::None => hookio::write_stdout_json(&serde_json::json!({})),
    }

    Ok(())
}

/// Detaches a `warden-distill-session-context` child process. Not awaited —
/// the caller (this hook) must return immediately, and the LLM call that
/// powers distillation can run well past this process's lifetime.
fn spawn_distillation(session_id: &str, transcript_path: Option<&str>, mode: &str) {
    let Ok(dir) = std::env::current_exe().and_then(|p| p.parent().map(|p| p.to_path_buf()).ok_or_else(|| std::io::Error::other("no parent"))) else {
        return;
    };
    let exe = dir.join("warden-distill-session-context");
    let mut command = std::process::Command::new(exe);
    command
        .arg("--session-id")
        .arg(session_id)
        .arg("--mode")
        .arg(mode)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    if let Some(path) = transcript_path {
        command.arg("--transcript").arg(path);
    }
    if let Err(e) = command.spawn() {
        tracing::warn!(error = %e, mode, "failed to spawn distillation job");
    }
}
