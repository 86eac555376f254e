//! PostToolUse hook entry point: intercepts task creation, pairs it with a
//! governance review, and detaches a settle-check subprocess. Invoked twice
//! over its lifetime — once synchronously by the host agent's hook (no
//! flags), and once more as its own detached child (`--settle-check`) that
//! outlives the hook call. Grounded in the task-governance pipeline's "detached
//! background processes... isolation from the host agent's lifecycle".

use std::sync::Arc;

use chrono::{DateTime, Utc};
use warden_pipeline::intercept::TaskCreationEvent;
use warden_runtime::{hookio, Paths};

#[tokio::main]
async fn main() {
    warden_runtime::env::init_tracing();

    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some("--settle-check") {
        run_settle_check_child(args).await;
        return;
    }

    hookio::run_hook_safely("task-intercept", run_intercept).await;
}

async fn run_intercept() -> anyhow::Result<()> {
    let input = hookio::read_stdin_json();
    let paths = Paths::resolve();

    let event = TaskCreationEvent {
        task_id: hookio::str_field(&input, "task_id").or_else(|| hookio::str_field(&input, "id")),
        subject: hookio::str_field(&input, "subject").unwrap_or_default(),
        description: hookio::str_field(&input, "description").unwrap_or_default(),
        session_id: hookio::str_field(&input, "session_id"),
        transcript_path: hookio::str_field(&input, "transcript_path"),
    };

    warden_audit::emit(
        &paths.audit_dir().join("events.jsonl"),
        "task.create.attempted",
        serde_json::json!({"subject": event.subject, "task_id": event.task_id}),
        "task-intercept-hook",
        event.session_id.clone(),
    )
    .await;

    let governance = warden_governance::GovernanceStore::open(paths.governance_db_path()).await?;
    let tasks = warden_taskfile::TaskFileManager::new(paths.tasks_dir());

    let Some(outcome) = warden_pipeline::intercept::intercept(&governance, &tasks, &paths.flag_dir(), event.clone()).await? else {
        hookio::write_stdout_json(&serde_json::json!({}));
        return Ok(());
    };

    warden_audit::emit(
        &paths.audit_dir().join("events.jsonl"),
        "task.governed",
        serde_json::json!({
            "impl_task_id": outcome.impl_task_id,
            "review_task_id": outcome.review_task_id,
        }),
        "task-intercept-hook",
        event.session_id.clone(),
    )
    .await;

    if let Some(session_id) = event.session_id.clone() {
        spawn_settle_check(session_id, event.transcript_path.clone());
    }

    hookio::write_stdout_json(&serde_json::json!({ "additionalContext": outcome.additional_context }));
    Ok(())
}

/// Detaches a `--settle-check` child process carrying the session id, this
/// hook invocation's timestamp, and the transcript path. The child is not
/// awaited: once spawned it keeps running after this process exits, which is
/// the point — it must survive past the hook's own lifetime to sleep
/// `SETTLE_SECONDS` and run the holistic review.
fn spawn_settle_check(session_id: String, transcript_path: Option<String>) {
    let Ok(exe) = std::env::current_exe() else {
        tracing::warn!("could not resolve current executable path; settle-check not spawned");
        return;
    };
    let mut command = std::process::Command::new(exe);
    command
        .arg("--settle-check")
        .arg("--session-id")
        .arg(&session_id)
        .arg("--timestamp")
        .arg(Utc::now().to_rfc3339())
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    if let Some(path) = transcript_path {
        command.arg("--transcript").arg(path);
    }
    match command.spawn() {
        Ok(_child) => tracing::debug!(session_id, "settle-check detached"),
        Err(e) => tracing::warn!(error = %e, "failed to spawn settle-check"),
    }
}

async fn run_settle_check_child(mut args: impl Iterator<Item = String>) {
    let mut session_id = String::new();
    let mut timestamp = Utc::now();
    let mut transcript: Option<String> = None;

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--session-id" => session_id = args.next().unwrap_or_default(),
            "--timestamp" => {
                if let Some(raw) = args.next() {
                    timestamp = DateTime::parse_from_rfc3339(&raw).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now());
                }
            }
            "--transcript" => transcript = args.next(),
            _ => {}
        }
    }

    if session_id.is_empty() {
        return;
    }

    if let Err(e) = settle_check_body(session_id, timestamp, transcript).await {
        tracing::warn!(error = %e, "settle-check child failed");
    }
}

async fn settle_check_body(session_id: String, timestamp: DateTime<Utc>, transcript_path: Option<String>) -> anyhow::Result<()> {
    let paths = Paths::resolve();
    let governance = Arc::new(warden_governance::GovernanceStore::open(paths.governance_db_path()).await?);
    let kg = Arc::new(warden_kg::KgStore::open(paths.kg_path()).await?);
    let tasks = Arc::new(warden_taskfile::TaskFileManager::new(paths.tasks_dir()));
    let reviewer = Arc::new(warden_runtime::env::reviewer_adapter());

    let targets = warden_pipeline::settle::run_settle_check(
        &governance,
        &kg,
        &tasks,
        &reviewer,
        &paths.flag_dir(),
        &session_id,
        timestamp,
        transcript_path,
        warden_pipeline::settle::DEFAULT_SETTLE_SECONDS,
    )
    .await?;

    for (review_task_id, impl_task_id) in targets {
        if let Err(e) = warden_pipeline::run_individual_review(&governance, &tasks, &kg, &reviewer, &review_task_id, &impl_task_id).await {
            tracing::warn!(error = %e, review_task_id, impl_task_id, "individual review failed");
        }
    }

    Ok(())
}
