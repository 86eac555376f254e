//! The audit event processor: one pass over new `events.jsonl` lines, stats
//! accumulation, anomaly detection, and — on anomalies worth escalating —
//! a detached `warden-audit-escalate` child. Meant to be invoked
//! periodically (e.g. from a Stop/SubagentStop hook or a scheduler), not
//! per tool call. Grounded in `_audit-process.py`'s `main()`.

use warden_audit::Processor;
use warden_runtime::{env, Paths};

#[tokio::main]
async fn main() {
    env::init_tracing();
    if let Err(e) = run().await {
        tracing::warn!(error = %e, "audit processing run failed");
    }
}

async fn run() -> anyhow::Result<()> {
    let paths = Paths::resolve();
    let audit_dir = paths.audit_dir();
    tokio::fs::create_dir_all(&audit_dir).await.ok();

    let config = warden_audit::load_audit_config(paths.audit_config_path());
    let mut processor = Processor::open(&audit_dir, &config).await?;

    let run = match processor.run(&audit_dir).await {
        Ok(run) => run,
        Err(warden_audit::AuditError::LockHeld) => {
            tracing::debug!("another audit processor instance is already running; exiting");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(events = run.summary.total, anomalies = run.anomalies.len(), "audit processing run complete");

    if run.escalatable.is_empty() {
        return Ok(());
    }

    warden_audit::processor::write_pending_anomalies(&audit_dir, &run.escalatable).await?;

    if !config.llm_analysis_enabled {
        tracing::debug!("llm analysis disabled; leaving pending anomalies for manual review");
        return Ok(());
    }

    spawn_escalation();
    Ok(())
}

/// Detaches the escalation chain. Not awaited: the chain's three tiers can
/// run for minutes (the three tiers' timeouts add up to well past five minutes), past any
/// reasonable budget for the process that triggered it.
fn spawn_escalation() {
    let Ok(dir) = std::env::current_exe().and_then(|p| p.parent().map(|p| p.to_path_buf()).ok_or_else(|| std::io::Error::other("no parent"))) else {
        return;
    };
    let exe = dir.join("warden-audit-escalate");
    match std::process::Command::new(exe).stdin(std::process::Stdio::null()).stdout(std::process::Stdio::null()).stderr(std::process::Stdio::null()).spawn() {
        Ok(_child) => tracing::debug!("escalation chain detached"),
        Err(e) => tracing::warn!(error = %e, "failed to spawn escalation chain"),
    }
}
