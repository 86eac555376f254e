//! The escalation chain driver: Haiku triage, then conditionally Sonnet
//! analysis, then conditionally Opus deep dive. Spawned detached by
//! `warden-audit-process` whenever a processing run turns up anomalies worth
//! escalating. Grounded in `_audit-escalate.py`'s `main()`.

use warden_audit::models::AuditEvent;
use warden_audit::prompts::{load_directives, match_directives};
use warden_audit::recommendations::RecommendationManager;
use warden_audit::stats::StatsAccumulator;
use warden_audit::{escalation, processor};
use warden_runtime::{env, Paths};

/// How many of the most recent `events.jsonl` lines to hand the analysis and
/// deep-dive tiers, so each has enough recent context to work from.
const EVENT_WINDOW_SIZE: usize = 200;

#[tokio::main]
async fn main() {
    env::init_tracing();
    if let Err(e) = run().await {
        tracing::warn!(error = %e, "audit escalation chain failed");
    }
}

async fn run() -> anyhow::Result<()> {
    let paths = Paths::resolve();
    let audit_dir = paths.audit_dir();

    let anomalies = processor::take_pending_anomalies(&audit_dir).await?;
    if anomalies.is_empty() {
        tracing::debug!("no pending anomalies; nothing to escalate");
        return Ok(());
    }

    let directives = load_directives(&paths.directives_path());
    let matched_directives = match_directives(&anomalies, &directives);

    let stats = StatsAccumulator::open(paths.stats_db_path()).await?;
    let recommendations = RecommendationManager::open(paths.stats_db_path()).await?;

    let recent_stats = stats.get_recent_event_rate(24).await?;
    let existing_recommendations = recommendations.get_active().await?;
    let backend = env::llm_backend();

    let triage = escalation::run_tier1_haiku(backend.as_ref(), &anomalies, &matched_directives, &recent_stats, &existing_recommendations, &audit_dir)
        .await?;

    for suggestion in &triage.recommendations {
        recommendations.create_from_anomaly(&suggestion.anomaly_type, &suggestion.suggestion).await?;
    }

    tracing::info!(verdict = triage.verdict, escalate = triage.escalate, "tier 1 (haiku) triage complete");

    if !triage.escalate {
        return Ok(());
    }

    let event_window = tail_recent_events(&audit_dir.join("events.jsonl"), EVENT_WINDOW_SIZE).await;
    let current_settings = warden_context::settings::load_settings(&paths.global_config_path(), &paths.project_config_path());
    let current_settings = serde_json::to_value(&current_settings).unwrap_or(serde_json::Value::Null);

    let analysis = escalation::run_tier2_sonnet(
        backend.as_ref(),
        &triage,
        &anomalies,
        &matched_directives,
        &event_window,
        &current_settings,
        &existing_recommendations,
        &audit_dir,
    )
    .await?;

    for suggestion in &analysis.recommendations {
        recommendations.update_from_escalation(&suggestion.anomaly_type, &suggestion.suggestion, &suggestion.category, "sonnet").await?;
    }

    tracing::info!(escalate_to_opus = analysis.escalate_to_opus, "tier 2 (sonnet) analysis complete");

    if !analysis.escalate_to_opus {
        return Ok(());
    }

    let session_summaries = stats.get_recent_sessions(10).await?;
    let refreshed_recommendations = recommendations.get_active().await?;

    let deep_analysis = escalation::run_tier3_opus(
        backend.as_ref(),
        &analysis,
        &anomalies,
        &matched_directives,
        &event_window,
        &current_settings,
        &refreshed_recommendations,
        &session_summaries,
        &audit_dir,
    )
    .await?;

    for suggestion in &deep_analysis.recommendations {
        recommendations.update_from_escalation(&suggestion.anomaly_type, &suggestion.suggestion, &suggestion.category, "opus").await?;
    }

    tracing::info!("tier 3 (opus) deep dive complete");
    Ok(())
}

/// Reads the last `limit` well-formed lines of `events.jsonl`. Reads the
/// whole file rather than seeking from the end: `events.jsonl` is rotated at
/// 10MiB (`warden_audit::processor`'s `MAX_EVENTS_SIZE`), so a full read here
/// is bounded.
async fn tail_recent_events(events_path: &std::path::Path, limit: usize) -> Vec<AuditEvent> {
    let Ok(body) = tokio::fs::read_to_string(events_path).await else {
        return Vec::new();
    };
    let mut events: Vec<AuditEvent> = body.lines().filter(|l| !l.trim().is_empty()).filter_map(|l| serde_json::from_str(l).ok()).collect();
    if events.len() > limit {
        events = events.split_off(events.len() - limit);
    }
    events
}
