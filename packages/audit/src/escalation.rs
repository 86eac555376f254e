//! The three-tier escalation chain: Haiku triage, Sonnet analysis, Opus
//! deep dive. Each tier only runs if the previous one says to escalate.
//! Grounded in `audit/escalation.py` and `_audit-escalate.py`'s orchestration.

use std::path::Path;
use std::time::Duration;

use warden_reviewer::ReviewBackend;

use crate::error::AuditError;
use crate::models::{AnalysisResult, Anomaly, DeepAnalysisResult, Directive, Recommendation, TriageResult};
use crate::prompts::{build_haiku_prompt, build_opus_prompt, build_sonnet_prompt};
use crate::stats::SessionSummary;

const TRIAGE_TIMEOUT: Duration = Duration::from_secs(30);
const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(120);
const DEEP_DIVE_TIMEOUT: Duration = Duration::from_secs(180);

/// Runs tier 1 (Haiku). Parses the backend's output with the same
/// three-stage JSON extraction cascade the reviewer uses for verdicts.
pub async fn run_tier1_haiku(
    backend: &dyn ReviewBackend,
    anomalies: &[Anomaly],
    directives: &[Directive],
    recent_stats: &std::collections::HashMap<String, i64>,
    recent_recommendations: &[Recommendation],
    output_dir: &Path,
) -> Result<TriageResult, AuditError> {
    let prompt = build_haiku_prompt(anomalies, directives, recent_stats, recent_recommendations);
    let raw = backend.run(&prompt, TRIAGE_TIMEOUT).await?;
    let result = parse_tier_output::<TriageResult>(&raw, "haiku triage")?;
    save_tier_output(output_dir, "triage.json", &result).await;
    Ok(result)
}

/// Runs tier 2 (Sonnet), only called when tier 1 set `escalate = true`.
#[allow(clippy::too_many_arguments)]
pub async fn run_tier2_sonnet(
    backend: &dyn ReviewBackend,
    haiku_triage: &TriageResult,
    anomalies: &[Anomaly],
    directives: &[Directive],
    event_window: &[crate::models::AuditEvent],
    current_settings: &serde_json::Value,
    existing_recommendations: &[Recommendation],
    output_dir: &Path,
) -> Result<AnalysisResult, AuditError> {
    let prompt = build_sonnet_prompt(haiku_triage, anomalies, directives, event_window, current_settings, existing_recommendations);
    let raw = backend.run(&prompt, ANALYSIS_TIMEOUT).await?;
    let result = parse_tier_output::<AnalysisResult>(&raw, "sonnet analysis")?;
    save_tier_output(output_dir, "analysis.json", &result).await;
    Ok(result)
}

/// Runs tier 3 (Opus), only called when tier 2 set `escalate_to_opus = true`.
#[allow(clippy::too_many_arguments)]
pub async fn run_tier3_opus(
    backend: &dyn ReviewBackend,
    sonnet_analysis: &AnalysisResult,
    anomalies: &[Anomaly],
    directives: &[Directive],
    event_window: &[crate::models::AuditEvent],
    current_settings: &serde_json::Value,
    existing_recommendations: &[Recommendation],
    session_summaries: &[SessionSummary],
    output_dir: &Path,
) -> Result<DeepAnalysisResult, AuditError> {
    let prompt = build_opus_prompt(
        sonnet_analysis,
        anomalies,
        directives,
        event_window,
        current_settings,
        existing_recommendations,
        session_summaries,
    );
    let raw = backend.run(&prompt, DEEP_DIVE_TIMEOUT).await?;
    let result = parse_tier_output::<DeepAnalysisResult>(&raw, "opus deep dive")?;
    save_tier_output(output_dir, "deep-analysis.json", &result).await;
    Ok(result)
}

fn parse_tier_output<T: serde::de::DeserializeOwned + Default>(raw: &str, tier_label: &'static str) -> Result<T, AuditError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        if let Ok(parsed) = serde_json::from_str(trimmed) {
            return Ok(parsed);
        }
    }
    match warden_reviewer::verdict::extract_json(raw) {
        Some(json) => serde_json::from_str(&json).map_err(|_| {
            tracing::warn!(tier = tier_label, "could not parse escalation tier output as JSON");
            AuditError::UnparseableTierOutput(tier_label)
        }),
        None => {
            tracing::warn!(tier = tier_label, "escalation tier returned no JSON object");
            Err(AuditError::UnparseableTierOutput(tier_label))
        }
    }
}

/// Persists raw tier output to `<output_dir>/<filename>`. Never fails the
/// escalation chain if the write fails; this is a diagnostic artifact only.
async fn save_tier_output(output_dir: &Path, filename: &str, value: &impl serde::Serialize) {
    let Ok(body) = serde_json::to_string_pretty(value) else { return };
    if let Err(e) = tokio::fs::create_dir_all(output_dir).await {
        tracing::warn!(error = %e, dir = %output_dir.display(), "could not create escalation output directory");
        return;
    }
    if let Err(e) = tokio::fs::write(output_dir.join(filename), body).await {
        tracing::warn!(error = %e, file = filename, "could not save escalation tier output");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use warden_reviewer::error::ReviewerError;

    struct FixedBackend(&'static str);

    #[async_trait]
    impl ReviewBackend for FixedBackend {
        async fn run(&self, _prompt: &str, _timeout: Duration) -> Result<String, ReviewerError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn tier1_parses_fenced_json_and_saves_output() {
        let backend = FixedBackend("Here is my triage:\n```json\n{\"verdict\": \"known_pattern\", \"escalate\": false}\n```\n");
        let dir = tempfile::tempdir().unwrap();
        let result = run_tier1_haiku(&backend, &[], &[], &Default::default(), &[], dir.path()).await.unwrap();
        assert_eq!(result.verdict, "known_pattern");
        assert!(!result.escalate);
        assert!(dir.path().join("triage.json").exists());
    }

    #[tokio::test]
    async fn tier1_rejects_unparseable_output() {
        let backend = FixedBackend("I cannot comply with this request.");
        let dir = tempfile::tempdir().unwrap();
        let err = run_tier1_haiku(&backend, &[], &[], &Default::default(), &[], dir.path()).await.unwrap_err();
        assert!(matches!(err, AuditError::UnparseableTierOutput(_)));
    }
}
