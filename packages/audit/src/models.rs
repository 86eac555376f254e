//! Event, anomaly, recommendation, and checkpoint shapes. Grounded in the
//! event schema used across `_audit-process.py`, `audit/stats.py`, and
//! `audit/escalation.py`.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One append-only line in `events.jsonl`. Field names match the Python
/// emitter's schema exactly so the processor's ingestion heuristics
/// (`ends_with("_attempted")`, `contains("skipped")`, ...) carry over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub ts: f64,
    pub ts_iso: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        event_type: impl Into<String>,
        data: serde_json::Value,
        source: impl Into<String>,
        session_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            ts: now.timestamp() as f64 + now.timestamp_subsec_millis() as f64 / 1000.0,
            ts_iso: now.to_rfc3339(),
            event_type: event_type.into(),
            source: source.into(),
            session_id,
            data,
        }
    }
}

/// Returned by `StatsAccumulator::ingest_events`, consumed by the anomaly
/// detector. Per-type counts plus which sessions were touched this batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub by_type: HashMap<String, usize>,
    pub sessions_touched: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Info,
    Warning,
    Critical,
}

impl AnomalySeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            AnomalySeverity::Info => "info",
            AnomalySeverity::Warning => "warning",
            AnomalySeverity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "critical" => AnomalySeverity::Critical,
            "warning" => AnomalySeverity::Warning,
            _ => AnomalySeverity::Info,
        }
    }

    /// Severity at or above this is the escalation cutoff.
    pub fn is_escalatable(self) -> bool {
        self >= AnomalySeverity::Warning
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: String,
    #[serde(rename = "type")]
    pub anomaly_type: String,
    pub severity: AnomalySeverity,
    pub description: String,
    #[serde(default)]
    pub metric_values: HashMap<String, f64>,
    #[serde(default)]
    pub context: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Active,
    Superseded,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub anomaly_type: String,
    pub suggestion: String,
    pub category: String,
    pub origin_tier: String,
    pub evidence_count: i64,
    pub status: RecommendationStatus,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

/// An observation directive: a standing question a human analyst wants the
/// escalation chain to keep an eye on, matched to anomalies by type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directive {
    pub id: String,
    #[serde(default)]
    pub watches: Vec<String>,
    #[serde(default)]
    pub haiku_question: String,
    #[serde(default)]
    pub sonnet_question: String,
    #[serde(default)]
    pub opus_trigger: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RecommendationSuggestion {
    #[serde(default)]
    pub anomaly_type: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub category: String,
}

/// Parsed Tier-1 (Haiku) triage output.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TriageResult {
    #[serde(default)]
    pub verdict: String,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub escalate: bool,
    #[serde(default)]
    pub recommendations: Vec<RecommendationSuggestion>,
}

/// Parsed Tier-2 (Sonnet) analysis output.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AnalysisResult {
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub recommendations: Vec<RecommendationSuggestion>,
    #[serde(default)]
    pub escalate_to_opus: bool,
    #[serde(default)]
    pub opus_context: Option<String>,
}

/// Parsed Tier-3 (Opus) deep-dive output. `root_causes`, `setting_range_changes`,
/// and `prompt_assessments` are kept as raw JSON: nothing downstream of the
/// escalation chain consumes their structure, they are only persisted.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DeepAnalysisResult {
    #[serde(default)]
    pub deep_analysis: String,
    #[serde(default)]
    pub recommendations: Vec<RecommendationSuggestion>,
    #[serde(default)]
    pub root_causes: serde_json::Value,
    #[serde(default)]
    pub setting_range_changes: serde_json::Value,
    #[serde(default)]
    pub prompt_assessments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub byte_offset: u64,
    pub event_count: u64,
    pub last_processed_ts: f64,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self { byte_offset: 0, event_count: 0, last_processed_ts: 0.0 }
    }
}
