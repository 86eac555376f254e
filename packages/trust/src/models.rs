//! Finding lifecycle, dismissal audit trail, and gate result shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// critical > high > medium > low > info, declared in that
/// order so the derived `Ord` matches the severity ranking directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    Open,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub tool: String,
    pub severity: Severity,
    pub component: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub status: FindingStatus,
    pub dismissed_by: Option<String>,
    pub dismissal_justification: Option<String>,
    pub dismissed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DismissalRecord {
    pub finding_id: String,
    pub dismissed_by: String,
    pub justification: String,
    pub dismissed_at: DateTime<Utc>,
}

/// Classification assigned to a finding, driven entirely by its dismissal
/// history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustDecision {
    Block,
    Track,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustClassification {
    pub decision: TrustDecision,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl GateResult {
    pub fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail: "Skipped (disabled)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResults {
    pub build: GateResult,
    pub lint: GateResult,
    pub tests: GateResult,
    pub coverage: GateResult,
    pub findings: GateResult,
    pub all_passed: bool,
}
