//! Verdict parsing: direct JSON parse, then fenced-code-block extraction,
//! then first-`{`-to-last-`}` slice. Mirrors `_parse_json` in
//! `escalation.py`, reused here for the reviewer's own verdict shape.

use regex::Regex;
use serde::Deserialize;
use warden_governance::{FindingTier, ReviewFinding, ReviewVerdict, Severity, Verdict};

use crate::error::ReviewerError;

#[derive(Debug, Deserialize, Default)]
struct RawFinding {
    #[serde(default)]
    tier: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    suggestion: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawVerdict {
    #[serde(default)]
    verdict: String,
    #[serde(default)]
    findings: Vec<RawFinding>,
    #[serde(default)]
    guidance: String,
    #[serde(default)]
    standards_verified: Vec<String>,
    #[serde(default)]
    strengths_summary: Option<String>,
}

fn parse_tier(s: &str) -> FindingTier {
    match s.trim().to_lowercase().as_str() {
        "vision" => FindingTier::Vision,
        "architecture" => FindingTier::Architecture,
        _ => FindingTier::Quality,
    }
}

fn parse_severity(s: &str) -> Severity {
    match s.trim().to_lowercase().as_str() {
        "critical" | "vision_conflict" => Severity::Critical,
        "high" | "architectural" => Severity::High,
        "medium" | "logic" => Severity::Medium,
        "low" => Severity::Low,
        _ => Severity::Info,
    }
}

/// Extract a JSON object from text that may carry markdown fencing or prose
/// around it. Tries the whole (trimmed) string, then a ```` ```json ``` ````
/// block, then the widest `{...}` slice.
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        return Some(trimmed.to_string());
    }

    let fence = Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)\n?```").expect("static regex");
    if let Some(caps) = fence.captures(trimmed) {
        return Some(caps[1].trim().to_string());
    }

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if end > start {
            return Some(trimmed[start..=end].to_string());
        }
    }
    None
}

/// Parse a raw reviewer response into a `ReviewVerdict`. Unknown verdict
/// strings map to `needs_human_review` rather than failing the pipeline.
/// Exactly one of `decision_id`/`plan_id` is set on the result.
pub fn parse_verdict(
    raw: &str,
    reviewer: &str,
    decision_id: Option<String>,
    plan_id: Option<String>,
) -> ReviewVerdict {
    let fallback = |reason: String| ReviewVerdict {
        id: uuid::Uuid::new_v4().to_string(),
        decision_id: decision_id.clone(),
        plan_id: plan_id.clone(),
        verdict: Verdict::NeedsHumanReview,
        findings: Vec::new(),
        guidance: reason,
        standards_verified: Vec::new(),
        strengths_summary: None,
        reviewer: reviewer.to_string(),
        created_at: chrono::Utc::now(),
    };

    let Some(json_str) = extract_json(raw) else {
        let excerpt: String = raw.chars().take(1000).collect();
        return fallback(format!("Could not parse structured review. Raw response:\n{excerpt}"));
    };

    let parsed: Result<RawVerdict, _> = serde_json::from_str(&json_str);
    match parsed {
        Ok(raw_verdict) => ReviewVerdict {
            id: uuid::Uuid::new_v4().to_string(),
            decision_id,
            plan_id,
            verdict: Verdict::parse_lenient(&raw_verdict.verdict),
            findings: raw_verdict
                .findings
                .into_iter()
                .map(|f| ReviewFinding {
                    tier: parse_tier(&f.tier),
                    severity: parse_severity(&f.severity),
                    description: f.description,
                    suggestion: f.suggestion,
                })
                .collect(),
            guidance: raw_verdict.guidance,
            standards_verified: raw_verdict.standards_verified,
            strengths_summary: raw_verdict.strengths_summary,
            reviewer: reviewer.to_string(),
            created_at: chrono::Utc::now(),
        },
        Err(_) => {
            let excerpt: String = raw.chars().take(1000).collect();
            fallback(format!("Could not parse structured review. Raw response:\n{excerpt}"))
        }
    }
}

/// Builds the well-known `needs_human_review` verdict for a transport/timeout
/// failure: typed failures never become exceptions.
pub fn transport_failure_verdict(
    reviewer: &str,
    decision_id: Option<String>,
    plan_id: Option<String>,
    err: &ReviewerError,
) -> ReviewVerdict {
    let guidance = match err {
        ReviewerError::Timeout(_) => "Review timed out. Manual review required.".to_string(),
        ReviewerError::Transport(msg) => format!("Reviewer process failed: {msg}. Manual review required."),
        ReviewerError::Io(e) => format!("Reviewer I/O error: {e}. Manual review required."),
    };
    ReviewVerdict {
        id: uuid::Uuid::new_v4().to_string(),
        decision_id,
        plan_id,
        verdict: Verdict::NeedsHumanReview,
        findings: Vec::new(),
        guidance,
        standards_verified: Vec::new(),
        strengths_summary: None,
        reviewer: reviewer.to_string(),
        created_at: chrono::Utc::now(),
    }
}
