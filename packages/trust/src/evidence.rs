//! Structural validation of experiment evidence submitted for evolution
//! proposals. Grounded in `evidence_validator.py`: checks that evidence looks
//! real (existing source paths, sane timestamps, numeric metrics) without
//! attempting to judge its substance.

use chrono::{DateTime, Utc};
use regex::Regex;

use warden_governance::{EvidenceType, ExperimentEvidence};

/// Evidence dated more than this many days ahead is rejected as implausible.
pub const MAX_FUTURE_SKEW_DAYS: i64 = 30;

#[derive(Debug, Clone, Default)]
pub struct EvidenceValidationResult {
    pub valid: bool,
    pub failures: Vec<String>,
}

impl EvidenceValidationResult {
    fn ok() -> Self {
        Self { valid: true, failures: Vec::new() }
    }

    fn with_failures(failures: Vec<String>) -> Self {
        Self { valid: failures.is_empty(), failures }
    }
}

/// Validates a single piece of evidence. When `allow_mock` is true (set by
/// the `GOVERNANCE_MOCK_REVIEW` env flag), skips all checks.
pub fn validate_evidence(
    evidence: &ExperimentEvidence,
    experiment_start: Option<DateTime<Utc>>,
    allow_mock: bool,
) -> EvidenceValidationResult {
    if allow_mock || std::env::var("GOVERNANCE_MOCK_REVIEW").is_ok() {
        return EvidenceValidationResult::ok();
    }

    let mut failures = Vec::new();

    if !evidence.source.is_empty() && !std::path::Path::new(&evidence.source).exists() {
        failures.push(format!("Source path does not exist: {}", evidence.source));
    }

    if let Some(ts) = evidence.timestamp {
        if let Some(reason) = check_timestamp(ts, experiment_start) {
            failures.push(reason);
        }
    }

    match evidence.evidence_type {
        EvidenceType::TestResults => failures.extend(check_test_results(evidence)),
        EvidenceType::Benchmark => failures.extend(check_benchmark(evidence)),
        _ => {}
    }

    if !evidence.metrics.is_empty() {
        // Metrics are already typed as f64 in the Rust model, so the
        // original's "must parse as numeric" check is structurally
        // unnecessary here — the type system enforces it.
    }

    failures.extend(check_comparison(evidence));

    EvidenceValidationResult::with_failures(failures)
}

/// All evidence in the batch must pass.
pub fn validate_evidence_batch(
    evidence: &[ExperimentEvidence],
    experiment_start: Option<DateTime<Utc>>,
    allow_mock: bool,
) -> EvidenceValidationResult {
    let mut all_failures = Vec::new();
    for (i, ev) in evidence.iter().enumerate() {
        let result = validate_evidence(ev, experiment_start, allow_mock);
        for failure in result.failures {
            all_failures.push(format!("Evidence[{i}] ({:?}): {failure}", ev.evidence_type));
        }
    }
    EvidenceValidationResult::with_failures(all_failures)
}

fn check_timestamp(ts: DateTime<Utc>, experiment_start: Option<DateTime<Utc>>) -> Option<String> {
    if let Some(start) = experiment_start {
        if ts < start {
            return Some(format!("Evidence timestamp {ts} is before experiment start {start}"));
        }
    }

    let now = Utc::now();
    if (ts - now).num_days() > MAX_FUTURE_SKEW_DAYS {
        return Some(format!("Evidence timestamp {ts} is more than {MAX_FUTURE_SKEW_DAYS} days in the future"));
    }
    None
}

fn check_test_results(evidence: &ExperimentEvidence) -> Vec<String> {
    let output = if !evidence.raw_output.is_empty() { &evidence.raw_output } else { &evidence.summary };
    if output.is_empty() {
        return vec!["Test results evidence has no raw_output or summary".to_string()];
    }

    let has_counts = Regex::new(r"(?i)\d+\s+(pass|fail|error|skip)").unwrap().is_match(output)
        || Regex::new(r"(?i)(passed|failed|errors?|skipped)\s*[=:]\s*\d+").unwrap().is_match(output)
        || Regex::new(r"(?i)(\d+)\s+test").unwrap().is_match(output);

    if has_counts {
        Vec::new()
    } else {
        vec![
            "Test results evidence does not contain recognizable pass/fail counts. \
             Expected patterns like '5 passed, 0 failed' or 'Tests: 5'."
                .to_string(),
        ]
    }
}

fn check_benchmark(evidence: &ExperimentEvidence) -> Vec<String> {
    if !evidence.metrics.is_empty() {
        return Vec::new();
    }
    let output = if !evidence.raw_output.is_empty() { &evidence.raw_output } else { &evidence.summary };
    let has_numbers = Regex::new(r"(?i)\d+\.?\d*\s*(ms|s|ns|us|MB|KB|GB|ops|req)").unwrap().is_match(output);
    if has_numbers {
        Vec::new()
    } else {
        vec!["Benchmark evidence has no metrics dict and no recognizable numeric measurements in output.".to_string()]
    }
}

fn check_comparison(evidence: &ExperimentEvidence) -> Vec<String> {
    // `ComparisonToBaseline` is a typed struct in the Rust model requiring
    // `baseline`/`experiment` at construction, so the original's
    // missing-key check is unreachable here; nothing further to validate.
    let _ = evidence;
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn evidence(evidence_type: EvidenceType, raw_output: &str) -> ExperimentEvidence {
        ExperimentEvidence {
            evidence_type,
            source: String::new(),
            raw_output: raw_output.to_string(),
            summary: String::new(),
            metrics: HashMap::new(),
            comparison_to_baseline: HashMap::new(),
            timestamp: None,
        }
    }

    #[test]
    fn mock_mode_always_valid() {
        let ev = evidence(EvidenceType::TestResults, "");
        let result = validate_evidence(&ev, None, true);
        assert!(result.valid);
    }

    #[test]
    fn test_results_without_counts_fails() {
        let ev = evidence(EvidenceType::TestResults, "it compiled fine");
        let result = validate_evidence(&ev, None, false);
        assert!(!result.valid);
    }

    #[test]
    fn test_results_with_counts_passes() {
        let ev = evidence(EvidenceType::TestResults, "5 passed, 0 failed");
        let result = validate_evidence(&ev, None, false);
        assert!(result.valid);
    }

    #[test]
    fn future_timestamp_beyond_30_days_fails() {
        let mut ev = evidence(EvidenceType::Observation, "notes");
        ev.timestamp = Some(Utc::now() + chrono::Duration::days(40));
        let result = validate_evidence(&ev, None, false);
        assert!(!result.valid);
        assert!(result.failures[0].contains("30 days"));
    }

    #[test]
    fn benchmark_with_numeric_output_passes() {
        let ev = evidence(EvidenceType::Benchmark, "p99 latency: 42ms");
        let result = validate_evidence(&ev, None, false);
        assert!(result.valid);
    }
}
