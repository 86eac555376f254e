//! Quality gate aggregation. Build/lint/test/coverage execution is out of
//! scope; callers
//! inject pre-computed results via [`GateRunner`]. The findings gate is
//! always computed in-crate from the trust engine.

use async_trait::async_trait;

use crate::config::EnabledGates;
use crate::engine::TrustEngine;
use crate::error::TrustError;
use crate::models::{GateResult, GateResults, Severity};

/// Supplies the results of gates this crate does not itself execute.
#[async_trait]
pub trait GateRunner: Send + Sync {
    async fn build(&self) -> GateResult;
    async fn lint(&self) -> GateResult;
    async fn tests(&self) -> GateResult;
    async fn coverage(&self) -> GateResult;
}

/// Runs every sub-gate and ANDs the results. Disabled gates automatically
/// pass with `detail = "Skipped (disabled)"`.
pub async fn check_all_gates(
    enabled: &EnabledGates,
    runner: &dyn GateRunner,
    trust: &TrustEngine,
) -> Result<GateResults, TrustError> {
    let build = if enabled.build { runner.build().await } else { GateResult::skipped("build") };
    let lint = if enabled.lint { runner.lint().await } else { GateResult::skipped("lint") };
    let tests = if enabled.tests { runner.tests().await } else { GateResult::skipped("tests") };
    let coverage = if enabled.coverage { runner.coverage().await } else { GateResult::skipped("coverage") };
    let findings = if enabled.findings {
        findings_gate(trust).await?
    } else {
        GateResult::skipped("findings")
    };

    let all_passed = build.passed && lint.passed && tests.passed && coverage.passed && findings.passed;

    Ok(GateResults { build, lint, tests, coverage, findings, all_passed })
}

/// Fails iff there is at least one open finding of severity >= high.
async fn findings_gate(trust: &TrustEngine) -> Result<GateResult, TrustError> {
    let unresolved = trust.get_unresolved_findings(Severity::High).await?;
    if unresolved.is_empty() {
        Ok(GateResult { name: "findings".into(), passed: true, detail: "No critical findings".into() })
    } else {
        Ok(GateResult {
            name: "findings".into(),
            passed: false,
            detail: format!("{} unresolved critical/high finding(s)", unresolved.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnabledGates;

    struct AllPassRunner;

    #[async_trait]
    impl GateRunner for AllPassRunner {
        async fn build(&self) -> GateResult {
            GateResult { name: "build".into(), passed: true, detail: "ok".into() }
        }
        async fn lint(&self) -> GateResult {
            GateResult { name: "lint".into(), passed: true, detail: "ok".into() }
        }
        async fn tests(&self) -> GateResult {
            GateResult { name: "tests".into(), passed: true, detail: "ok".into() }
        }
        async fn coverage(&self) -> GateResult {
            GateResult { name: "coverage".into(), passed: true, detail: "ok".into() }
        }
    }

    #[tokio::test]
    async fn disabled_gate_auto_passes() {
        let dir = tempfile::tempdir().unwrap();
        let trust = TrustEngine::open(dir.path().join("trust.db")).await.unwrap();
        let enabled = EnabledGates { build: false, ..EnabledGates::all_enabled() };

        let results = check_all_gates(&enabled, &AllPassRunner, &trust).await.unwrap();
        assert_eq!(results.build.detail, "Skipped (disabled)");
        assert!(results.all_passed);
    }

    #[tokio::test]
    async fn open_high_finding_fails_gate_and_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let trust = TrustEngine::open(dir.path().join("trust.db")).await.unwrap();
        trust.record_finding("f1", "clippy", Severity::Critical, None, "unsafe unwrap").await.unwrap();

        let results = check_all_gates(&EnabledGates::all_enabled(), &AllPassRunner, &trust).await.unwrap();
        assert!(!results.findings.passed);
        assert!(!results.all_passed);
    }
}
