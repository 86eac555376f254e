//! Finding lifecycle, dismissal audit trail, quality gate aggregation, and
//! experiment evidence validation. Grounded in `collab_quality/trust_engine.py`,
//! `collab_quality/gates.py`, `collab_quality/config.py`, and
//! `collab_governance/evidence_validator.py`.

pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod gates;
pub mod models;

pub use config::{get_coverage_threshold, get_enabled_gates, load_project_config, EnabledGates, ProjectConfig, QualityCommands, Settings};
pub use engine::TrustEngine;
pub use error::TrustError;
pub use evidence::{validate_evidence, validate_evidence_batch, EvidenceValidationResult, MAX_FUTURE_SKEW_DAYS};
pub use gates::{check_all_gates, GateRunner};
pub use models::{
    DismissalRecord, Finding, FindingStatus, GateResult, GateResults, Severity, TrustClassification, TrustDecision,
};
