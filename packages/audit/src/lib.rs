//! Audit pipeline: append-only event emission, checkpointed processing,
//! statistics accumulation, threshold anomaly detection, and a three-tier
//! LLM escalation chain. Grounded in `_audit-process.py`, `_audit-escalate.py`,
//! and the `audit/` package of the original hook scripts.

pub mod anomaly;
pub mod config;
pub mod emitter;
pub mod error;
pub mod escalation;
pub mod models;
pub mod processor;
pub mod prompts;
pub mod recommendations;
pub mod stats;

pub use anomaly::AnomalyDetector;
pub use config::{load_audit_config, AuditConfig};
pub use emitter::emit;
pub use error::AuditError;
pub use escalation::{run_tier1_haiku, run_tier2_sonnet, run_tier3_opus};
pub use models::{
    AnalysisResult, Anomaly, AnomalySeverity, AuditEvent, BatchSummary, Checkpoint, DeepAnalysisResult, Directive,
    Recommendation, RecommendationStatus, RecommendationSuggestion, TriageResult,
};
pub use processor::{take_pending_anomalies, write_pending_anomalies, Processor, ProcessorLock, ProcessorRun};
pub use prompts::{build_haiku_prompt, build_opus_prompt, build_sonnet_prompt, load_directives, match_directives};
pub use recommendations::RecommendationManager;
pub use stats::{SessionSummary, StatsAccumulator};
