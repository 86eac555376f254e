//! Audit thresholds and escalation model selection. Grounded in
//! `_audit-process.py`/`_audit-escalate.py`'s `load_audit_config()` calls
//! (the `audit/config.py` module itself was not part of the retrieved
//! sources; shape inferred from those call sites).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelection {
    #[serde(default = "default_triage_model")]
    pub triage: String,
    #[serde(default = "default_analysis_model")]
    pub analysis: String,
    #[serde(default = "default_deep_dive_model")]
    pub deep_dive: String,
}

fn default_triage_model() -> String {
    "haiku".to_string()
}
fn default_analysis_model() -> String {
    "sonnet".to_string()
}
fn default_deep_dive_model() -> String {
    "opus".to_string()
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self { triage: default_triage_model(), analysis: default_analysis_model(), deep_dive: default_deep_dive_model() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_thresholds")]
    pub thresholds: HashMap<String, f64>,
    #[serde(default)]
    pub models: ModelSelection,
    #[serde(default = "default_true")]
    pub llm_analysis_enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Named thresholds the anomaly detector checks the batch summary and
/// recent stats against.
fn default_thresholds() -> HashMap<String, f64> {
    let mut t = HashMap::new();
    t.insert("governance_block_rate".to_string(), 0.5);
    t.insert("gate_block_rate".to_string(), 0.5);
    t.insert("events_per_hour_spike_ratio".to_string(), 3.0);
    t.insert("skip_rate".to_string(), 0.3);
    t
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { thresholds: default_thresholds(), models: ModelSelection::default(), llm_analysis_enabled: true }
    }
}

/// Falls back to `AuditConfig::default()` on any I/O or parse failure —
/// audit configuration is never load-bearing enough to fail a hook over.
pub fn load_audit_config(path: impl AsRef<Path>) -> AuditConfig {
    match std::fs::read_to_string(path) {
        Ok(body) => serde_json::from_str(&body).unwrap_or_default(),
        Err(_) => AuditConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_audit_config("/nonexistent/path/audit-config.json");
        assert!(cfg.llm_analysis_enabled);
        assert_eq!(cfg.models.triage, "haiku");
    }

    #[test]
    fn partial_json_merges_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit-config.json");
        std::fs::write(&path, r#"{"llm_analysis_enabled": false}"#).unwrap();

        let cfg = load_audit_config(&path);
        assert!(!cfg.llm_analysis_enabled);
        assert_eq!(cfg.models.analysis, "sonnet");
    }
}
