//! Project configuration loader, grounded in `collab_quality/config.py`.
//! Missing or invalid config files silently fall back to defaults rather
//! than failing the caller.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EnabledGates {
    pub build: bool,
    pub lint: bool,
    pub tests: bool,
    pub coverage: bool,
    pub findings: bool,
}

impl EnabledGates {
    pub fn all_enabled() -> Self {
        Self { build: true, lint: true, tests: true, coverage: true, findings: true }
    }
}

impl Default for EnabledGates {
    fn default() -> Self {
        Self::all_enabled()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub mock_tests: bool,
    #[serde(default = "default_true")]
    pub mock_tests_for_costly_ops: bool,
    #[serde(default = "default_coverage_threshold")]
    pub coverage_threshold: f64,
    #[serde(default = "default_true")]
    pub auto_governance: bool,
    #[serde(default)]
    pub quality_gates: EnabledGates,
    #[serde(default = "default_true")]
    pub kg_auto_curation: bool,
}

fn default_true() -> bool {
    true
}

fn default_coverage_threshold() -> f64 {
    80.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mock_tests: false,
            mock_tests_for_costly_ops: true,
            coverage_threshold: 80.0,
            auto_governance: true,
            quality_gates: EnabledGates::default(),
            kg_auto_curation: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityCommands {
    #[serde(default)]
    pub test_commands: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub lint_commands: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub build_commands: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub format_commands: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub setup_complete: bool,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub quality: QualityCommands,
}

fn default_version() -> u32 {
    1
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            version: 1,
            setup_complete: false,
            languages: Vec::new(),
            settings: Settings::default(),
            quality: QualityCommands::default(),
        }
    }
}

/// Loads `.../project-config.json`, returning defaults on any I/O or parse
/// failure rather than propagating an error (matching `load_project_config`).
pub fn load_project_config(path: impl AsRef<Path>) -> ProjectConfig {
    let path: PathBuf = path.as_ref().to_path_buf();
    match std::fs::read_to_string(&path) {
        Ok(body) => serde_json::from_str(&body).unwrap_or_default(),
        Err(_) => ProjectConfig::default(),
    }
}

pub fn get_enabled_gates(config: &ProjectConfig) -> EnabledGates {
    config.settings.quality_gates
}

pub fn get_coverage_threshold(config: &ProjectConfig) -> f64 {
    config.settings.coverage_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_project_config("/nonexistent/project-config.json");
        assert!(config.settings.quality_gates.build);
        assert_eq!(config.settings.coverage_threshold, 80.0);
    }

    #[test]
    fn partial_json_merges_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project-config.json");
        std::fs::write(&path, r#"{"languages": ["rust"]}"#).unwrap();

        let config = load_project_config(&path);
        assert_eq!(config.languages, vec!["rust".to_string()]);
        assert!(config.settings.quality_gates.lint);
    }
}
