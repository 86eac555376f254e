//! Installation-default → global-config → project-config settings cascade.
//! Grounded in `context-reinforcement.py::load_settings`.

use std::path::Path;

use serde::Deserialize;

use crate::models::{ContextSettings, ContextSettingsOverrides};

#[derive(Debug, Default, Deserialize)]
struct GlobalConfigFile {
    #[serde(rename = "contextReinforcement", default)]
    context_reinforcement: ContextSettingsOverrides,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectConfigSettings {
    #[serde(rename = "contextReinforcement", default)]
    context_reinforcement: ContextSettingsOverrides,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectConfigFile {
    #[serde(default)]
    settings: ProjectConfigSettings,
}

fn read_json<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(body) => serde_json::from_str(&body).unwrap_or_default(),
        Err(_) => T::default(),
    }
}

/// Builds effective settings: installation defaults overridden by
/// `~/.avt/global-config.json`'s `contextReinforcement`, then by
/// `.avt/project-config.json`'s `settings.contextReinforcement`. Missing or
/// unparsable files at either layer are silently skipped.
pub fn load_settings(global_config_path: &Path, project_config_path: &Path) -> ContextSettings {
    let mut settings = ContextSettings::default();

    let global: GlobalConfigFile = read_json(global_config_path);
    global.context_reinforcement.apply_to(&mut settings);

    let project: ProjectConfigFile = read_json(project_config_path);
    project.settings.context_reinforcement.apply_to(&mut settings);

    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_yield_installation_defaults() {
        let settings = load_settings(Path::new("/nonexistent/global.json"), Path::new("/nonexistent/project.json"));
        assert_eq!(settings.tool_call_threshold, 8);
        assert_eq!(settings.jaccard_threshold, 0.15);
    }

    #[test]
    fn project_config_overrides_global() {
        let dir = tempfile::tempdir().unwrap();
        let global_path = dir.path().join("global.json");
        let project_path = dir.path().join("project.json");

        std::fs::write(&global_path, r#"{"contextReinforcement": {"toolCallThreshold": 4}}"#).unwrap();
        std::fs::write(&project_path, r#"{"settings": {"contextReinforcement": {"toolCallThreshold": 12}}}"#).unwrap();

        let settings = load_settings(&global_path, &project_path);
        assert_eq!(settings.tool_call_threshold, 12);
    }
}
