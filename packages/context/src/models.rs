//! Session-context distillation, router, and settings shapes. Grounded in
//! `context-reinforcement.py`'s session-context file and `generate-context-router.py`'s
//! `context-router.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPoint {
    pub id: String,
    pub text: String,
    #[serde(default = "default_active")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

fn default_active() -> String {
    "active".to_string()
}

impl KeyPoint {
    pub fn is_active(&self) -> bool {
        self.status != "completed"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Distillation {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub key_points: Vec<KeyPoint>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub key_decisions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discovery {
    pub id: String,
    pub text: String,
    pub discovered_at: DateTime<Utc>,
    pub source: String,
}

/// The full per-session distillation + evolution record, persisted at
/// `.session-context-{session_id}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub version: u32,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub distillation: Distillation,
    #[serde(default)]
    pub discoveries: Vec<Discovery>,
    #[serde(default)]
    pub thrash_indicators: Vec<String>,
    #[serde(default)]
    pub injection_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_injected_at: Option<DateTime<Utc>>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, distillation: Distillation) -> Self {
        let now = Utc::now();
        Self {
            version: 1,
            session_id: session_id.into(),
            created_at: now,
            updated_at: now,
            distillation,
            discoveries: Vec::new(),
            thrash_indicators: Vec::new(),
            injection_count: 0,
            last_injected_at: None,
        }
    }

    pub fn active_goals(&self) -> Vec<&KeyPoint> {
        self.distillation.key_points.iter().filter(|kp| kp.is_active()).collect()
    }
}

/// One route in the static context router. `keywords` are matched against
/// the tokenized tool input via Jaccard similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub keywords: Vec<String>,
    pub context: String,
    pub tier: String,
    pub source: String,
    #[serde(default)]
    pub scope: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Router {
    pub generated: DateTime<Utc>,
    pub version: u32,
    #[serde(rename = "routeCount")]
    pub route_count: usize,
    pub routes: Vec<Route>,
}

/// One entry in a session's injection history, used for debounce/cap checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionRecord {
    pub route_id: String,
    pub timestamp: f64,
}

/// Effective `contextReinforcement` settings after the installation-default
/// → global-config → project-config cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSettings {
    pub enabled: bool,
    pub tool_call_threshold: u32,
    pub max_tokens_per_injection: u32,
    pub debounce_seconds: f64,
    pub max_injections_per_session: usize,
    pub jaccard_threshold: f64,
    pub session_context_enabled: bool,
    pub session_context_debounce_seconds: f64,
    pub max_discoveries_per_session: usize,
    pub refresh_interval: u32,
    pub distillation_model: String,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            tool_call_threshold: 8,
            max_tokens_per_injection: 400,
            debounce_seconds: 30.0,
            max_injections_per_session: 10,
            jaccard_threshold: 0.15,
            session_context_enabled: true,
            session_context_debounce_seconds: 60.0,
            max_discoveries_per_session: 10,
            refresh_interval: 5,
            distillation_model: "haiku".to_string(),
        }
    }
}

/// Partial settings overrides as they appear in `global-config.json`'s
/// `contextReinforcement` key or `project-config.json`'s
/// `settings.contextReinforcement` key. Every field optional; only present
/// keys override the cascade's current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextSettingsOverrides {
    pub enabled: Option<bool>,
    #[serde(rename = "toolCallThreshold")]
    pub tool_call_threshold: Option<u32>,
    #[serde(rename = "maxTokensPerInjection")]
    pub max_tokens_per_injection: Option<u32>,
    #[serde(rename = "debounceSeconds")]
    pub debounce_seconds: Option<f64>,
    #[serde(rename = "maxInjectionsPerSession")]
    pub max_injections_per_session: Option<usize>,
    #[serde(rename = "jaccardThreshold")]
    pub jaccard_threshold: Option<f64>,
    #[serde(rename = "sessionContextEnabled")]
    pub session_context_enabled: Option<bool>,
    #[serde(rename = "sessionContextDebounceSeconds")]
    pub session_context_debounce_seconds: Option<f64>,
    #[serde(rename = "maxDiscoveriesPerSession")]
    pub max_discoveries_per_session: Option<usize>,
    #[serde(rename = "refreshInterval")]
    pub refresh_interval: Option<u32>,
    #[serde(rename = "distillationModel")]
    pub distillation_model: Option<String>,
}

impl ContextSettingsOverrides {
    pub fn apply_to(&self, settings: &mut ContextSettings) {
        if let Some(v) = self.enabled {
            settings.enabled = v;
        }
        if let Some(v) = self.tool_call_threshold {
            settings.tool_call_threshold = v;
        }
        if let Some(v) = self.max_tokens_per_injection {
            settings.max_tokens_per_injection = v;
        }
        if let Some(v) = self.debounce_seconds {
            settings.debounce_seconds = v;
        }
        if let Some(v) = self.max_injections_per_session {
            settings.max_injections_per_session = v;
        }
        if let Some(v) = self.jaccard_threshold {
            settings.jaccard_threshold = v;
        }
        if let Some(v) = self.session_context_enabled {
            settings.session_context_enabled = v;
        }
        if let Some(v) = self.session_context_debounce_seconds {
            settings.session_context_debounce_seconds = v;
        }
        if let Some(v) = self.max_discoveries_per_session {
            settings.max_discoveries_per_session = v;
        }
        if let Some(v) = self.refresh_interval {
            settings.refresh_interval = v;
        }
        if let Some(v) = self.distillation_model.clone() {
            settings.distillation_model = v;
        }
    }
}

/// Parsed output of the distillation LLM call.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DistillationResult {
    #[serde(default)]
    pub key_points: Vec<KeyPoint>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub key_decisions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NewDiscovery {
    #[serde(default)]
    pub text: String,
}

/// Parsed output of a refresh/update LLM call.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RefreshResult {
    #[serde(default)]
    pub completed_goals: Vec<String>,
    #[serde(default)]
    pub new_discoveries: Vec<NewDiscovery>,
    #[serde(default)]
    pub thrash_indicators: Vec<String>,
}
