//! Pre-tool-call injection: call counter, caps/debounce bookkeeping, and the
//! two-layer (session-context, static-router) resolver. Grounded in
//! `context-reinforcement.py::main`.

use std::path::{Path, PathBuf};

use crate::models::{ContextSettings, InjectionRecord, SessionContext};
use crate::router;

/// Filesystem-backed bookkeeping for one project's `.avt`-equivalent
/// directory: call counters, injection history, and the session-context
/// files all live under `base_dir`.
pub struct ContextInjector {
    base_dir: PathBuf,
}

/// What the pre-tool hook should do after evaluating one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// Below threshold, disabled, or no route/context matched: no output.
    None,
    /// Inject this text as `additionalContext`.
    Inject(String),
}

/// Whether a distillation job should be spawned as a side effect of this
/// call, and in what mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistillationTrigger {
    None,
    Initial,
    Refresh,
}

impl ContextInjector {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn counter_path(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!(".session-calls-{session_id}"))
    }

    fn history_path(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!(".injection-history-{session_id}"))
    }

    fn session_context_path(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!(".session-context-{session_id}.json"))
    }

    fn router_path(&self) -> PathBuf {
        self.base_dir.join("context-router.json")
    }

    /// Reads, increments, and persists the per-session tool-call counter.
    pub fn increment_counter(&self, session_id: &str) -> u32 {
        let path = self.counter_path(session_id);
        let count = std::fs::read_to_string(&path).ok().and_then(|s| s.trim().parse::<u32>().ok()).unwrap_or(0) + 1;
        let _ = std::fs::write(&path, count.to_string());
        count
    }

    fn load_history(&self, session_id: &str) -> Vec<InjectionRecord> {
        std::fs::read_to_string(self.history_path(session_id)).ok().and_then(|s| serde_json::from_str(&s).ok()).unwrap_or_default()
    }

    fn save_history(&self, session_id: &str, history: &[InjectionRecord]) {
        if let Ok(body) = serde_json::to_string(history) {
            let _ = std::fs::write(self.history_path(session_id), body);
        }
    }

    /// Reads a session's context file, returning `None` if it is missing or
    /// its distillation hasn't reached a terminal status yet (`ready` or
    /// `fallback`) — the same guard `evaluate` applies before using it for
    /// injection. Public so the distillation refresh job can load-then-save.
    pub fn load_session_context(&self, session_id: &str) -> Option<SessionContext> {
        let body = std::fs::read_to_string(self.session_context_path(session_id)).ok()?;
        let ctx: SessionContext = serde_json::from_str(&body).ok()?;
        match ctx.distillation.status.as_str() {
            "ready" | "fallback" => Some(ctx),
            _ => None,
        }
    }

    pub fn save_session_context(&self, ctx: &SessionContext) -> std::io::Result<()> {
        let body = serde_json::to_string_pretty(ctx)?;
        std::fs::write(self.session_context_path(&ctx.session_id), body)
    }

    fn is_route_debounced(history: &[InjectionRecord], route_id: &str, debounce_seconds: f64, now: f64) -> bool {
        history.iter().any(|e| e.route_id == route_id && now - e.timestamp < debounce_seconds)
    }

    /// Evaluates one pre-tool-call hook invocation. `now` and `tool_input`
    /// come from the caller (hook input); `transcript_present` indicates
    /// whether a transcript path was supplied, gating distillation spawns.
    ///
    /// Returns the injection outcome plus whether a distillation job should
    /// be spawned (the caller owns spawning — this module only decides).
    pub fn evaluate(
        &self,
        session_id: &str,
        tool_input: &serde_json::Value,
        transcript_present: bool,
        settings: &ContextSettings,
        now: f64,
    ) -> (InjectionOutcome, DistillationTrigger) {
        if !settings.enabled {
            return (InjectionOutcome::None, DistillationTrigger::None);
        }

        let call_count = self.increment_counter(session_id);
        if call_count < settings.tool_call_threshold {
            return (InjectionOutcome::None, DistillationTrigger::None);
        }

        let mut history = self.load_history(session_id);
        if history.len() >= settings.max_injections_per_session {
            return (InjectionOutcome::None, DistillationTrigger::None);
        }

        if settings.session_context_enabled {
            match self.load_session_context(session_id) {
                Some(ctx) => {
                    if !Self::is_route_debounced(&history, "session-context", settings.session_context_debounce_seconds, now) {
                        if let Some(injection) = build_session_injection(&ctx) {
                            history.retain(|e| e.route_id != "session-context");
                            history.push(InjectionRecord { route_id: "session-context".into(), timestamp: now });
                            self.save_history(session_id, &history);

                            let trigger = self.bump_injection_count(session_id, settings.refresh_interval);
                            return (InjectionOutcome::Inject(injection), trigger);
                        }
                    }
                }
                None if transcript_present => {
                    return (InjectionOutcome::None, DistillationTrigger::Initial);
                }
                None => {}
            }
        }

        let routes = router::load_router(&self.router_path());
        if routes.is_empty() {
            return (InjectionOutcome::None, DistillationTrigger::None);
        }

        let input_text = router::extract_tool_input_text(tool_input);
        let input_keywords = router::tokenize(&input_text);
        if input_keywords.is_empty() {
            return (InjectionOutcome::None, DistillationTrigger::None);
        }

        let Some((route, _score)) = router::find_best_match(&routes, &input_keywords, settings.jaccard_threshold) else {
            return (InjectionOutcome::None, DistillationTrigger::None);
        };

        if Self::is_route_debounced(&history, &route.id, settings.debounce_seconds, now) {
            return (InjectionOutcome::None, DistillationTrigger::None);
        }

        history.retain(|e| e.route_id != route.id);
        history.push(InjectionRecord { route_id: route.id.clone(), timestamp: now });
        self.save_history(session_id, &history);

        (InjectionOutcome::Inject(route.context.clone()), DistillationTrigger::None)
    }

    /// Increments the session context's `injection_count` and bumps
    /// `last_injected_at`; returns whether this crossing of
    /// `refresh_interval` should trigger a refresh distillation.
    fn bump_injection_count(&self, session_id: &str, refresh_interval: u32) -> DistillationTrigger {
        let Some(mut ctx) = self.load_session_context(session_id) else { return DistillationTrigger::None };
        ctx.injection_count += 1;
        ctx.last_injected_at = Some(chrono::Utc::now());
        let count = ctx.injection_count;
        let _ = self.save_session_context(&ctx);
        if refresh_interval > 0 && count % refresh_interval == 0 { DistillationTrigger::Refresh } else { DistillationTrigger::None }
    }
}

/// Builds the session-context injection string. Returns `None` when there is
/// nothing constructive to say (all goals completed, no discoveries).
fn build_session_injection(ctx: &SessionContext) -> Option<String> {
    let active_goals = ctx.active_goals();
    if active_goals.is_empty() && ctx.discoveries.is_empty() {
        return None;
    }

    let mut parts = vec!["SESSION CONTEXT:".to_string()];

    if !active_goals.is_empty() {
        parts.push("Goals remaining:".to_string());
        for kp in &active_goals {
            parts.push(format!("- {}", kp.text));
        }
    }

    if !ctx.discoveries.is_empty() {
        parts.push("Key findings:".to_string());
        let start = ctx.discoveries.len().saturating_sub(5);
        for disc in &ctx.discoveries[start..] {
            parts.push(format!("- {}", disc.text));
        }
    }

    if !ctx.distillation.constraints.is_empty() {
        parts.push(format!("Constraints: {}", ctx.distillation.constraints.join("; ")));
    }

    if !ctx.distillation.key_decisions.is_empty() {
        parts.push(format!("Key decisions: {}", ctx.distillation.key_decisions.join("; ")));
    }

    if !ctx.thrash_indicators.is_empty() {
        let guidance: Vec<&String> = ctx.thrash_indicators.iter().filter(|t| !t.trim().is_empty()).take(2).collect();
        if !guidance.is_empty() {
            parts.push(format!("Guidance: {}", guidance.into_iter().cloned().collect::<Vec<_>>().join("; ")));
        }
    }

    Some(parts.join("\n"))
}

pub fn avt_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(".avt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Distillation, KeyPoint};

    fn settings() -> ContextSettings {
        ContextSettings::default()
    }

    #[test]
    fn below_threshold_produces_no_injection() {
        let dir = tempfile::tempdir().unwrap();
        let injector = ContextInjector::new(dir.path());
        let settings = settings();
        for i in 0..settings.tool_call_threshold - 1 {
            let (outcome, _) = injector.evaluate("sess-1", &serde_json::json!({}), false, &settings, i as f64);
            assert_eq!(outcome, InjectionOutcome::None);
        }
    }

    #[test]
    fn nth_call_crosses_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let injector = ContextInjector::new(dir.path());
        let settings = settings();
        for _ in 0..settings.tool_call_threshold - 1 {
            injector.increment_counter("sess-1");
        }
        let count = injector.increment_counter("sess-1");
        assert_eq!(count, settings.tool_call_threshold);
    }

    #[test]
    fn missing_session_context_triggers_initial_distillation() {
        let dir = tempfile::tempdir().unwrap();
        let injector = ContextInjector::new(dir.path());
        let settings = settings();
        for _ in 0..settings.tool_call_threshold {
            injector.increment_counter("ignored");
        }
        let (outcome, trigger) = injector.evaluate("sess-1", &serde_json::json!({}), true, &settings, 0.0);
        assert_eq!(outcome, InjectionOutcome::None);
        assert_eq!(trigger, DistillationTrigger::Initial);
    }

    #[test]
    fn session_context_with_active_goal_injects() {
        let dir = tempfile::tempdir().unwrap();
        let injector = ContextInjector::new(dir.path());
        let settings = settings();

        let ctx = SessionContext::new(
            "sess-1",
            Distillation { status: "ready".into(), key_points: vec![KeyPoint { id: "kp-1".into(), text: "add auth".into(), status: "active".into(), completed_at: None }], constraints: vec![], key_decisions: vec![] },
        );
        injector.save_session_context(&ctx).unwrap();

        let (outcome, _) = injector.evaluate("sess-1", &serde_json::json!({}), true, &settings, 1000.0);
        match outcome {
            InjectionOutcome::Inject(text) => assert!(text.contains("add auth")),
            InjectionOutcome::None => panic!("expected an injection"),
        }
    }

    #[test]
    fn all_goals_completed_and_no_discoveries_skips_injection() {
        let dir = tempfile::tempdir().unwrap();
        let injector = ContextInjector::new(dir.path());

        let ctx = SessionContext::new(
            "sess-1",
            Distillation { status: "ready".into(), key_points: vec![KeyPoint { id: "kp-1".into(), text: "done".into(), status: "completed".into(), completed_at: None }], constraints: vec![], key_decisions: vec![] },
        );
        assert!(build_session_injection(&ctx).is_none());
    }

    #[test]
    fn session_context_debounce_skips_repeat_injection() {
        let dir = tempfile::tempdir().unwrap();
        let injector = ContextInjector::new(dir.path());
        let settings = settings();

        let ctx = SessionContext::new(
            "sess-1",
            Distillation { status: "ready".into(), key_points: vec![KeyPoint { id: "kp-1".into(), text: "add auth".into(), status: "active".into(), completed_at: None }], constraints: vec![], key_decisions: vec![] },
        );
        injector.save_session_context(&ctx).unwrap();

        let (first, _) = injector.evaluate("sess-1", &serde_json::json!({}), true, &settings, 1000.0);
        assert!(matches!(first, InjectionOutcome::Inject(_)));

        let (second, _) = injector.evaluate("sess-1", &serde_json::json!({}), true, &settings, 1010.0);
        assert_eq!(second, InjectionOutcome::None);
    }

    #[test]
    fn injection_cap_blocks_further_injections() {
        let dir = tempfile::tempdir().unwrap();
        let injector = ContextInjector::new(dir.path());
        let mut settings = settings();
        settings.max_injections_per_session = 1;

        let ctx = SessionContext::new(
            "sess-1",
            Distillation { status: "ready".into(), key_points: vec![KeyPoint { id: "kp-1".into(), text: "add auth".into(), status: "active".into(), completed_at: None }], constraints: vec![], key_decisions: vec![] },
        );
        injector.save_session_context(&ctx).unwrap();

        let (first, _) = injector.evaluate("sess-1", &serde_json::json!({}), true, &settings, 1000.0);
        assert!(matches!(first, InjectionOutcome::Inject(_)));

        let (second, _) = injector.evaluate("sess-1", &serde_json::json!({}), true, &settings, 2000.0);
        assert_eq!(second, InjectionOutcome::None);
    }

    #[test]
    fn router_layer_matches_on_keyword_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let injector = ContextInjector::new(dir.path());
        let settings = settings();

        let router_json = serde_json::json!({
            "generated": chrono::Utc::now(),
            "version": 1,
            "routeCount": 1,
            "routes": [{
                "id": "auth-pattern",
                "keywords": ["auth", "token", "session"],
                "context": "Use the shared AuthService for session tokens.",
                "tier": "architecture",
                "source": "kg:auth-pattern",
                "scope": []
            }]
        });
        std::fs::write(dir.path().join("context-router.json"), router_json.to_string()).unwrap();

        let (outcome, _) = injector.evaluate("sess-1", &serde_json::json!({"command": "implement auth token session flow"}), false, &settings, 0.0);
        match outcome {
            InjectionOutcome::Inject(text) => assert!(text.contains("AuthService")),
            InjectionOutcome::None => panic!("expected router injection"),
        }
    }
}
