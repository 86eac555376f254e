//! Transcript excerpting and the two LLM-backed jobs that populate a
//! session's context: initial distillation of the opening user prompt, and
//! refresh/update passes that mark goals completed and add discoveries.
//! Grounded in `_distill-session-context.py` and `_update-session-context.py`
//! (the two scripts differ only in throttle, trigger, and log prefix; the
//! refresh/update logic itself is identical and is shared here).

use std::time::Duration;

use warden_reviewer::ReviewBackend;

use crate::error::ContextError;
use crate::models::{Discovery, Distillation, DistillationResult, KeyPoint, RefreshResult, SessionContext};

const DISTILL_TIMEOUT: Duration = Duration::from_secs(30);

/// Below this length, the prompt is stored directly with no LLM call.
const SHORT_PROMPT_THRESHOLD: usize = 500;

/// Extracts the first user message from a transcript JSONL file. Each line
/// is a transcript entry `{"type": "user", "message": {"content": ...}}`;
/// content is either a string or a list of `{"type": "text", "text": ...}`
/// blocks.
pub fn extract_original_prompt(transcript: &str) -> String {
    for line in transcript.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(entry) = serde_json::from_str::<serde_json::Value>(line) else { continue };
        if entry.get("type").and_then(|v| v.as_str()) != Some("user") {
            continue;
        }
        let content = entry.pointer("/message/content").cloned().unwrap_or(serde_json::Value::Null);
        if let Some(s) = content.as_str() {
            return s.to_string();
        }
        if let Some(blocks) = content.as_array() {
            let parts: Vec<String> = blocks
                .iter()
                .filter_map(|b| {
                    if let Some(s) = b.as_str() {
                        Some(s.to_string())
                    } else if b.get("type").and_then(|v| v.as_str()) == Some("text") {
                        b.get("text").and_then(|v| v.as_str()).map(|s| s.to_string())
                    } else {
                        None
                    }
                })
                .collect();
            return parts.join("\n");
        }
    }
    String::new()
}

/// Extracts the last up-to-5 assistant text excerpts (each capped at 500
/// chars) from the last 50 transcript lines.
pub fn extract_recent_transcript(transcript: &str) -> String {
    let lines: Vec<&str> = transcript.lines().collect();
    let recent = if lines.len() > 50 { &lines[lines.len() - 50..] } else { &lines[..] };

    let mut excerpts = Vec::new();
    for line in recent {
        let Ok(entry) = serde_json::from_str::<serde_json::Value>(line) else { continue };
        if entry.get("role").and_then(|v| v.as_str()) != Some("assistant") {
            continue;
        }
        let content = entry.get("content").cloned().unwrap_or(serde_json::Value::Null);
        if let Some(blocks) = content.as_array() {
            for b in blocks {
                if b.get("type").and_then(|v| v.as_str()) == Some("text") {
                    if let Some(text) = b.get("text").and_then(|v| v.as_str()) {
                        excerpts.push(text.chars().take(500).collect::<String>());
                    }
                }
            }
        } else if let Some(s) = content.as_str() {
            excerpts.push(s.chars().take(500).collect());
        }
    }

    let start = excerpts.len().saturating_sub(5);
    excerpts[start..].join("\n---\n")
}

fn build_distillation_prompt(original_prompt: &str) -> String {
    let truncated: String = original_prompt.chars().take(8000).collect();
    format!(
        r#"Extract key information from this AI coding session prompt. Return ONLY a JSON object with no other text.

## Original Prompt
{truncated}

## Instructions
Return ONLY a JSON object:
{{
  "key_points": [
    {{"id": "kp-1", "text": "concise goal or task description"}}
  ],
  "constraints": ["explicit constraint from the prompt"],
  "key_decisions": ["decision or preference stated in the prompt"]
}}

Rules:
- Each key_point should be a discrete, actionable goal
- Constraints are things the user explicitly said to do or avoid
- Key decisions are preferences or choices stated in the prompt
- Be concise: each item should be one sentence
- Maximum 8 key_points, 5 constraints, 5 key_decisions
- If the prompt is simple with one goal, that is fine: return one key_point"#
    )
}

fn build_refresh_prompt(key_points: &[KeyPoint], discoveries: &[Discovery], recent_transcript: &str) -> String {
    let kp_lines: Vec<String> = key_points.iter().map(|kp| format!("- [{}] {}: {}", kp.status, kp.id, kp.text)).collect();
    let disc_lines: Vec<String> = discoveries.iter().rev().take(5).collect::<Vec<_>>().into_iter().rev().map(|d| format!("- {}", d.text)).collect();
    let recent: String = recent_transcript.chars().take(4000).collect();

    format!(
        r#"Given session goals and recent activity, identify what has changed. Return ONLY a JSON object.

## Current Session Goals
{goals}

## Current Discoveries
{discoveries}

## Recent Activity (from transcript)
{recent}

## Instructions
Return ONLY a JSON object:
{{
  "completed_goals": ["kp-1"],
  "new_discoveries": [
    {{"text": "concise description of milestone or finding"}}
  ],
  "thrash_indicators": []
}}

Rules:
- Only mark a goal completed if the transcript clearly shows it was accomplished
- A discovery is a significant finding, milestone, or contextual piece that helps the agent stay on track
- Only include genuinely NEW discoveries not already in the existing list
- thrash_indicators: only include if there is clear evidence of repeated failures, circular reasoning, or confusion
- NEVER include negative or discouraging content
- Maximum 3 new discoveries per update"#,
        goals = if kp_lines.is_empty() { "(none)".to_string() } else { kp_lines.join("\n") },
        discoveries = if disc_lines.is_empty() { "(none)".to_string() } else { disc_lines.join("\n") },
    )
}

fn parse_json_response<T: serde::de::DeserializeOwned>(raw: &str) -> Option<T> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') {
        if let Ok(parsed) = serde_json::from_str(trimmed) {
            return Some(parsed);
        }
    }
    let json = warden_reviewer::verdict::extract_json(raw)?;
    serde_json::from_str(&json).ok()
}

fn mock_distillation(original_prompt: &str) -> DistillationResult {
    let truncated: String = original_prompt.chars().take(200).collect();
    let text = if original_prompt.chars().count() > 200 { format!("{truncated}...") } else { truncated };
    DistillationResult { key_points: vec![KeyPoint { id: "kp-1".into(), text, status: "active".into(), completed_at: None }], constraints: vec![], key_decisions: vec![] }
}

fn short_prompt_distillation(original_prompt: &str) -> DistillationResult {
    DistillationResult {
        key_points: vec![KeyPoint { id: "kp-1".into(), text: original_prompt.trim().to_string(), status: "active".into(), completed_at: None }],
        constraints: vec![],
        key_decisions: vec![],
    }
}

/// Runs the initial distillation of a session's opening prompt. `mock` takes
/// the `GOVERNANCE_MOCK_REVIEW` short-circuit path; short
/// prompts skip the LLM call entirely; everything else calls the backend and
/// falls back to a truncated mock distillation on parse failure.
pub async fn distill_initial(backend: &dyn ReviewBackend, session_id: &str, original_prompt: &str, mock: bool) -> Result<(SessionContext, &'static str), ContextError> {
    if original_prompt.is_empty() {
        return Ok((SessionContext::new(session_id, Distillation { status: "fallback".into(), ..Default::default() }), "fallback"));
    }

    if mock {
        let result = mock_distillation(original_prompt);
        return Ok((
            SessionContext::new(session_id, Distillation { status: "ready".into(), key_points: result.key_points, constraints: result.constraints, key_decisions: result.key_decisions }),
            "ready",
        ));
    }

    if original_prompt.chars().count() < SHORT_PROMPT_THRESHOLD {
        let result = short_prompt_distillation(original_prompt);
        return Ok((
            SessionContext::new(session_id, Distillation { status: "ready".into(), key_points: result.key_points, constraints: result.constraints, key_decisions: result.key_decisions }),
            "ready",
        ));
    }

    let prompt = build_distillation_prompt(original_prompt);
    let raw = backend.run(&prompt, DISTILL_TIMEOUT).await.unwrap_or_default();
    match parse_json_response::<DistillationResult>(&raw) {
        Some(result) if !result.key_points.is_empty() => Ok((
            SessionContext::new(session_id, Distillation { status: "ready".into(), key_points: result.key_points, constraints: result.constraints, key_decisions: result.key_decisions }),
            "ready",
        )),
        _ => {
            let result = mock_distillation(original_prompt);
            Ok((
                SessionContext::new(
                    session_id,
                    Distillation { status: "fallback".into(), key_points: result.key_points, constraints: result.constraints, key_decisions: result.key_decisions },
                ),
                "fallback",
            ))
        }
    }
}

/// Marks completed goals and appends new (deduplicated, capped) discoveries
/// to an existing session context, from a refresh/update LLM call. Returns
/// `false` if nothing changed (parse failure, or the model reported no
/// updates), in which case the caller should leave the file untouched.
pub async fn refresh(
    backend: &dyn ReviewBackend,
    context: &mut SessionContext,
    recent_transcript: &str,
    source: &str,
    max_discoveries: usize,
    mock: bool,
) -> bool {
    if mock {
        return false;
    }

    let prompt = build_refresh_prompt(&context.distillation.key_points, &context.discoveries, recent_transcript);
    let raw = backend.run(&prompt, DISTILL_TIMEOUT).await.unwrap_or_default();
    let Some(parsed) = parse_json_response::<RefreshResult>(&raw) else { return false };

    let mut changed = false;
    let completed: std::collections::HashSet<&str> = parsed.completed_goals.iter().map(|s| s.as_str()).collect();
    for kp in &mut context.distillation.key_points {
        if completed.contains(kp.id.as_str()) && kp.status != "completed" {
            kp.status = "completed".to_string();
            kp.completed_at = Some(chrono::Utc::now());
            changed = true;
        }
    }

    for new_disc in parsed.new_discoveries.into_iter().take(3) {
        let text = new_disc.text.trim().to_string();
        if text.is_empty() {
            continue;
        }
        if context.discoveries.len() >= max_discoveries {
            break;
        }
        if is_duplicate_discovery(&text, &context.discoveries) {
            continue;
        }
        let id = format!("disc-{}", context.discoveries.len() + 1);
        context.discoveries.push(Discovery { id, text, discovered_at: chrono::Utc::now(), source: source.to_string() });
        changed = true;
    }

    if !parsed.thrash_indicators.is_empty() {
        context.thrash_indicators = parsed.thrash_indicators.into_iter().take(3).collect();
        changed = true;
    }

    if changed {
        context.updated_at = chrono::Utc::now();
    }
    changed
}

/// Case-insensitive substring match in either direction, matching
/// `_is_duplicate_discovery`.
fn is_duplicate_discovery(text: &str, existing: &[Discovery]) -> bool {
    let lower = text.to_lowercase();
    existing.iter().any(|d| {
        let existing_lower = d.text.to_lowercase();
        lower.contains(&existing_lower) || existing_lower.contains(&lower)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use warden_reviewer::error::ReviewerError;

    struct FixedBackend(&'static str);

    #[async_trait]
    impl ReviewBackend for FixedBackend {
        async fn run(&self, _prompt: &str, _timeout: Duration) -> Result<String, ReviewerError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn extract_original_prompt_handles_string_content() {
        let transcript = r#"{"type": "user", "message": {"content": "build me a login form"}}"#;
        assert_eq!(extract_original_prompt(transcript), "build me a login form");
    }

    #[test]
    fn extract_original_prompt_handles_block_content() {
        let transcript = r#"{"type": "user", "message": {"content": [{"type": "text", "text": "hello"}, {"type": "text", "text": "world"}]}}"#;
        assert_eq!(extract_original_prompt(transcript), "hello\nworld");
    }

    #[tokio::test]
    async fn short_prompt_skips_llm_call() {
        let backend = FixedBackend("should not be called");
        let (ctx, status) = distill_initial(&backend, "sess-1", "short prompt", false).await.unwrap();
        assert_eq!(status, "ready");
        assert_eq!(ctx.distillation.key_points[0].text, "short prompt");
    }

    #[tokio::test]
    async fn mock_mode_builds_synthetic_distillation() {
        let backend = FixedBackend("ignored");
        let long_prompt = "x".repeat(600);
        let (ctx, status) = distill_initial(&backend, "sess-1", &long_prompt, true).await.unwrap();
        assert_eq!(status, "ready");
        assert!(ctx.distillation.key_points[0].text.ends_with("..."));
    }

    #[tokio::test]
    async fn refresh_marks_goals_completed_and_dedupes_discoveries() {
        let backend = FixedBackend(
            r#"{"completed_goals": ["kp-1"], "new_discoveries": [{"text": "uses JWT for auth"}], "thrash_indicators": []}"#,
        );
        let mut ctx = SessionContext::new(
            "sess-1",
            Distillation { status: "ready".into(), key_points: vec![KeyPoint { id: "kp-1".into(), text: "add auth".into(), status: "active".into(), completed_at: None }], constraints: vec![], key_decisions: vec![] },
        );
        ctx.discoveries.push(Discovery { id: "disc-1".into(), text: "uses jwt for auth already".into(), discovered_at: chrono::Utc::now(), source: "refresh".into() });

        let changed = refresh(&backend, &mut ctx, "(transcript)", "refresh", 10, false).await;
        assert!(changed);
        assert_eq!(ctx.distillation.key_points[0].status, "completed");
        assert_eq!(ctx.discoveries.len(), 1); // duplicate discovery skipped
    }

    #[tokio::test]
    async fn refresh_returns_false_on_unparseable_output() {
        let backend = FixedBackend("not json at all");
        let mut ctx = SessionContext::new("sess-1", Distillation::default());
        assert!(!refresh(&backend, &mut ctx, "", "refresh", 10, false).await);
    }
}
