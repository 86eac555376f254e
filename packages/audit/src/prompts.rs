//! Prompt builders for the three escalation tiers. Grounded verbatim in
//! `audit/prompts.py`: each tier gets a progressively richer prompt.

use std::path::Path;

use crate::models::{
    Anomaly, AnalysisResult, Directive, Recommendation, TriageResult,
};
use crate::stats::SessionSummary;

/// Haiku's job: quick pattern recognition. Known pattern, or something new?
pub fn build_haiku_prompt(
    anomalies: &[Anomaly],
    directives: &[Directive],
    recent_stats: &std::collections::HashMap<String, i64>,
    recent_recommendations: &[Recommendation],
) -> String {
    let anomaly_lines: Vec<String> = anomalies
        .iter()
        .map(|a| {
            let mut line = format!("- [{}] {}: {}", a.severity.as_str(), a.anomaly_type, a.description);
            if !a.metric_values.is_empty() {
                line.push_str(&format!("\n  Metrics: {}", serde_json::to_string(&a.metric_values).unwrap_or_default()));
            }
            line
        })
        .collect();

    let directive_lines: Vec<String> = directives.iter().map(|d| format!("- **{}**: {}", d.id, d.haiku_question)).collect();

    let rec_lines: Vec<String> = recent_recommendations
        .iter()
        .take(5)
        .map(|r| {
            format!(
                "- [{:?}] {}: {} (seen {}x)",
                r.status, r.anomaly_type, r.suggestion, r.evidence_count
            )
        })
        .collect();

    format!(
        r#"You are an audit triage agent. Analyze these anomalies and determine if they need deeper analysis.

## Detected Anomalies
{anomalies}

## Questions to Consider (from observation directives)
{directives}

## Recent Statistics
{stats}

## Existing Recommendations
{recs}

## Instructions
Return ONLY a JSON object:
{{
  "verdict": "known_pattern" | "emerging_pattern" | "milestone",
  "analysis": "brief explanation of what you see",
  "escalate": true | false,
  "recommendations": [
    {{
      "anomaly_type": "the anomaly type",
      "suggestion": "actionable suggestion",
      "category": "setting_tune | prompt_revision | range_adjustment | governance_health | coverage_gap | general"
    }}
  ]
}}

Rules:
- "known_pattern": anomaly matches an existing recommendation or is a known recurring pattern
- "emerging_pattern": anomaly shows a new trend worth investigating
- "milestone": significant event that warrants strategic analysis
- Set escalate=true ONLY for emerging_pattern or milestone
- Keep analysis under 200 words
- Recommendations should be specific and actionable
- If the anomaly is covered by an existing recommendation with high evidence count, say so"#,
        anomalies = if anomaly_lines.is_empty() { "(none)".to_string() } else { anomaly_lines.join("\n") },
        directives = if directive_lines.is_empty() { "(none)".to_string() } else { directive_lines.join("\n") },
        stats = if recent_stats.is_empty() { "(none available)".to_string() } else { serde_json::to_string_pretty(recent_stats).unwrap_or_default() },
        recs = if rec_lines.is_empty() { "(none)".to_string() } else { rec_lines.join("\n") },
    )
}

/// Sonnet's job: substantive analysis. Correlate across data, draft refined
/// recommendations, decide if an Opus deep dive is needed.
pub fn build_sonnet_prompt(
    haiku_triage: &TriageResult,
    anomalies: &[Anomaly],
    directives: &[Directive],
    event_window: &[crate::models::AuditEvent],
    current_settings: &serde_json::Value,
    existing_recommendations: &[Recommendation],
) -> String {
    let mut directive_lines = Vec::new();
    for d in directives {
        directive_lines.push(format!("- **{}**: {}", d.id, d.sonnet_question));
        directive_lines.push(format!("  Opus trigger: {}", if d.opus_trigger.is_empty() { "none" } else { &d.opus_trigger }));
    }

    format!(
        r#"You are a governance and quality analysis agent. Perform substantive analysis of these audit findings.

## Haiku Triage Result
- Verdict: {verdict}
- Analysis: {haiku_analysis}
- Preliminary recommendations: {haiku_recs}

## Anomaly Details
{anomalies}

## Analysis Questions (from observation directives)
{directives}

## Recent Event Activity
{event_summary}

## Current Settings
{settings}

## Existing Recommendations
{existing}

## Instructions
Return ONLY a JSON object:
{{
  "analysis": "detailed analysis (500 words max)",
  "recommendations": [
    {{
      "anomaly_type": "the anomaly type this addresses",
      "suggestion": "specific, actionable recommendation",
      "category": "setting_tune" | "prompt_revision" | "range_adjustment" | "governance_health" | "coverage_gap",
      "evidence": "what data supports this recommendation",
      "confidence": "high" | "medium" | "low"
    }}
  ],
  "escalate_to_opus": true | false,
  "opus_context": "if escalating, describe the specific strategic question for Opus"
}}

Rules:
- Correlate anomalies with settings values and event patterns
- For setting recommendations, specify the current value AND the recommended value
- For prompt recommendations, identify the specific prompt and suggest wording changes
- Set escalate_to_opus=true ONLY if you see a significant milestone or systemic issue
- Check the Opus trigger conditions from each directive to decide escalation
- If superseding an existing recommendation, note which one
- Be constructive: focus on what would improve outcomes, not what is wrong"#,
        verdict = if haiku_triage.verdict.is_empty() { "unknown" } else { &haiku_triage.verdict },
        haiku_analysis = if haiku_triage.analysis.is_empty() { "none" } else { &haiku_triage.analysis },
        haiku_recs = serde_json::to_string_pretty(&haiku_triage.recommendations).unwrap_or_default(),
        anomalies = serde_json::to_string_pretty(anomalies).unwrap_or_default(),
        directives = directive_lines.join("\n"),
        event_summary = summarize_events(event_window, 30),
        settings = if current_settings.is_null() { "(not available)".to_string() } else { serde_json::to_string_pretty(current_settings).unwrap_or_default() },
        existing = if existing_recommendations.is_empty() { "(none)".to_string() } else { serde_json::to_string_pretty(existing_recommendations).unwrap_or_default() },
    )
}

/// Opus's job: strategic analysis. Root causes, systemic recommendations,
/// setting-range changes, prompt-effectiveness evaluation. The prompt is
/// constructed with Sonnet's analysis already folded in.
#[allow(clippy::too_many_arguments)]
pub fn build_opus_prompt(
    sonnet_analysis: &AnalysisResult,
    anomalies: &[Anomaly],
    directives: &[Directive],
    event_window: &[crate::models::AuditEvent],
    current_settings: &serde_json::Value,
    existing_recommendations: &[Recommendation],
    session_summaries: &[SessionSummary],
) -> String {
    let directive_lines: Vec<String> =
        directives.iter().map(|d| format!("- **{}**: {}", d.id, if d.opus_trigger.is_empty() { "none" } else { &d.opus_trigger })).collect();

    let session_lines: Vec<String> = session_summaries
        .iter()
        .take(10)
        .map(|s| {
            format!(
                "- {}: {} events, {} approved, {} blocked, {} tasks",
                s.session_id.chars().take(8).collect::<String>(),
                s.total_events,
                s.approval_count,
                s.block_count,
                s.task_count
            )
        })
        .collect();

    format!(
        r#"You are a strategic audit analyst performing a deep dive into system behavior patterns.

## Sonnet's Analysis
{sonnet_analysis}

## Strategic Question
{strategic_question}

## Anomaly Details
{anomalies}

## Directive Trigger Conditions (why this deep dive was triggered)
{triggers}

## Recent Event Activity
{event_summary}

## Current Settings (with ranges where applicable)
{settings}

## Session Summaries (recent)
{sessions}

## Existing Recommendations
{existing}

## Instructions
Return ONLY a JSON object:
{{
  "deep_analysis": "comprehensive strategic analysis (1000 words max)",
  "root_causes": [
    {{
      "description": "root cause description",
      "evidence": "supporting evidence from the data",
      "impact": "how this affects system outcomes"
    }}
  ],
  "recommendations": [
    {{
      "anomaly_type": "the anomaly type or 'systemic'",
      "suggestion": "specific recommendation",
      "category": "setting_tune" | "prompt_revision" | "range_adjustment" | "governance_health" | "coverage_gap",
      "evidence": "data supporting this recommendation",
      "priority": "high" | "medium" | "low",
      "scope": "which settings/prompts/components are affected"
    }}
  ],
  "setting_range_changes": [
    {{
      "setting": "setting path (e.g., thresholds.governance_block_rate)",
      "current_range": "current min-max",
      "recommended_range": "new min-max",
      "rationale": "why this range should change"
    }}
  ],
  "prompt_assessments": [
    {{
      "prompt_id": "which prompt (e.g., context-reinforcement, agent-definition)",
      "effectiveness": "high" | "medium" | "low",
      "issue": "what is not working",
      "suggestion": "specific wording or approach change"
    }}
  ]
}}

Rules:
- Focus on root causes, not symptoms
- For setting changes, specify exact values with evidence
- For range changes, explain why the current range is insufficient
- For prompt assessments, reference specific observed outcomes
- Prioritize recommendations by potential impact
- Be constructive: acknowledge what is working well
- Consider cross-setting interactions and systemic effects"#,
        sonnet_analysis = serde_json::to_string_pretty(sonnet_analysis).unwrap_or_default(),
        strategic_question = sonnet_analysis
            .opus_context
            .clone()
            .unwrap_or_else(|| "Perform a comprehensive analysis of the anomaly patterns.".to_string()),
        anomalies = serde_json::to_string_pretty(anomalies).unwrap_or_default(),
        triggers = directive_lines.join("\n"),
        event_summary = summarize_events(event_window, 30),
        settings = if current_settings.is_null() { "(not available)".to_string() } else { serde_json::to_string_pretty(current_settings).unwrap_or_default() },
        sessions = if session_lines.is_empty() { "(none)".to_string() } else { session_lines.join("\n") },
        existing = if existing_recommendations.is_empty() { "(none)".to_string() } else { serde_json::to_string_pretty(existing_recommendations).unwrap_or_default() },
    )
}

fn summarize_events(events: &[crate::models::AuditEvent], max_lines: usize) -> String {
    if events.is_empty() {
        return "(no events)".to_string();
    }

    let mut by_type: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for e in events {
        *by_type.entry(e.event_type.as_str()).or_insert(0) += 1;
    }
    let mut counts: Vec<(&str, usize)> = by_type.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let mut lines = vec![format!("Total: {} events", events.len())];
    let total_types = counts.len();
    for (i, (etype, count)) in counts.iter().enumerate() {
        if i >= max_lines {
            lines.push(format!("  ... and {} more types", total_types - max_lines));
            break;
        }
        lines.push(format!("  {etype}: {count}"));
    }

    lines.push(String::new());
    lines.push("Recent events (last 5):".to_string());
    for e in events.iter().rev().take(5).collect::<Vec<_>>().into_iter().rev() {
        let mut data_str = e.data.to_string();
        if data_str.len() > 200 {
            data_str.truncate(200);
            data_str.push_str("...");
        }
        let sid: String = e.session_id.as_deref().unwrap_or("?").chars().take(8).collect();
        lines.push(format!("  [{}] {} session={sid} data={data_str}", e.event_type, e.ts_iso));
    }

    lines.join("\n")
}

/// Loads observation directives from a `directives.json` file. Missing or
/// corrupt files yield an empty list rather than an error.
pub fn load_directives(path: &Path) -> Vec<Directive> {
    #[derive(serde::Deserialize)]
    struct DirectivesFile {
        #[serde(default)]
        directives: Vec<Directive>,
    }

    match std::fs::read_to_string(path) {
        Ok(body) => serde_json::from_str::<DirectivesFile>(&body).map(|d| d.directives).unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

/// Finds directives relevant to the given anomalies, by matching anomaly
/// types against each directive's `watches` patterns (`"*"` matches
/// everything, a trailing `*` matches by prefix, otherwise exact match).
pub fn match_directives(anomalies: &[Anomaly], directives: &[Directive]) -> Vec<Directive> {
    if directives.is_empty() {
        return Vec::new();
    }

    let anomaly_types: std::collections::HashSet<&str> = anomalies.iter().map(|a| a.anomaly_type.as_str()).collect();
    directives
        .iter()
        .filter(|d| {
            d.watches.iter().any(|watch| {
                if watch == "*" {
                    true
                } else if let Some(prefix) = watch.strip_suffix('*') {
                    anomaly_types.iter().any(|t| t.starts_with(prefix))
                } else {
                    anomaly_types.contains(watch.as_str())
                }
            })
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnomalySeverity;

    fn anomaly(anomaly_type: &str) -> Anomaly {
        Anomaly {
            id: "a1".into(),
            anomaly_type: anomaly_type.into(),
            severity: AnomalySeverity::Warning,
            description: "desc".into(),
            metric_values: Default::default(),
            context: serde_json::Value::Null,
        }
    }

    #[test]
    fn match_directives_handles_wildcard_prefix() {
        let directives = vec![Directive {
            id: "gov-health".into(),
            watches: vec!["governance.*".into()],
            haiku_question: "q".into(),
            sonnet_question: "q".into(),
            opus_trigger: "t".into(),
        }];
        let anomalies = vec![anomaly("governance.block_rate")];
        let matched = match_directives(&anomalies, &directives);
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn haiku_prompt_includes_all_anomalies() {
        let anomalies = vec![anomaly("high_skip_rate")];
        let prompt = build_haiku_prompt(&anomalies, &[], &Default::default(), &[]);
        assert!(prompt.contains("high_skip_rate"));
        assert!(prompt.contains("escalate"));
    }

    #[test]
    fn load_directives_missing_file_yields_empty() {
        let directives = load_directives(Path::new("/nonexistent/directives.json"));
        assert!(directives.is_empty());
    }
}
