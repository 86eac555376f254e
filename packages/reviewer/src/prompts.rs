//! Prompt construction for the five review call sites, grounded in
//! `reviewer.py`'s `_build_*_prompt` methods. Every prompt ends with an
//! instruction to respond with ONLY a JSON object of fixed shape.

use warden_governance::{Decision, EvolutionProposal, ReviewVerdict};
use warden_kg::Entity;

use crate::metadata_aware::format_architecture_intent_aware;

const VERDICT_SHAPE: &str = r#"{
  "verdict": "approved" | "blocked" | "needs_human_review",
  "findings": [
    {
      "tier": "vision" | "architecture" | "quality",
      "severity": "critical" | "high" | "medium" | "low" | "info",
      "description": "what was found",
      "suggestion": "how to fix it"
    }
  ],
  "guidance": "brief guidance for the agent",
  "standards_verified": ["list of standards that were checked and passed"],
  "strengths_summary": "optional: what the change does well"
}"#;

/// A task carried into the holistic review prompt.
pub struct GroupTask {
    pub subject: String,
    pub description: String,
}

pub fn decision_prompt(decision: &Decision, vision: &[Entity], architecture: &[Entity]) -> String {
    let standards_text = format_standards(vision);
    let arch_text = format_architecture_intent_aware(architecture);
    let alts_text = decision
        .alternatives_considered
        .iter()
        .map(|a| format!("  - {}: rejected because {}", a.option, a.reason_rejected))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a governance reviewer. Evaluate this decision against the project's vision and architecture standards.\n\n\
## Vision Standards\n{standards_text}\n\n\
## Architecture Patterns\n{arch_text}\n\n\
## Decision to Review\n\
- **Agent**: {agent}\n\
- **Category**: {category}\n\
- **Summary**: {summary}\n\
- **Detail**: {detail}\n\
- **Components affected**: {components}\n\
- **Alternatives considered**:\n{alts}\n\
- **Confidence**: {confidence:?}\n\n\
## Instructions\n\
1. Check if this decision CONFLICTS with any vision standard. If yes, verdict is \"blocked\".\n\
2. Check if this decision deviates from established architecture patterns. If the deviation is unjustified, verdict is \"blocked\".\n\
3. If the decision is a \"deviation\" or \"scope_change\" category, verdict should be \"needs_human_review\".\n\
4. If the decision aligns with standards, verdict is \"approved\".\n\n\
Respond with ONLY a JSON object (no markdown, no explanation outside the JSON):\n{VERDICT_SHAPE}",
        agent = decision.agent,
        category = decision.category.as_str(),
        summary = decision.summary,
        detail = decision.detail,
        components = decision.components_affected.join(", "),
        alts = if alts_text.is_empty() { "  (none provided)".to_string() } else { alts_text },
        confidence = decision.confidence,
    )
}

pub fn plan_prompt(
    plan_summary: &str,
    plan_content: &str,
    decisions: &[Decision],
    reviews: &[ReviewVerdict],
    vision: &[Entity],
    architecture: &[Entity],
) -> String {
    let standards_text = format_standards(vision);
    let arch_text = format_architecture_intent_aware(architecture);
    let decisions_text = format_decisions(decisions);
    let reviews_text = format_reviews(reviews);

    format!(
        "You are a governance reviewer. Evaluate this complete plan against vision and architecture standards.\n\n\
## Vision Standards\n{standards_text}\n\n\
## Architecture Patterns\n{arch_text}\n\n\
## Prior Decisions for This Task\n{decisions_text}\n\n\
## Prior Reviews\n{reviews_text}\n\n\
## Plan to Review\n**Summary**: {plan_summary}\n\n**Full Plan**:\n{plan_content}\n\n\
## Instructions\n\
1. Verify the plan aligns with ALL applicable vision standards.\n\
2. Verify the plan follows established architecture patterns.\n\
3. Check that prior decision reviews have been respected (no blocked decisions reimplemented).\n\
4. Identify any gaps, risks, or concerns.\n\n\
Respond with ONLY a JSON object:\n{VERDICT_SHAPE}"
    )
}

pub fn completion_prompt(
    summary_of_work: &str,
    files_changed: &[String],
    decisions: &[Decision],
    reviews: &[ReviewVerdict],
    vision: &[Entity],
) -> String {
    let standards_text = format_standards(vision);
    let decisions_text = format_decisions(decisions);
    let reviews_text = format_reviews(reviews);

    format!(
        "You are a governance reviewer. Evaluate this completed work.\n\n\
## Vision Standards\n{standards_text}\n\n\
## Decisions Made During This Task\n{decisions_text}\n\n\
## Review Verdicts\n{reviews_text}\n\n\
## Completed Work\n**Summary**: {summary_of_work}\n**Files changed**: {files}\n\n\
## Instructions\n\
1. Check that all decisions were reviewed (no unreviewed decisions).\n\
2. Check that no blocked decisions were implemented anyway.\n\
3. Verify the completed work aligns with vision standards.\n\n\
Respond with ONLY a JSON object:\n{VERDICT_SHAPE}",
        files = files_changed.join(", "),
    )
}

pub fn group_review_prompt(
    tasks: &[GroupTask],
    transcript_excerpt: &str,
    vision: &[Entity],
    architecture: &[Entity],
) -> String {
    let standards_text = format_standards(vision);
    let arch_text = format_architecture_intent_aware(architecture);
    let tasks_text = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let desc: String = t.description.chars().take(200).collect();
            format!("  {}. **{}**: {}", i + 1, t.subject, desc)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a governance reviewer performing a HOLISTIC review. You are evaluating multiple tasks as a GROUP, not individually.\n\n\
## Why This Review Matters\n\n\
Individual tasks may each look reasonable in isolation. But together, they may represent:\n\
- An unauthorized architectural shift (e.g., five tasks that collectively build an ORM layer)\n\
- Scope creep beyond the original intent\n\
- A pattern that conflicts with vision standards when viewed collectively\n\
- Work that duplicates or contradicts existing architecture\n\n\
Your job is to identify what these tasks COLLECTIVELY represent and whether that collective intent aligns with project standards.\n\n\
## Vision Standards\n{standards_text}\n\n\
## Architecture Patterns\n{arch_text}\n\n\
## Tasks Under Review (as a group)\n{tasks_text}\n\n\
## Agent's Recent Reasoning (from transcript)\n{transcript_excerpt}\n\n\
## Instructions\n\n\
1. **COLLECTIVE INTENT**: In one sentence, what do these tasks collectively aim to accomplish?\n\
2. **Vision Check**: Does the collective intent conflict with any vision standard?\n\
3. **Architecture Check**: Does the collective intent introduce a new architectural pattern not present in the established architecture?\n\
4. **Scope Check**: Are these tasks proportional to what was discussed, or do they represent scope creep?\n\
5. **Cross-Task Analysis**: Are any tasks that look fine individually problematic when considered with their siblings?\n\n\
Respond with ONLY a JSON object (no markdown, no explanation outside the JSON):\n{VERDICT_SHAPE}"
    )
}

pub fn evolution_proposal_prompt(
    proposal: &EvolutionProposal,
    entity_meta: Option<&Entity>,
    vision: &[Entity],
) -> String {
    let standards_text = format_standards(vision);
    let evidence_text = proposal
        .evidence
        .iter()
        .map(|e| format!("  - [{:?}] {}: {}", e.evidence_type, e.source, e.summary))
        .collect::<Vec<_>>()
        .join("\n");
    let current_intent = entity_meta
        .map(|e| e.observations.join("; "))
        .unwrap_or_else(|| "(entity not found in KG)".to_string());

    format!(
        "You are a governance reviewer evaluating a proposed architectural EVOLUTION.\n\n\
## Vision Standards\n{standards_text}\n\n\
## Target Entity Current State\n{current_intent}\n\n\
## Proposal\n\
- **Target**: {target}\n\
- **Original intent**: {original}\n\
- **Proposed change**: {change}\n\
- **Rationale**: {rationale}\n\
- **Validation criteria**: {criteria}\n\
- **Evidence**:\n{evidence}\n\n\
## Instructions\n\
1. Verify the proposed change does not conflict with any vision standard.\n\
2. Verify the evidence substantiates the claimed improvement — reject vague or fabricated-looking evidence.\n\
3. If validation criteria are unmet by the evidence, verdict should be \"needs_human_review\".\n\n\
Respond with ONLY a JSON object:\n{VERDICT_SHAPE}",
        target = proposal.target_entity,
        original = proposal.original_intent,
        change = proposal.proposed_change,
        rationale = proposal.rationale,
        criteria = proposal.validation_criteria.join(", "),
        evidence = if evidence_text.is_empty() { "  (none provided)".to_string() } else { evidence_text },
    )
}

fn format_standards(standards: &[Entity]) -> String {
    if standards.is_empty() {
        return "(no vision standards found in KG)".to_string();
    }
    standards
        .iter()
        .map(|s| format!("- **{}**: {}", s.name, s.observations.join("; ")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_decisions(decisions: &[Decision]) -> String {
    if decisions.is_empty() {
        return "(none)".to_string();
    }
    decisions
        .iter()
        .map(|d| format!("  - [{}] {} (confidence: {:?})", d.category.as_str(), d.summary, d.confidence))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_reviews(reviews: &[ReviewVerdict]) -> String {
    if reviews.is_empty() {
        return "(none)".to_string();
    }
    reviews
        .iter()
        .map(|r| {
            let guidance: String = r.guidance.chars().take(100).collect();
            let decision_id = r.decision_id.as_deref().unwrap_or("?");
            format!("  - Decision {decision_id}: {} — {guidance}", r.verdict.as_str())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
