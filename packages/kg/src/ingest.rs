//! Folder-level markdown ingestion: one entity per `*.md` file.

use std::fs;
use std::path::Path;

use crate::models::{Entity, EntityType};

const SECTION_HEADINGS: &[&str] = &[
    "Type",
    "Statement",
    "Description",
    "Rationale",
    "Usage",
    "Examples",
    "Dependencies",
    "Intent",
    "Metrics",
    "Vision Alignment",
];

const TITLE_PREFIXES: &[&str] = &[
    "Vision Standard:",
    "Architectural Standard:",
    "Pattern:",
    "Component:",
];

/// A single ingested document, ready to become an [`Entity`].
pub struct ParsedDocument {
    pub name: String,
    pub entity_type: EntityType,
    pub observations: Vec<String>,
}

impl ParsedDocument {
    pub fn into_entity(self) -> Entity {
        Entity::new(self.name, self.entity_type).with_observations(self.observations)
    }
}

pub struct ScanResult {
    pub documents: Vec<ParsedDocument>,
    pub errors: Vec<String>,
}

pub struct IngestReport {
    pub created: Vec<String>,
    pub errors: Vec<String>,
}

/// Walk `folder` for `*.md` files (excluding `README.md`) and parse each one.
/// Parse failures are collected into the error list; successful documents
/// are still returned.
pub fn scan_folder(folder: &Path) -> ScanResult {
    let mut documents = Vec::new();
    let mut errors = Vec::new();

    let entries = match fs::read_dir(folder) {
        Ok(e) => e,
        Err(e) => {
            errors.push(format!("{}: {e}", folder.display()));
            return ScanResult { documents, errors };
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.eq_ignore_ascii_case("README.md"))
            .unwrap_or(false)
        {
            continue;
        }

        match fs::read_to_string(&path) {
            Ok(text) => match parse_document(&text) {
                Some(doc) => documents.push(doc),
                None => errors.push(format!("{}: no H1 title found", path.display())),
            },
            Err(e) => errors.push(format!("{}: {e}", path.display())),
        }
    }

    ScanResult { documents, errors }
}

fn parse_document(text: &str) -> Option<ParsedDocument> {
    let stripped = strip_fenced_code(text);
    let title = first_h1(&stripped)?;
    let name = slugify(&strip_title_prefix(&title));

    let sections = extract_sections(&stripped);

    let type_section = sections.get("Type").cloned();
    let tier = infer_tier(&title, type_section.as_deref(), &stripped);
    let entity_type = infer_entity_type(tier, type_section.as_deref(), &stripped);

    let mut observations = vec![format!("title: {title}"), format!("protection_tier: {}", tier)];

    for heading in SECTION_HEADINGS {
        if let Some(body) = sections.get(*heading) {
            let key = heading.to_lowercase().replace(' ', "_");
            observations.push(format!("{key}: {body}"));
        }
    }

    Some(ParsedDocument {
        name,
        entity_type,
        observations,
    })
}

fn strip_title_prefix(title: &str) -> String {
    for prefix in TITLE_PREFIXES {
        if let Some(rest) = title.strip_prefix(prefix) {
            return rest.trim().to_string();
        }
    }
    title.to_string()
}

fn slugify(title: &str) -> String {
    let mut out = String::new();
    let mut prev_was_sep = false;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            prev_was_sep = false;
        } else if !prev_was_sep && !out.is_empty() {
            out.push('_');
            prev_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn first_h1(text: &str) -> Option<String> {
    text.lines().find_map(|l| {
        let trimmed = l.trim_start();
        trimmed.strip_prefix("# ").map(|t| t.trim().to_string())
    })
}

/// Fenced ```...``` blocks are removed before section extraction and
/// whitespace collapse, so code samples never pollute the observation text.
fn strip_fenced_code(text: &str) -> String {
    let mut out = String::new();
    let mut in_fence = false;
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Extract the body text under each `## <Heading>` section up to the next
/// `#`-prefixed line, with internal whitespace collapsed to single spaces.
fn extract_sections(text: &str) -> std::collections::HashMap<String, String> {
    let mut sections = std::collections::HashMap::new();
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim_start();
        if let Some(heading) = line.strip_prefix("## ").map(|s| s.trim()) {
            let matched = SECTION_HEADINGS
                .iter()
                .find(|h| h.eq_ignore_ascii_case(heading));
            if let Some(canonical) = matched {
                let mut body_lines = Vec::new();
                let mut j = i + 1;
                while j < lines.len() && !lines[j].trim_start().starts_with('#') {
                    body_lines.push(lines[j].trim());
                    j += 1;
                }
                let body = body_lines
                    .join(" ")
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
                if !body.is_empty() {
                    sections.insert(canonical.to_string(), body);
                }
                i = j;
                continue;
            }
        }
        i += 1;
    }
    sections
}

fn infer_tier(title: &str, type_section: Option<&str>, full_text: &str) -> &'static str {
    if title.starts_with("Vision Standard:") {
        return "vision";
    }
    let haystack = type_section.unwrap_or(full_text).to_lowercase();
    if haystack.contains("architectur") || haystack.contains("pattern") {
        return "architecture";
    }
    "quality"
}

fn infer_entity_type(tier: &str, type_section: Option<&str>, full_text: &str) -> EntityType {
    if tier == "vision" {
        return EntityType::VisionStandard;
    }
    let haystack = type_section.unwrap_or(full_text).to_lowercase();
    if haystack.contains("pattern") {
        EntityType::Pattern
    } else if haystack.contains("architectur") {
        EntityType::ArchitecturalStandard
    } else {
        EntityType::Component
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_title_and_sections() {
        let md = "# Component: Checkout Service\n\n## Type\nComponent\n\n## Description\nHandles\ncheckout flow.\n\n```rust\nfn x() {}\n```\n";
        let doc = parse_document(md).unwrap();
        assert_eq!(doc.name, "checkout_service");
        assert!(doc
            .observations
            .iter()
            .any(|o| o == "description: Handles checkout flow."));
        assert!(doc.observations.iter().any(|o| o.starts_with("protection_tier:")));
    }

    #[test]
    fn vision_standard_prefix_sets_vision_tier() {
        let md = "# Vision Standard: Reliability First\n\n## Statement\nUptime matters.\n";
        let doc = parse_document(md).unwrap();
        assert_eq!(doc.name, "reliability_first");
        assert!(doc
            .observations
            .iter()
            .any(|o| o == "protection_tier: vision"));
        assert!(matches!(doc.entity_type, EntityType::VisionStandard));
    }

    #[test]
    fn missing_h1_returns_none() {
        assert!(parse_document("## Type\nComponent\n").is_none());
    }

    #[test]
    fn scan_folder_skips_readme() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "# Ignore Me\n").unwrap();
        std::fs::write(
            dir.path().join("pattern-a.md"),
            "# Pattern: Retry With Backoff\n\n## Type\nPattern\n",
        )
        .unwrap();

        let result = scan_folder(dir.path());
        assert!(result.errors.is_empty());
        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.documents[0].name, "retry_with_backoff");
    }
}
