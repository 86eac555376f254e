//! Transcript excerpting for the group-review prompt. Grounded in
//! `_holistic-settle-check.py`'s `_extract_transcript_context`.

use std::path::Path;

const MAX_LINES: usize = 50;
const MAX_EXCERPTS: usize = 5;
const EXCERPT_CHARS: usize = 500;

/// Pulls the agent's most recent reasoning out of a transcript JSONL file:
/// the last [`MAX_LINES`] lines, assistant-role text blocks only, truncated
/// to [`EXCERPT_CHARS`] and capped at the last [`MAX_EXCERPTS`].
pub async fn extract_transcript_context(transcript_path: Option<&str>) -> String {
    let Some(path) = transcript_path else {
        return "(transcript not available)".to_string();
    };
    if path.is_empty() || !Path::new(path).exists() {
        return "(transcript not available)".to_string();
    }

    let body = match tokio::fs::read_to_string(path).await {
        Ok(b) => b,
        Err(_) => return "(could not read transcript)".to_string(),
    };

    let lines: Vec<&str> = body.lines().collect();
    let recent = if lines.len() > MAX_LINES { &lines[lines.len() - MAX_LINES..] } else { &lines[..] };

    let mut excerpts = Vec::new();
    for line in recent {
        let Ok(entry) = serde_json::from_str::<serde_json::Value>(line) else { continue };
        if entry.get("role").and_then(|r| r.as_str()) != Some("assistant") {
            continue;
        }
        match entry.get("content") {
            Some(serde_json::Value::Array(blocks)) => {
                for block in blocks {
                    if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                        if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                            excerpts.push(truncate(text));
                        }
                    }
                }
            }
            Some(serde_json::Value::String(text)) => excerpts.push(truncate(text)),
            _ => {}
        }
    }

    let tail_start = excerpts.len().saturating_sub(MAX_EXCERPTS);
    excerpts[tail_start..].join("\n---\n")
}

fn truncate(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_path_yields_placeholder() {
        let ctx = extract_transcript_context(None).await;
        assert_eq!(ctx, "(transcript not available)");
    }

    #[tokio::test]
    async fn nonexistent_file_yields_placeholder() {
        let ctx = extract_transcript_context(Some("/nonexistent/transcript.jsonl")).await;
        assert_eq!(ctx, "(transcript not available)");
    }

    #[tokio::test]
    async fn extracts_assistant_text_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.jsonl");
        let body = concat!(
            r#"{"role": "user", "content": "do the thing"}"#, "\n",
            r#"{"role": "assistant", "content": [{"type": "text", "text": "I will do the thing"}]}"#, "\n",
        );
        tokio::fs::write(&path, body).await.unwrap();

        let ctx = extract_transcript_context(Some(path.to_str().unwrap())).await;
        assert_eq!(ctx, "I will do the thing");
    }

    #[tokio::test]
    async fn keeps_only_last_five_excerpts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.jsonl");
        let mut body = String::new();
        for i in 0..8 {
            body.push_str(&format!(
                r#"{{"role": "assistant", "content": [{{"type": "text", "text": "excerpt {i}"}}]}}"#
            ));
            body.push('\n');
        }
        tokio::fs::write(&path, body).await.unwrap();

        let ctx = extract_transcript_context(Some(path.to_str().unwrap())).await;
        assert!(!ctx.contains("excerpt 0"));
        assert!(ctx.contains("excerpt 7"));
        assert_eq!(ctx.matches("---").count(), 4);
    }
}
