//! Keyword tokenization, Jaccard matching, and router-file loading. Grounded
//! in `context-reinforcement.py`'s `tokenize`/`jaccard`/`find_best_match`
//! (the stopword list and tokenizer regex are shared verbatim with
//! `generate-context-router.py` so a route's keywords and a tool input's
//! keywords are produced the same way).

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Route, Router};

static WORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-zA-Z][a-zA-Z0-9]*").unwrap());

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "from", "is", "are",
        "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will", "would", "could",
        "should", "may", "might", "shall", "can", "need", "must", "it", "its", "this", "that", "these", "those",
        "not", "no", "nor", "so", "if", "then", "than", "when", "where", "how", "what", "which", "who", "whom",
        "all", "each", "every", "both", "few", "more", "most", "other", "some", "such", "only", "own", "same",
        "too", "very", "just", "about", "above", "after", "again", "also", "any", "as", "because", "before",
        "between", "during", "into", "over", "through", "under", "until", "up", "while", "use", "used", "using",
    ]
    .into_iter()
    .collect()
});

/// Lowercase alphanumeric words longer than two characters, minus stopwords.
pub fn tokenize(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    WORD_PATTERN
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(w.as_str()))
        .collect()
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Finds the highest-scoring route at or above `threshold`. Ties keep the
/// first route encountered, matching the original's strict `>` comparison
/// against the running best.
pub fn find_best_match<'a>(routes: &'a [Route], input_keywords: &HashSet<String>, threshold: f64) -> Option<(&'a Route, f64)> {
    let mut best: Option<(&Route, f64)> = None;
    for route in routes {
        let route_keywords: HashSet<String> = route.keywords.iter().cloned().collect();
        let score = jaccard(input_keywords, &route_keywords);
        if score >= threshold {
            match &best {
                Some((_, best_score)) if score <= *best_score => {}
                _ => best = Some((route, score)),
            }
        }
    }
    best
}

/// Loads `context-router.json`; returns an empty route list if the file is
/// missing or unparsable. Consumers must tolerate a stale or absent router.
pub fn load_router(path: &Path) -> Vec<Route> {
    match std::fs::read_to_string(path) {
        Ok(body) => serde_json::from_str::<Router>(&body).map(|r| r.routes).unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

/// Pulls the searchable text out of a tool-call input the way
/// `extract_tool_input_text` does: a fixed set of string-valued fields,
/// joined with spaces.
pub fn extract_tool_input_text(tool_input: &serde_json::Value) -> String {
    if let Some(s) = tool_input.as_str() {
        return s.to_string();
    }
    const FIELDS: &[&str] = &["file_path", "content", "old_string", "new_string", "command", "prompt", "description", "pattern"];
    FIELDS
        .iter()
        .filter_map(|key| tool_input.get(key).and_then(|v| v.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_strips_stopwords_and_short_words() {
        let tokens = tokenize("The quick brown fox is running to the store");
        assert!(tokens.contains("quick"));
        assert!(tokens.contains("brown"));
        assert!(tokens.contains("running"));
        assert!(tokens.contains("store"));
        assert!(!tokens.contains("the"));
        assert!(!tokens.contains("is"));
        assert!(!tokens.contains("to"));
        assert!(tokens.contains("fox"));
    }

    #[test]
    fn jaccard_empty_sets_yield_zero() {
        let empty = HashSet::new();
        let other: HashSet<String> = ["a".to_string()].into_iter().collect();
        assert_eq!(jaccard(&empty, &other), 0.0);
    }

    #[test]
    fn find_best_match_picks_highest_scoring_route_above_threshold() {
        let routes = vec![
            Route { id: "low".into(), keywords: vec!["auth".into()], context: "c1".into(), tier: "architecture".into(), source: "kg:a".into(), scope: vec![] },
            Route {
                id: "high".into(),
                keywords: vec!["auth".into(), "token".into(), "session".into()],
                context: "c2".into(),
                tier: "architecture".into(),
                source: "kg:b".into(),
                scope: vec![],
            },
        ];
        let input: HashSet<String> = ["auth".into(), "token".into(), "session".into()].into_iter().collect();
        let (best, score) = find_best_match(&routes, &input, 0.15).unwrap();
        assert_eq!(best.id, "high");
        assert!(score > 0.5);
    }

    #[test]
    fn find_best_match_returns_none_below_threshold() {
        let routes = vec![Route { id: "r".into(), keywords: vec!["unrelated".into()], context: "c".into(), tier: "rule".into(), source: "rule:r".into(), scope: vec![] }];
        let input: HashSet<String> = ["auth".into()].into_iter().collect();
        assert!(find_best_match(&routes, &input, 0.15).is_none());
    }
}
