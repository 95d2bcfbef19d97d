//! Heuristic entity extraction from user queries
//!
//! Not NLP: lowercase, strip `?` and `.`, split on whitespace, drop stopwords
//! and short tokens, capitalize what's left. Good enough to find graph
//! entities by substring.

/// Words that never name an entity
pub const STOPWORDS: &[&str] = &[
    "what", "who", "where", "when", "why", "how", "is", "are", "the", "a", "an", "of", "in", "on",
    "at", "to", "for", "tell", "me", "about", "can", "you", "please", "do", "does",
];

/// Tokens with this many characters or fewer are dropped
const MAX_SHORT_TOKEN_CHARS: usize = 2;

/// Stateless query scanner
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityExtractor;

impl EntityExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Candidate entity names in first-occurrence order, duplicates kept
    pub fn extract(&self, query: &str) -> Vec<String> {
        let cleaned: String = query
            .to_lowercase()
            .chars()
            .filter(|c| *c != '?' && *c != '.')
            .collect();

        cleaned
            .split_whitespace()
            .filter(|token| !STOPWORDS.contains(token))
            .filter(|token| token.chars().count() > MAX_SHORT_TOKEN_CHARS)
            .map(capitalize)
            .collect()
    }
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
