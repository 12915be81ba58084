//! In-memory inverted index over extracted chunks.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::config::SearchConfig;
use crate::types::{truncate_chars, ChunkType, CodeChunk};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-zA-Z_]\w*\b").expect("Invalid regex"));

const EXACT_KEY_WEIGHT: f32 = 2.0;
const NAME_MATCH_WEIGHT: f32 = 1.5;
const CONTENT_MATCH_WEIGHT: f32 = 1.0;

/// Identifiers too common to be useful search keys.
const STOPWORDS: &[&str] = &[
    "def", "class", "return", "if", "else", "for", "while", "import", "from", "async", "await",
    "function", "const", "let", "var", "export", "default", "this", "self", "true", "false",
    "null", "undefined", "new", "static",
];

#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    pub items: Vec<T>,
    pub total_matches: usize,
    pub query_duration_ms: u64,
}

impl<T> QueryResult<T> {
    pub fn new(items: Vec<T>, total_matches: usize, query_duration_ms: u64) -> Self {
        Self {
            items,
            total_matches,
            query_duration_ms,
        }
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub file_path: String,
    pub name: String,
    pub start_line: usize,
    /// Leading characters of the chunk, with `...` when cut.
    pub content: String,
    /// Normalized relevance in `[0, 1]`.
    pub score: f32,
}

/// Keyword index mapping lowercase tokens to chunk positions.
///
/// Besides content identifiers, every chunk is reachable by its lowercase
/// name, by `type:<chunk_type>` and by `file:<path>`.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    chunks: Vec<CodeChunk>,
    // lowercase (name, content) per chunk, for substring scoring
    lowered: Vec<(String, String)>,
    index: HashMap<String, Vec<usize>>,
    preview_chars: usize,
}

impl SearchIndex {
    pub fn build(chunks: Vec<CodeChunk>) -> Self {
        Self::build_with(chunks, &SearchConfig::default())
    }

    pub fn build_with(chunks: Vec<CodeChunk>, config: &SearchConfig) -> Self {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        let mut lowered = Vec::with_capacity(chunks.len());

        for (position, chunk) in chunks.iter().enumerate() {
            let mut keys: Vec<String> = Vec::new();
            if !chunk.name.is_empty() {
                keys.push(chunk.name.to_lowercase());
            }
            keys.push(format!("type:{}", chunk.chunk_type));
            keys.push(format!("file:{}", chunk.file_path).to_lowercase());
            keys.extend(extract_keywords(&chunk.content, config.max_keywords_per_chunk));
            keys.extend(split_tokens(&chunk.file_path));
            keys.extend(split_tokens(&chunk.name));

            let mut seen = HashSet::new();
            for key in keys {
                if key.is_empty() || !seen.insert(key.clone()) {
                    continue;
                }
                index.entry(key).or_default().push(position);
            }

            lowered.push((chunk.name.to_lowercase(), chunk.content.to_lowercase()));
        }

        Self {
            chunks,
            lowered,
            index,
            preview_chars: config.preview_chars,
        }
    }

    pub fn chunks(&self) -> &[CodeChunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    /// Chunks stored under an exact key.
    pub fn lookup(&self, key: &str) -> Vec<&CodeChunk> {
        self.index
            .get(key)
            .map(|positions| positions.iter().map(|&p| &self.chunks[p]).collect())
            .unwrap_or_default()
    }

    pub fn chunks_of_type(&self, chunk_type: ChunkType) -> Vec<&CodeChunk> {
        self.lookup(&format!("type:{}", chunk_type))
    }

    pub fn chunks_in_file(&self, file_path: &str) -> Vec<&CodeChunk> {
        self.lookup(&format!("file:{}", file_path).to_lowercase())
    }

    /// Top `limit` hits for free text.
    pub fn query(&self, text: &str, limit: usize) -> Vec<SearchHit> {
        self.search(text, limit).items
    }

    /// Scores every chunk against the query terms.
    ///
    /// Each term adds 2.0 for chunks indexed under it, 1.5 when the chunk name
    /// contains it and 1.0 when the content does. Equal totals keep the order
    /// in which chunks first matched.
    pub fn search(&self, text: &str, limit: usize) -> QueryResult<SearchHit> {
        let start = Instant::now();
        let terms = query_terms(text);

        let mut scores = vec![0.0f32; self.chunks.len()];
        let mut first_seen: Vec<usize> = Vec::new();
        let mut bump = |position: usize, weight: f32, scores: &mut Vec<f32>| {
            if scores[position] == 0.0 {
                first_seen.push(position);
            }
            scores[position] += weight;
        };

        for term in &terms {
            if let Some(positions) = self.index.get(term) {
                for &position in positions {
                    bump(position, EXACT_KEY_WEIGHT, &mut scores);
                }
            }
            for (position, (name, content)) in self.lowered.iter().enumerate() {
                if name.contains(term.as_str()) {
                    bump(position, NAME_MATCH_WEIGHT, &mut scores);
                }
                if content.contains(term.as_str()) {
                    bump(position, CONTENT_MATCH_WEIGHT, &mut scores);
                }
            }
        }

        let total_matches = first_seen.len();
        // stable sort keeps first-seen order among equal scores
        first_seen.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));

        let items = first_seen
            .into_iter()
            .take(limit)
            .map(|position| self.hit(position, scores[position]))
            .collect();

        QueryResult::new(items, total_matches, start.elapsed().as_millis() as u64)
    }

    fn hit(&self, position: usize, total: f32) -> SearchHit {
        let chunk = &self.chunks[position];
        let preview = truncate_chars(&chunk.content, self.preview_chars);
        let content = if preview.len() < chunk.content.len() {
            format!("{}...", preview)
        } else {
            chunk.content.clone()
        };

        SearchHit {
            chunk_id: chunk.chunk_id.clone(),
            file_path: chunk.file_path.clone(),
            name: chunk.name.clone(),
            start_line: chunk.start_line,
            content,
            score: (total / 10.0).min(1.0),
        }
    }
}

/// Distinct identifiers longer than two characters, in first-occurrence order.
fn extract_keywords(content: &str, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    IDENTIFIER
        .find_iter(content)
        .map(|m| m.as_str())
        .filter(|word| word.len() > 2 && !STOPWORDS.contains(word))
        .map(str::to_lowercase)
        .filter(|word| seen.insert(word.clone()))
        .take(limit)
        .collect()
}

/// Lowercase alphanumeric runs of `text`.
fn split_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

fn query_terms(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut terms: Vec<String> = Vec::new();
    for token in lowered.split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit())) {
        if token.len() > 1 && !terms.iter().any(|t| t == token) {
            terms.push(token.to_string());
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(path: &str, chunk_type: ChunkType, name: &str, start: usize, content: &str) -> CodeChunk {
        CodeChunk::new(path, chunk_type, name, start, start + 5, "python").with_content(content.to_string())
    }

    fn sample_index() -> SearchIndex {
        SearchIndex::build(vec![
            chunk(
                "src/session.py",
                ChunkType::Function,
                "refresh_session",
                1,
                "def refresh_session(auth_token):\n    return auth_token",
            ),
            chunk(
                "src/users.py",
                ChunkType::Function,
                "authenticate_user",
                10,
                "def authenticate_user(name, password):\n    return check(name, password)",
            ),
            chunk("src/models.py", ChunkType::Class, "UserModel", 1, "class UserModel:\n    pass"),
        ])
    }

    #[test]
    fn test_name_match_outranks_content_match() {
        let index = sample_index();
        let hits = index.query("auth", 5);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "authenticate_user");
        assert_eq!(hits[1].name, "refresh_session");
        assert!(hits[0].score > hits[1].score);
        assert!(hits.iter().all(|h| h.score <= 1.0));
    }

    #[test]
    fn test_structural_keys() {
        let index = sample_index();
        assert_eq!(index.chunks_of_type(ChunkType::Class).len(), 1);
        assert_eq!(index.chunks_of_type(ChunkType::Function).len(), 2);
        assert_eq!(index.chunks_in_file("src/users.py")[0].name, "authenticate_user");
        assert_eq!(index.lookup("authenticate_user").len(), 1);
        assert_eq!(index.lookup("session").len(), 1);
    }

    #[test]
    fn test_chunk_indexed_once_per_key() {
        let index = SearchIndex::build(vec![chunk(
            "user/user.py",
            ChunkType::Function,
            "user",
            1,
            "user = user_name + user",
        )]);
        assert_eq!(index.lookup("user").len(), 1);
    }

    #[test]
    fn test_stopwords_and_short_words_are_not_keys() {
        let index = sample_index();
        assert!(index.lookup("def").is_empty());
        assert!(index.lookup("return").is_empty());
        assert_eq!(index.lookup("password").len(), 1);
    }

    #[test]
    fn test_keyword_limit_keeps_first_occurrences() {
        let content: String = (0..30).map(|i| format!("ident{} ", i)).collect();
        let keywords = extract_keywords(&content, 20);
        assert_eq!(keywords.len(), 20);
        assert_eq!(keywords[0], "ident0");
        assert_eq!(keywords[19], "ident19");
    }

    #[test]
    fn test_empty_and_unmatched_queries() {
        let index = sample_index();
        assert!(index.query("", 10).is_empty());
        assert!(index.query("a", 10).is_empty());
        assert!(index.query("zzzz", 10).is_empty());
    }

    #[test]
    fn test_limit_and_total_matches() {
        let index = sample_index();
        let result = index.search("user", 1);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.total_matches, 2);
        assert_eq!(result.items[0].name, "authenticate_user");
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let index = SearchIndex::build(vec![
            chunk("a.py", ChunkType::Function, "one", 1, "widget"),
            chunk("b.py", ChunkType::Function, "two", 1, "widget"),
        ]);
        let hits = index.query("widget", 10);
        assert_eq!(hits[0].file_path, "a.py");
        assert_eq!(hits[1].file_path, "b.py");
    }

    #[test]
    fn test_preview_is_truncated() {
        let long = "x".repeat(500);
        let index = SearchIndex::build(vec![chunk("a.py", ChunkType::File, "a.py", 1, &long)]);
        let hits = index.query("a.py", 1);
        assert_eq!(hits[0].content.len(), 203);
        assert!(hits[0].content.ends_with("..."));
    }
}
