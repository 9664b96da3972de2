//! Chunk ranking.
//!
//! Defines the [`Ranker`] trait and the keyword ranker, the deterministic
//! scoring regime that always runs. The hybrid ranker
//! ([`crate::ranker_hybrid`]) composes it with embedding similarity and
//! file importance.
//!
//! Keyword scoring matches stemmed query tokens against a chunk's content,
//! relative path, and construct name, with the name weighted highest — a
//! chunk literally named `login` beats one that merely mentions it. Terms
//! the user marked as important (`.execute`, quoted strings) carry a 5×
//! multiplier.

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::models::{Chunk, ScoredChunk};

/// Multiplier for query terms marked important.
const IMPORTANT_BOOST: f64 = 5.0;

/// Ranks chunks against a query, highest score first.
#[async_trait]
pub trait Ranker: Send + Sync {
    async fn rank(&self, query: &str, chunks: Vec<Chunk>) -> Result<Vec<ScoredChunk>>;
}

/// English stopwords plus words that are generic in code-search queries.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // English
        "a", "an", "the", "is", "are", "was", "were", "be", "been", "being",
        "have", "has", "had", "do", "does", "did", "done", "will", "would",
        "could", "should", "may", "might", "can", "shall", "must", "to",
        "of", "in", "on", "at", "by", "for", "with", "about", "from",
        "into", "through", "over", "under", "between", "out", "up", "down",
        "how", "what", "where", "when", "why", "which", "who", "whom",
        "whose", "this", "that", "these", "those", "it", "its", "itself",
        "i", "me", "my", "we", "our", "you", "your", "they", "them",
        "their", "he", "she", "his", "her", "and", "or", "but", "nor",
        "not", "no", "yes", "if", "then", "else", "so", "as", "than",
        "too", "very", "just", "also", "all", "any", "both", "each",
        "some", "such", "only", "own", "same", "there", "here", "again",
        "once", "while", "because", "until", "against",
        // Generic in code-search queries
        "function", "method", "class", "file", "files", "code", "codebase",
        "implement", "implementation", "implemented", "explain", "show",
        "find", "use", "used", "using", "work", "works", "working",
        "write", "written", "make", "made", "call", "called", "calls",
        "define", "defined", "thing", "things", "way", "place", "part",
        "like", "want", "need", "look", "see", "tell", "give", "please",
    ]
    .into_iter()
    .collect()
});

static IMPORTANT_DOT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.(\w+)").expect("valid regex"));
static IMPORTANT_QUOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"'([^']+)'|"([^"]+)""#).expect("valid regex"));
static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]+").expect("valid regex"));
static CAMEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid regex"));

/// Suffix rewrite rules, applied greedily: the first rule whose suffix
/// matches (without shortening the word below 3 chars) wins.
const STEM_RULES: &[(&str, &str)] = &[
    ("tion", "t"),
    ("sion", "s"),
    ("ies", "y"),
    ("ied", "y"),
    ("ation", ""),
    ("ement", ""),
    ("ment", ""),
    ("ing", ""),
    ("ed", ""),
    ("es", ""),
    ("er", ""),
    ("ly", ""),
    ("e", ""),
    ("s", ""),
];

/// Stem one lowercase word. Words shorter than 4 chars pass through.
pub fn stem(word: &str) -> String {
    if word.len() < 4 {
        return word.to_string();
    }
    for (suffix, replacement) in STEM_RULES {
        if let Some(base) = word.strip_suffix(suffix) {
            let candidate = format!("{}{}", base, replacement);
            if candidate.len() >= 3 {
                return candidate;
            }
        }
    }
    word.to_string()
}

/// Split text into lowercase stemmed tokens: camelCase is broken apart,
/// `_`/`-` act as separators, tokens of length <= 1 are dropped.
fn split_and_stem(text: &str) -> Vec<String> {
    let spaced = CAMEL_RE.replace_all(text, "$1 $2");
    let spaced = spaced.replace(['_', '-'], " ");
    let lowered = spaced.to_lowercase();

    NON_WORD_RE
        .split(&lowered)
        .filter(|t| t.len() > 1)
        .map(stem)
        .collect()
}

/// A prepared query: stemmed tokens plus the subset marked important.
#[derive(Debug)]
struct PreparedQuery {
    tokens: Vec<String>,
    important: HashSet<String>,
}

fn prepare_query(query: &str) -> PreparedQuery {
    // Terms the user singled out: `.method` suffixes and quoted strings.
    let mut important = HashSet::new();
    for caps in IMPORTANT_DOT_RE.captures_iter(query) {
        for token in split_and_stem(&caps[1]) {
            important.insert(token);
        }
    }
    for caps in IMPORTANT_QUOTE_RE.captures_iter(query) {
        let quoted = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or("");
        for token in split_and_stem(quoted) {
            important.insert(token);
        }
    }

    // Stopwords are removed before stemming so "working" and "works" drop
    // as words, not as stems.
    let spaced = CAMEL_RE.replace_all(query, "$1 $2");
    let spaced = spaced.replace(['_', '-'], " ");
    let lowered = spaced.to_lowercase();
    let tokens: Vec<String> = NON_WORD_RE
        .split(&lowered)
        .filter(|t| t.len() > 1)
        .filter(|t| !STOPWORDS.contains(t))
        .map(stem)
        .collect();

    PreparedQuery { tokens, important }
}

fn substring_matches(tokens: &[String], query_token: &str) -> usize {
    tokens
        .iter()
        .filter(|t| t.contains(query_token) || query_token.contains(t.as_str()))
        .count()
}

/// Score every chunk against the query. Returns raw scores in input order;
/// callers sort. Zero usable query tokens scores everything 0.
pub fn keyword_scores(query: &str, chunks: &[Chunk]) -> Vec<f64> {
    let prepared = prepare_query(query);
    if prepared.tokens.is_empty() {
        return vec![0.0; chunks.len()];
    }

    chunks
        .iter()
        .map(|chunk| score_chunk(chunk, &prepared))
        .collect()
}

fn score_chunk(chunk: &Chunk, query: &PreparedQuery) -> f64 {
    let content_tokens = split_and_stem(&chunk.content);
    let path_tokens = split_and_stem(&chunk.rel_path);
    let name_tokens = chunk
        .name
        .as_deref()
        .map(split_and_stem)
        .unwrap_or_default();

    // Short chunks should not lose to long ones on raw match counts.
    let density = (200.0 / content_tokens.len().max(1) as f64).min(1.0);

    let mut score = 0.0;
    let mut all_matched = true;

    for token in &query.tokens {
        let boost = if query.important.contains(token) {
            IMPORTANT_BOOST
        } else {
            1.0
        };

        let content_matches = substring_matches(&content_tokens, token);
        let path_matches = substring_matches(&path_tokens, token);
        let name_matches = substring_matches(&name_tokens, token);

        if content_matches > 0 {
            score += (1.0 + (content_matches as f64).ln()) * (1.0 + density) * boost;
        }
        score += path_matches as f64 * 2.0 * boost;
        score += name_matches as f64 * 3.0 * boost;

        if content_tokens.iter().any(|t| t == token) {
            score += 2.0 * boost;
        }
        if path_tokens.iter().any(|t| t == token) {
            score += 10.0 * boost;
        }
        if name_tokens.iter().any(|t| t == token) {
            score += 20.0 * boost;
        }

        if content_matches == 0 && path_matches == 0 && name_matches == 0 {
            all_matched = false;
        }
    }

    if query.tokens.len() >= 2 && all_matched {
        score *= 1.5;
    }

    let path = &chunk.rel_path;
    if path.contains(".test.")
        || path.contains(".spec.")
        || path.contains("__fixtures__")
        || path.contains("__tests__")
    {
        score *= 0.5;
    }
    if path.contains("/codemod/") || path.contains("/codemods/") {
        score *= 0.3;
    }
    if path.contains("prepare") && !query.tokens.iter().any(|t| t == "prepar") {
        score *= 0.7;
    }

    score
}

/// The always-on, deterministic ranker.
#[derive(Default)]
pub struct KeywordRanker;

#[async_trait]
impl Ranker for KeywordRanker {
    async fn rank(&self, query: &str, chunks: Vec<Chunk>) -> Result<Vec<ScoredChunk>> {
        let scores = keyword_scores(query, &chunks);
        let mut scored: Vec<ScoredChunk> = chunks
            .into_iter()
            .zip(scores)
            .map(|(chunk, score)| ScoredChunk { chunk, score })
            .collect();
        // Stable: ties keep input (file) order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored)
    }
}
