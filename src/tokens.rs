//! Token counting and budget parsing.
//!
//! Counts are produced by the `cl100k_base` tokenizer so budgets line up
//! with what OpenAI-family models actually consume. Because the same chunk
//! text is counted repeatedly across ranking and selection, counts are
//! memoized in a process-wide map keyed by a content hash; the builder
//! clears the map at the end of a run to release memory.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use tiktoken_rs::CoreBPE;

static BPE: Lazy<CoreBPE> =
    Lazy::new(|| tiktoken_rs::cl100k_base().expect("cl100k_base encoder is bundled"));

static COUNT_CACHE: Lazy<Mutex<HashMap<u64, usize>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static BUDGET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)(k|m)?$").expect("valid budget regex"));

fn content_key(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    u64::from_le_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
}

/// Count tokens in `text` under the cl100k_base encoding, memoized.
pub fn count_tokens(text: &str) -> usize {
    let key = content_key(text);
    if let Ok(cache) = COUNT_CACHE.lock() {
        if let Some(&n) = cache.get(&key) {
            return n;
        }
    }

    let n = BPE.encode_ordinary(text).len();

    if let Ok(mut cache) = COUNT_CACHE.lock() {
        cache.insert(key, n);
    }
    n
}

/// Drop all memoized counts. Called by the builder when a run finishes.
pub fn clear_token_cache() {
    if let Ok(mut cache) = COUNT_CACHE.lock() {
        cache.clear();
        cache.shrink_to_fit();
    }
}

/// Parse a budget string: a number with an optional `k` (×1,000) or `m`
/// (×1,000,000) suffix, case-insensitive.
///
/// `"50k"` → 50_000, `"1.5m"` → 1_500_000, `"123"` → 123.
pub fn parse_budget(s: &str) -> Result<usize> {
    let caps = match BUDGET_RE.captures(s.trim()) {
        Some(c) => c,
        None => bail!("invalid budget '{}': expected a number with optional k/m suffix", s),
    };

    let value: f64 = caps[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid budget '{}'", s))?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(ref u) if u == "k" => 1_000.0,
        Some(ref u) if u == "m" => 1_000_000.0,
        _ => 1.0,
    };

    let tokens = (value * multiplier).round() as usize;
    if tokens == 0 {
        bail!("budget must be greater than zero");
    }
    Ok(tokens)
}
