//! Hybrid ranking: keyword + embedding similarity + file importance.
//!
//! Composes the keyword ranker rather than replacing it: keyword scores
//! are min-max normalized to [0, 1] and fused with cosine similarity
//! against a hypothetical answer document (HyDE) and the per-file combined
//! importance score:
//!
//! ```text
//! final = 0.4 · keyword + 0.4 · embedding + 0.2 · fileImportance
//! ```
//!
//! Markdown chunks have their importance contribution scaled by 0.6 —
//! prose about code should not crowd out the code itself.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, embed_all, EmbeddingCache, EmbeddingProvider};
use crate::language::is_markdown;
use crate::llm::{generate_hypothetical_answer, TextGenerator};
use crate::models::{Chunk, ScoredChunk};
use crate::progress::{emit, ProgressFn};
use crate::ranker::{keyword_scores, Ranker};

const KEYWORD_WEIGHT: f64 = 0.4;
const EMBEDDING_WEIGHT: f64 = 0.4;
const IMPORTANCE_WEIGHT: f64 = 0.2;
/// Importance multiplier for markdown/mdx chunks.
const MARKDOWN_FACTOR: f64 = 0.6;
/// Chunk text is truncated to this many chars before embedding.
const EMBED_TEXT_LIMIT: usize = 8000;

/// The `fast = false` ranker.
pub struct HybridRanker {
    file_scores: HashMap<String, f64>,
    provider: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn TextGenerator>,
    cache: Arc<EmbeddingCache>,
    progress: Option<ProgressFn>,
}

impl HybridRanker {
    pub fn new(
        file_scores: HashMap<String, f64>,
        provider: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn TextGenerator>,
        cache: Arc<EmbeddingCache>,
        progress: Option<ProgressFn>,
    ) -> Self {
        Self {
            file_scores,
            provider,
            generator,
            cache,
            progress,
        }
    }

    /// Enrich a chunk for embedding: the path and construct header give the
    /// vector a location signal the raw content lacks.
    fn embedding_text(chunk: &Chunk) -> String {
        let content: String = chunk.content.chars().take(EMBED_TEXT_LIMIT).collect();
        format!(
            "File: {}\n{}: {}\n{}",
            chunk.rel_path,
            chunk.kind,
            chunk.name.as_deref().unwrap_or(""),
            content
        )
    }
}

#[async_trait]
impl Ranker for HybridRanker {
    async fn rank(&self, query: &str, chunks: Vec<Chunk>) -> Result<Vec<ScoredChunk>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        emit(&self.progress, "Computing keyword scores");
        let raw = keyword_scores(query, &chunks);
        let kw = normalize(&raw);

        emit(&self.progress, "Generating hypothetical answer");
        let hyde_doc = generate_hypothetical_answer(self.generator.as_ref(), query).await;

        emit(&self.progress, "Computing semantic similarity");
        let mut texts: Vec<String> = chunks.iter().map(Self::embedding_text).collect();
        texts.push(hyde_doc);
        let vectors = embed_all(self.provider.as_ref(), &self.cache, &texts).await;
        let query_vector = vectors.last().expect("hyde vector present");

        emit(&self.progress, "Combining ranking signals");
        let mut scored: Vec<ScoredChunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let similarity = cosine_similarity(&vectors[i], query_vector);

                let mut importance = self.file_scores.get(&chunk.rel_path).copied().unwrap_or(0.5);
                if is_markdown(&chunk.language) {
                    importance *= MARKDOWN_FACTOR;
                }

                let score = (KEYWORD_WEIGHT * kw[i]
                    + EMBEDDING_WEIGHT * similarity
                    + IMPORTANCE_WEIGHT * importance)
                    .max(0.0);
                ScoredChunk { chunk, score }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored)
    }
}

/// Min-max normalize into [0, 1]; a flat distribution maps to 0.5.
fn normalize(scores: &[f64]) -> Vec<f64> {
    let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    if !min.is_finite() || !max.is_finite() || (max - min).abs() < f64::EPSILON {
        return vec![0.5; scores.len()];
    }
    scores.iter().map(|s| (s - min) / (max - min)).collect()
}
