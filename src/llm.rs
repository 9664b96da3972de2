//! Model-assisted ranking helpers.
//!
//! Two uses of an external text generator, both failure-transparent:
//!
//! - **Hypothetical answers (HyDE).** Instead of embedding the raw query,
//!   the hybrid ranker embeds a short model-written code snippet that
//!   plausibly answers it; real code is much closer to hypothetical code
//!   than to an English question. On any failure the raw query is used.
//! - **Smart rerank** (opt-in). The top candidates are re-scored by a
//!   cheap model and blended with their initial scores. Any failure leaves
//!   the ordering untouched.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::models::ScoredChunk;

/// Max tokens requested for a hypothetical answer.
const HYDE_MAX_TOKENS: u32 = 200;
/// Weight of the model's relevance judgment when blending rerank scores.
const RERANK_LLM_WEIGHT: f64 = 0.6;

/// External text generator; the production impl calls a chat-completions
/// endpoint, tests substitute a canned one.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String>;
}

/// Chat-completions generator (OpenAI-compatible).
///
/// Requires `OPENAI_API_KEY`; the endpoint can be overridden with
/// `LMFETCH_COMPLETIONS_URL`.
pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenAIGenerator {
    pub fn new() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let api_url = std::env::var("LMFETCH_COMPLETIONS_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            api_url,
            model: "gpt-4o-mini".to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    async fn generate(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
        });

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("completions API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("completions response had no content"))?;
        Ok(text.trim().to_string())
    }
}

/// Produce the HyDE document for a query; the raw query on any failure.
pub async fn generate_hypothetical_answer(generator: &dyn TextGenerator, query: &str) -> String {
    let result = generator
        .generate(
            "You write short hypothetical code snippets. Output ONLY code that would \
             plausibly answer the question. No prose, no markdown fences.",
            &format!("write a short hypothetical code snippet that answers this question: {}", query),
            HYDE_MAX_TOKENS,
        )
        .await;

    match result {
        Ok(text) if !text.is_empty() => text,
        _ => query.to_string(),
    }
}

/// Re-score the top `top_k` candidates with the model and blend:
/// `0.4 · initial + 0.6 · llm`. Chunks past `top_k`, and every chunk when
/// a model call fails, keep their initial scores. Output is re-sorted.
pub async fn rerank_with_llm(
    generator: &dyn TextGenerator,
    query: &str,
    mut scored: Vec<ScoredChunk>,
    top_k: usize,
) -> Vec<ScoredChunk> {
    let limit = top_k.min(scored.len());

    for item in scored.iter_mut().take(limit) {
        let content: String = item.chunk.content.chars().take(2000).collect();
        let result = generator
            .generate(
                "You are a relevance scorer. Output ONLY a number from 0.0 to 1.0 \
                 indicating how relevant the code is to the query. Just the number.",
                &format!("Query: {}\n\nCode:\n{}", query, content),
                8,
            )
            .await;

        if let Ok(text) = result {
            if let Ok(llm_score) = text.trim().parse::<f64>() {
                let llm_score = llm_score.clamp(0.0, 1.0);
                item.score =
                    item.score * (1.0 - RERANK_LLM_WEIGHT) + llm_score * RERANK_LLM_WEIGHT;
            }
        }
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored
}
