//! Embedding provider abstraction and the OpenAI implementation.
//!
//! The hybrid ranker needs vectors for chunks and for the hypothetical
//! answer document. [`EmbeddingProvider`] is the seam: the production
//! implementation calls the OpenAI embeddings API with batching, retry,
//! and backoff; tests substitute a deterministic provider.
//!
//! A failed batch never fails a run — it degrades to zero vectors, which
//! cosine-score 0 against everything and simply stop contributing signal.
//!
//! # Caching
//!
//! Embeddings are cached in two tiers: an in-memory map keyed by a SHA-256
//! digest of the input text, and per-vector JSON files under
//! `~/.cache/lmfetch/embeddings/`. Disk writes are fire-and-forget; a lost
//! write costs one re-embedding later, never correctness.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Texts per embedding request.
pub const BATCH_SIZE: usize = 100;
/// Wall-clock limit per batch request.
const BATCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Retries after the first attempt.
const MAX_RETRIES: u32 = 2;
/// Base backoff; doubles per retry.
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Produces embedding vectors for batches of texts.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Vector dimensionality (used to size zero-vector substitutes).
    fn dims(&self) -> usize;
    /// Embed one batch, returning vectors in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embedding provider backed by the OpenAI embeddings API.
///
/// Requires `OPENAI_API_KEY`. The endpoint can be overridden with
/// `LMFETCH_EMBEDDINGS_URL` (tests point it at a local stub).
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
    dims: usize,
}

impl OpenAIEmbedder {
    pub fn new() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let api_url = std::env::var("LMFETCH_EMBEDDINGS_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1/embeddings".to_string());

        let client = reqwest::Client::builder().timeout(BATCH_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_key,
            api_url,
            model: "text-embedding-3-small".to_string(),
            dims: 1536,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(BACKOFF_BASE * 2u32.pow(attempt - 1)).await;
            }

            let resp = self
                .client
                .post(&self.api_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_embeddings_response(&json, texts.len());
                    }

                    // Rate limits and server errors are transient.
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("embeddings API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("embeddings API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("embedding failed after retries")))
    }
}

fn parse_embeddings_response(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("invalid embeddings response: missing data array"))?;

    let mut vectors = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("invalid embeddings response: missing embedding"))?;
        vectors.push(
            embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }

    if vectors.len() != expected {
        bail!(
            "embeddings response carried {} vectors for {} inputs",
            vectors.len(),
            expected
        );
    }
    Ok(vectors)
}

/// Two-tier embedding cache: in-memory map plus JSON vector files on disk.
pub struct EmbeddingCache {
    dir: PathBuf,
    memory: Mutex<HashMap<String, Vec<f32>>>,
}

impl EmbeddingCache {
    /// `dir` is created lazily on the first write.
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            memory: Mutex::new(HashMap::new()),
        }
    }

    fn key(text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        format!("{:x}", digest)[..16].to_string()
    }

    fn disk_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Look up a vector, promoting disk hits into memory.
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = Self::key(text);
        if let Ok(memory) = self.memory.lock() {
            if let Some(v) = memory.get(&key) {
                return Some(v.clone());
            }
        }

        let raw = std::fs::read_to_string(self.disk_path(&key)).ok()?;
        let vector: Vec<f32> = serde_json::from_str(&raw).ok()?;
        if let Ok(mut memory) = self.memory.lock() {
            memory.insert(key, vector.clone());
        }
        Some(vector)
    }

    /// Store a vector in memory and schedule the disk write. The write is
    /// not awaited; failures are invisible by design.
    pub fn put(&self, text: &str, vector: Vec<f32>) {
        let key = Self::key(text);
        if let Ok(mut memory) = self.memory.lock() {
            memory.insert(key.clone(), vector.clone());
        }

        let dir = self.dir.clone();
        let path = self.disk_path(&key);
        tokio::spawn(async move {
            let _ = tokio::fs::create_dir_all(&dir).await;
            if let Ok(serialized) = serde_json::to_string(&vector) {
                let _ = tokio::fs::write(&path, serialized).await;
            }
        });
    }
}

/// Embed `texts` through the cache in batches of [`BATCH_SIZE`].
///
/// Cached texts never reach the provider. A batch that still fails after
/// the provider's retries yields zero vectors of `provider.dims()` for its
/// texts.
pub async fn embed_all(
    provider: &dyn EmbeddingProvider,
    cache: &EmbeddingCache,
    texts: &[String],
) -> Vec<Vec<f32>> {
    let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
    let mut uncached_indices = Vec::new();

    for text in texts {
        match cache.get(text) {
            Some(v) => results.push(Some(v)),
            None => {
                uncached_indices.push(results.len());
                results.push(None);
            }
        }
    }

    for batch_indices in uncached_indices.chunks(BATCH_SIZE) {
        let batch: Vec<String> = batch_indices.iter().map(|&i| texts[i].clone()).collect();

        match provider.embed_batch(&batch).await {
            Ok(vectors) => {
                for (&index, vector) in batch_indices.iter().zip(vectors) {
                    cache.put(&texts[index], vector.clone());
                    results[index] = Some(vector);
                }
            }
            Err(e) => {
                eprintln!("warning: embedding batch failed, using zero vectors: {}", e);
                for &index in batch_indices {
                    results[index] = Some(vec![0.0; provider.dims()]);
                }
            }
        }
    }

    results.into_iter().map(|v| v.unwrap_or_default()).collect()
}

/// Cosine similarity in [-1, 1]; 0 for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }
    dot / denom
}
