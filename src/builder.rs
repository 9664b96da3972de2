//! Context build orchestration.
//!
//! [`ContextBuilder`] wires the pipeline together: discover → analyze →
//! chunk (cache-aware) → rank → select → format. One builder runs one
//! pipeline; it owns the chunk cache session and the token-count memo for
//! the duration of the run and tears both down before returning.
//!
//! Per-file problems never abort a build. Global prerequisites — an
//! unresolvable root, a cache that cannot open — do.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::{cache_root, CachedChunk, ChunkCache};
use crate::chunker::chunk_file;
use crate::embedding::{EmbeddingCache, OpenAIEmbedder};
use crate::format::{format_context, OutputFormat};
use crate::graph::DependencyGraph;
use crate::importance::combined_scores;
use crate::llm::{rerank_with_llm, OpenAIGenerator, TextGenerator};
use crate::models::{Chunk, ContextResult, SourceFile};
use crate::progress::{emit, ProgressFn};
use crate::ranker::{KeywordRanker, Ranker};
use crate::ranker_hybrid::HybridRanker;
use crate::select::select_chunks;
use crate::source::{ScanOptions, Source};
use crate::source_fs::CodebaseSource;
use crate::source_git::{parse_github_url, GitHubSource};
use crate::tokens::{clear_token_cache, count_tokens, parse_budget};

/// Candidates handed to the smart reranker.
const RERANK_CANDIDATES: usize = 50;

/// Configures and runs one context build.
///
/// ```no_run
/// # use lmfetch::ContextBuilder;
/// # async fn run() -> anyhow::Result<()> {
/// let result = ContextBuilder::new(".", "how does login work")
///     .budget("50k")
///     .include(["**/*.py"])
///     .build()
///     .await?;
/// println!("{}", result.context);
/// # Ok(())
/// # }
/// ```
pub struct ContextBuilder {
    path: String,
    query: String,
    budget: String,
    include: Vec<String>,
    exclude: Vec<String>,
    fast: bool,
    force_large: bool,
    smart_rerank: bool,
    format: OutputFormat,
    on_progress: Option<ProgressFn>,
    cache_dir: Option<PathBuf>,
}

impl ContextBuilder {
    pub fn new(path: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: query.into(),
            budget: "50k".to_string(),
            include: Vec::new(),
            exclude: Vec::new(),
            fast: true,
            force_large: false,
            smart_rerank: false,
            format: OutputFormat::Markdown,
            on_progress: None,
            cache_dir: None,
        }
    }

    /// Token budget: `"50k"`, `"1.5m"`, or a plain token count.
    pub fn budget(mut self, budget: impl Into<String>) -> Self {
        self.budget = budget.into();
        self
    }

    pub fn budget_tokens(mut self, tokens: usize) -> Self {
        self.budget = tokens.to_string();
        self
    }

    pub fn include<I, S>(mut self, globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = globs.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude<I, S>(mut self, globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = globs.into_iter().map(Into::into).collect();
        self
    }

    /// `true` (default) keeps ranking keyword-only; `false` enables the
    /// hybrid ranker (embeddings + HyDE).
    pub fn fast(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }

    /// Lift the 1 MiB / 20,000-line per-file caps.
    pub fn force_large(mut self, force: bool) -> Self {
        self.force_large = force;
        self
    }

    /// Re-score the top candidates with a model after ranking.
    pub fn smart_rerank(mut self, enabled: bool) -> Self {
        self.smart_rerank = enabled;
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn on_progress(mut self, callback: ProgressFn) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Override `~/.cache/lmfetch` (used by tests to stay hermetic).
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Run the pipeline.
    pub async fn build(self) -> Result<ContextResult> {
        let budget = parse_budget(&self.budget)?;
        let progress = self.on_progress.clone();

        let scan_options = ScanOptions {
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            force_large: self.force_large,
        };

        // Phase 1: discovery.
        emit(&progress, "Discovering files");
        let source: Box<dyn Source> = if parse_github_url(&self.path).is_some() {
            Box::new(GitHubSource::new(&self.path, scan_options)?)
        } else {
            Box::new(CodebaseSource::new(&self.path, scan_options))
        };
        let files = source.scan().await.context("source scan failed")?;
        emit(&progress, &format!("Found {} files", files.len()));

        if files.is_empty() {
            return Ok(ContextResult {
                context: String::new(),
                chunks: Vec::new(),
                tokens: 0,
                files_processed: 0,
                chunks_created: 0,
            });
        }

        // Phase 2: dependency analysis and file importance.
        emit(&progress, "Analyzing dependencies");
        let graph = DependencyGraph::build(&files);
        let centrality = graph.centrality();
        let file_scores = combined_scores(&files, &centrality);

        // Phase 3: chunking, through the cache.
        let state_dir = self.cache_dir.clone().unwrap_or_else(cache_root);
        let cache = ChunkCache::open(&state_dir.join("cache.db")).await?;
        let _ = cache.prune().await;

        emit(&progress, "Chunking files");
        let all_chunks = chunk_files(&cache, &files).await?;
        let chunks_created = all_chunks.len();
        emit(&progress, &format!("Created {} chunks", chunks_created));

        // Phase 4: ranking.
        emit(&progress, "Ranking chunks");
        let generator: Option<Arc<dyn TextGenerator>> = match OpenAIGenerator::new() {
            Ok(g) => Some(Arc::new(g)),
            Err(_) => None,
        };

        let ranked = if self.fast {
            emit(&progress, "Computing keyword scores");
            KeywordRanker.rank(&self.query, all_chunks).await?
        } else {
            match (OpenAIEmbedder::new(), &generator) {
                (Ok(provider), Some(generator)) => {
                    let embedding_cache =
                        Arc::new(EmbeddingCache::new(state_dir.join("embeddings")));
                    let hybrid = HybridRanker::new(
                        file_scores,
                        Arc::new(provider),
                        Arc::clone(generator),
                        embedding_cache,
                        progress.clone(),
                    );
                    hybrid.rank(&self.query, all_chunks).await?
                }
                (embedder, _) => {
                    // No credentials for the external providers: keyword
                    // ranking still produces a useful ordering.
                    if let Err(e) = embedder {
                        eprintln!("warning: {}; falling back to keyword ranking", e);
                    } else {
                        eprintln!("warning: text generator unavailable; falling back to keyword ranking");
                    }
                    emit(&progress, "Computing keyword scores");
                    KeywordRanker.rank(&self.query, all_chunks).await?
                }
            }
        };

        let ranked = match (&generator, self.smart_rerank) {
            (Some(generator), true) => {
                rerank_with_llm(generator.as_ref(), &self.query, ranked, RERANK_CANDIDATES).await
            }
            _ => ranked,
        };

        // Phase 5: selection and formatting.
        emit(&progress, "Selecting best chunks");
        let selected = select_chunks(ranked, budget);

        emit(&progress, "Formatting context");
        let context = format_context(&selected, self.format);
        let tokens = selected.iter().map(|s| s.chunk.tokens).sum();

        cache.close().await;
        clear_token_cache();

        Ok(ContextResult {
            context,
            chunks: selected,
            tokens,
            files_processed: files.len(),
            chunks_created,
        })
    }
}

/// Chunk every file, serving unchanged files from the cache and writing
/// fresh results back. Chunks come out in discovery order, ascending line
/// order within each file.
async fn chunk_files(cache: &ChunkCache, files: &[SourceFile]) -> Result<Vec<Chunk>> {
    let mut chunks_by_file: HashMap<String, Vec<Chunk>> = HashMap::new();
    let mut uncached: Vec<SourceFile> = Vec::new();

    // Cache rows are keyed on the absolute path: relative paths repeat
    // across corpora sharing one cache database.
    for file in files {
        let key = file.path.to_string_lossy();
        if cache.has_fresh_chunks(&key, file.mtime).await? {
            let rows = cache.get_chunks(&key).await?;
            chunks_by_file.insert(
                file.rel_path.clone(),
                rows.into_iter().map(|row| rebuild_chunk(file, row)).collect(),
            );
        } else {
            uncached.push(file.clone());
        }
    }

    // CPU-bound work runs on blocking threads, a bounded batch at a time.
    let batch_size = (uncached.len().div_ceil(10)).clamp(5, 20);
    for batch in uncached.chunks(batch_size) {
        let handles: Vec<_> = batch
            .iter()
            .cloned()
            .map(|file| {
                tokio::task::spawn_blocking(move || {
                    let chunks = chunk_file(&file);
                    (file, chunks)
                })
            })
            .collect();

        for handle in handles {
            let (file, chunks) = handle.await?;
            let key = file.path.to_string_lossy();
            // Write-back failures cost a re-chunk next run, nothing more.
            let _ = cache
                .put_file(&key, &file.content, file.mtime, file.size, &file.language)
                .await;
            let _ = cache.put_chunks(&key, &chunks).await;
            chunks_by_file.insert(file.rel_path, chunks);
        }
    }

    let mut all = Vec::new();
    for file in files {
        if let Some(chunks) = chunks_by_file.remove(&file.rel_path) {
            all.extend(chunks);
        }
    }
    Ok(all)
}

/// Rehydrate a cached row into a full chunk using the live file's context.
fn rebuild_chunk(file: &SourceFile, row: CachedChunk) -> Chunk {
    let tokens = count_tokens(&row.content);
    Chunk {
        id: Chunk::make_id(&file.rel_path, row.start_line),
        path: file.path.clone(),
        rel_path: file.rel_path.clone(),
        content: row.content,
        start_line: row.start_line,
        end_line: row.end_line,
        kind: row.kind,
        name: row.name,
        language: file.language.clone(),
        tokens,
    }
}

/// Empty the persistent chunk cache (`lmfetch --clear-cache`).
pub async fn clear_cache(cache_dir: Option<PathBuf>) -> Result<()> {
    let state_dir = cache_dir.unwrap_or_else(cache_root);
    let cache = ChunkCache::open(&state_dir.join("cache.db")).await?;
    cache.clear().await?;
    cache.close().await;
    Ok(())
}
