//! # lmfetch
//!
//! **Assemble a relevance-ranked, token-budgeted excerpt of a codebase for
//! LLM prompts.**
//!
//! Given a root (local directory or GitHub URL) and a free-text query,
//! lmfetch discovers the corpus, splits each file into construct-level
//! chunks, scores every chunk for relevance, and emits the best chunks
//! that fit a token budget — ready to paste into a model prompt.
//!
//! ## Pipeline
//!
//! ```text
//! ┌────────┐   ┌─────────┐   ┌────────┐   ┌────────┐   ┌──────────┐
//! │ Source │──▶│ Chunker │──▶│ Ranker │──▶│ Select │──▶│  Format  │
//! │ fs/git │   │ + cache │   │ kw/hyb │   │ budget │   │ md / xml │
//! └────────┘   └─────────┘   └────────┘   └────────┘   └──────────┘
//!                   │             │
//!              SQLite cache   analyzers (import graph,
//!              (path+mtime)    PageRank, importance)
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use lmfetch::ContextBuilder;
//!
//! let result = ContextBuilder::new("./my-project", "how are sessions refreshed")
//!     .budget("50k")
//!     .build()
//!     .await?;
//! println!("{}", result.context);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Core data types: `SourceFile`, `Chunk`, `ScoredChunk`, `ContextResult` |
//! | [`source`] / [`source_fs`] / [`source_git`] | Corpus discovery with gitignore semantics; GitHub checkout preparation |
//! | [`chunker`] | Regex boundary chunking per language, size fallback |
//! | [`tokens`] | cl100k token counting and budget parsing |
//! | [`cache`] | Persistent chunk cache keyed on path + mtime |
//! | [`graph`] | Import graph and PageRank centrality |
//! | [`importance`] | Path-heuristic importance prior |
//! | [`ranker`] / [`ranker_hybrid`] | Keyword ranking; keyword + embedding + importance fusion |
//! | [`embedding`] | Embedding provider, batching/retry, two-tier vector cache |
//! | [`llm`] | HyDE generation and optional model rerank |
//! | [`select`] | Greedy budget-constrained selection |
//! | [`format`] | Markdown / XML rendering |
//! | [`builder`] | Pipeline orchestration |
//! | [`progress`] | Phase progress reporting |

pub mod builder;
pub mod cache;
pub mod chunker;
pub mod embedding;
pub mod format;
pub mod graph;
pub mod importance;
pub mod language;
pub mod llm;
pub mod models;
pub mod progress;
pub mod ranker;
pub mod ranker_hybrid;
pub mod select;
pub mod source;
pub mod source_fs;
pub mod source_git;
pub mod tokens;

pub use builder::{clear_cache, ContextBuilder};
pub use format::OutputFormat;
pub use models::{Chunk, ChunkKind, ContextResult, ScoredChunk, SourceFile};
pub use tokens::parse_budget;
