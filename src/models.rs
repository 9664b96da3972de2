//! Core data models used throughout lmfetch.
//!
//! These types represent the files, chunks, and scored results that flow
//! through the retrieval pipeline. The data lifecycle is:
//!
//! ```text
//! Source → SourceFile → chunk() → Chunk
//!                                   ↓
//!                              rank() → ScoredChunk
//!                                   ↓
//!                             select() → ContextResult
//! ```
//!
//! A **[`SourceFile`]** is produced by a source (local directory or a
//! prepared GitHub checkout) before any chunking. A **[`Chunk`]** is a
//! contiguous block of source lines with a construct kind, the atomic unit
//! of retrieval. A **[`ScoredChunk`]** pairs a chunk with its relevance
//! score. A **[`ContextResult`]** is the final assembled output.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// A discovered source file, alive for one pipeline run.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the scan root, forward-slash normalized.
    pub rel_path: String,
    /// Full text content (lossy UTF-8).
    pub content: String,
    /// Language tag derived from the extension; `"text"` when unknown.
    pub language: String,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time (Unix epoch seconds).
    pub mtime: i64,
}

/// The code construct a chunk represents.
///
/// Stored as lowercase text in the chunk cache; [`ChunkKind::as_str`] and
/// the `FromStr` impl round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Class,
    Method,
    Interface,
    Type,
    Enum,
    Module,
    Section,
    Constant,
    Variable,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Function => "function",
            ChunkKind::Class => "class",
            ChunkKind::Method => "method",
            ChunkKind::Interface => "interface",
            ChunkKind::Type => "type",
            ChunkKind::Enum => "enum",
            ChunkKind::Module => "module",
            ChunkKind::Section => "section",
            ChunkKind::Constant => "constant",
            ChunkKind::Variable => "variable",
        }
    }
}

impl FromStr for ChunkKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(ChunkKind::Function),
            "class" => Ok(ChunkKind::Class),
            "method" => Ok(ChunkKind::Method),
            "interface" => Ok(ChunkKind::Interface),
            "type" => Ok(ChunkKind::Type),
            "enum" => Ok(ChunkKind::Enum),
            "module" => Ok(ChunkKind::Module),
            "section" => Ok(ChunkKind::Section),
            "constant" => Ok(ChunkKind::Constant),
            "variable" => Ok(ChunkKind::Variable),
            other => anyhow::bail!("unknown chunk kind: {}", other),
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous block of source lines.
///
/// Line numbers are 1-indexed and inclusive; `content` equals the file's
/// `start_line..=end_line` range verbatim. Chunks of one file cover disjoint
/// ranges in file order.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Stable id: first 16 hex chars of SHA-256 over `rel_path:start_line`.
    pub id: String,
    /// Absolute path of the owning file.
    pub path: PathBuf,
    /// Path relative to the scan root, forward-slash normalized.
    pub rel_path: String,
    /// Verbatim text of the line range.
    pub content: String,
    /// First line, 1-indexed.
    pub start_line: u32,
    /// Last line, 1-indexed, inclusive. Always >= `start_line`.
    pub end_line: u32,
    /// Construct kind detected at the chunk boundary.
    pub kind: ChunkKind,
    /// Construct name captured by the boundary pattern, when present.
    pub name: Option<String>,
    /// Language tag inherited from the file.
    pub language: String,
    /// Token count of `content` (cl100k_base).
    pub tokens: usize,
}

impl Chunk {
    /// Derive the stable chunk id from its file and position.
    pub fn make_id(rel_path: &str, start_line: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(rel_path.as_bytes());
        hasher.update(b":");
        hasher.update(start_line.to_string().as_bytes());
        format!("{:x}", hasher.finalize())[..16].to_string()
    }
}

/// A chunk paired with its relevance score (>= 0).
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

/// Final result of a context build.
#[derive(Debug)]
pub struct ContextResult {
    /// The rendered context document.
    pub context: String,
    /// Selected chunks, ordered by descending score.
    pub chunks: Vec<ScoredChunk>,
    /// Token total of the selected chunks (content only, without headers).
    pub tokens: usize,
    /// Number of files the source yielded.
    pub files_processed: usize,
    /// Number of chunks produced across all files (before selection).
    pub chunks_created: usize,
}
