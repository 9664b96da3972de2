//! Source abstraction.
//!
//! A [`Source`] yields the files of a corpus. Two realizations exist:
//! [`crate::source_fs::CodebaseSource`] scans a local directory, and
//! [`crate::source_git::GitHubSource`] prepares a cached checkout of a
//! remote repository and then behaves as a local source over it.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::SourceFile;

/// Filtering options shared by all sources.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Include globs; when non-empty, a file must match at least one
    /// (matched against the relative path or the basename).
    pub include: Vec<String>,
    /// Exclude globs, matched against the relative path.
    pub exclude: Vec<String>,
    /// Lift the 1 MiB / 20,000-line size caps.
    pub force_large: bool,
}

/// A corpus of source files.
#[async_trait]
pub trait Source: Send + Sync {
    /// Scan the corpus and return all files that pass the filter pipeline.
    ///
    /// Per-file failures (unreadable, oversized) are never errors; such
    /// files are silently skipped. An error means the corpus itself is
    /// unusable (missing root, failed clone).
    async fn scan(&self) -> Result<Vec<SourceFile>>;
}
