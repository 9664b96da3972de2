//! Local codebase source.
//!
//! Walks a directory tree and yields [`SourceFile`]s, honoring `.gitignore`
//! semantics at every level: the root ignore file and any nested ignore
//! files apply to their own subtrees, each matched against paths relative
//! to the containing directory. The walker from the `ignore` crate provides
//! that behavior; on top of it sits a filter pipeline of hard-skipped
//! directories, default-skipped basenames (lock files, boilerplate
//! documents), binary extensions, user globs, and size caps.
//!
//! Unreadable files are skipped silently; they never abort a scan.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use crate::language::detect_language;
use crate::models::SourceFile;
use crate::source::{ScanOptions, Source};

/// Directory names that are never descended into, regardless of ignore files.
const IGNORE_DIRS: &[&str] = &[
    ".git", ".svn", ".hg", "node_modules", "__pycache__", ".venv", "venv",
    "env", "dist", "build", ".next", ".nuxt", "target", "out", "vendor",
    ".idea", ".vscode", ".cache", "coverage", ".pytest_cache", ".mypy_cache",
];

/// File basenames skipped by default: editor/VCS metadata, generated lock
/// files, and boilerplate documents that add tokens without adding signal.
const IGNORE_FILES: &[&str] = &[
    ".DS_Store", "Thumbs.db", ".gitignore", ".gitattributes",
    "package-lock.json", "yarn.lock", "pnpm-lock.yaml", "Cargo.lock",
    "poetry.lock", "uv.lock",
    "CHANGELOG.md", "CHANGELOG", "HISTORY.md", "CONTRIBUTING.md",
    "LICENSE", "LICENSE.md", "NOTICE",
];

/// Binary and media extensions that are never source material.
const BINARY_EXTENSIONS: &[&str] = &[
    // Images
    "png", "jpg", "jpeg", "gif", "ico", "webp", "bmp", "tiff", "svg",
    // Fonts
    "woff", "woff2", "ttf", "eot", "otf",
    // Audio / video
    "mp3", "mp4", "wav", "ogg", "avi", "mov", "webm", "flac",
    // Archives
    "zip", "tar", "gz", "rar", "7z", "bz2", "xz", "tgz",
    // Documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    // Compiled artifacts
    "pyc", "pyo", "so", "dylib", "dll", "exe", "o", "a", "class", "jar",
    "wasm", "bin",
    // Databases
    "db", "sqlite", "sqlite3",
];

/// Maximum file size before the `force_large` gate applies.
const MAX_FILE_BYTES: u64 = 1024 * 1024;
/// Maximum line count before the `force_large` gate applies.
const MAX_FILE_LINES: usize = 20_000;

/// Scans a local directory.
pub struct CodebaseSource {
    root: PathBuf,
    options: ScanOptions,
}

impl CodebaseSource {
    pub fn new(root: impl Into<PathBuf>, options: ScanOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    fn discover(&self) -> Result<Vec<SourceFile>> {
        if !self.root.is_dir() {
            bail!("path does not exist or is not a directory: {}", self.root.display());
        }

        let include_set = build_globset(&self.options.include)?;
        let exclude_set = build_globset(&self.options.exclude)?;

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(false)
            .require_git(false)
            .parents(false)
            .follow_links(false)
            .filter_entry(|entry| {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if is_dir {
                    if let Some(name) = entry.file_name().to_str() {
                        return !IGNORE_DIRS.contains(&name);
                    }
                }
                true
            })
            .build();

        let mut files = Vec::new();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }

            let path = entry.path();
            if let Some(file) = self.read_candidate(path, &include_set, &exclude_set) {
                files.push(file);
            }
        }

        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        Ok(files)
    }

    /// Apply the per-file filter pipeline; `None` means the file is skipped.
    fn read_candidate(
        &self,
        path: &Path,
        include_set: &GlobSet,
        exclude_set: &GlobSet,
    ) -> Option<SourceFile> {
        let basename = path.file_name()?.to_str()?;
        if IGNORE_FILES.contains(&basename) {
            return None;
        }

        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
                return None;
            }
        }

        let rel_path = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        if exclude_set.is_match(&rel_path) {
            return None;
        }
        if !self.options.include.is_empty()
            && !include_set.is_match(&rel_path)
            && !include_set.is_match(basename)
        {
            return None;
        }

        let metadata = std::fs::metadata(path).ok()?;
        if metadata.len() > MAX_FILE_BYTES && !self.options.force_large {
            return None;
        }

        let bytes = std::fs::read(path).ok()?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        if content.lines().count() > MAX_FILE_LINES && !self.options.force_large {
            return None;
        }

        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Some(SourceFile {
            language: detect_language(path),
            path: path.to_path_buf(),
            rel_path,
            content,
            size: metadata.len(),
            mtime,
        })
    }
}

#[async_trait]
impl Source for CodebaseSource {
    async fn scan(&self) -> Result<Vec<SourceFile>> {
        self.discover()
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
