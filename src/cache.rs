//! Persistent chunk cache.
//!
//! Chunking is pure CPU but not free; the cache makes repeated runs over
//! the same corpus cheap by persisting each file's chunk list, keyed on
//! path + mtime. Freshness is gated on mtime alone: a stored row with
//! `mtime >= <current mtime>` and at least one chunk row is a hit. The
//! content hash is written on every upsert but not consulted during reads.
//!
//! # Schema
//!
//! ```text
//! ┌────────────────┐      ┌────────────────┐
//! │     files      │──┐   │     chunks     │
//! │                │  │   │                │
//! │ path (PK)      │  └───│ file_path (FK) │ ON DELETE CASCADE
//! │ content_hash   │      │ id (PK)        │
//! │ mtime          │      │ content        │
//! │ size           │      │ start_line     │
//! │ last_accessed  │      │ end_line       │
//! │ language       │      │ kind           │
//! └────────────────┘      │ name           │
//!                         └────────────────┘
//! ```
//!
//! Rows unused for 30 days are pruned; the cascade keeps chunks free of
//! orphans. All writes are single statements or single transactions, so a
//! failure mid-run leaves the database consistent.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::models::{Chunk, ChunkKind};

/// Days a file row survives without being accessed.
const PRUNE_TTL_DAYS: i64 = 30;

/// Root of all persisted state: `$HOME/.cache/lmfetch`.
pub fn cache_root() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cache")
        .join("lmfetch")
}

/// A chunk row as stored, without the per-run file context.
#[derive(Debug, Clone)]
pub struct CachedChunk {
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
    pub kind: ChunkKind,
    pub name: Option<String>,
}

/// Handle to the cache database. One active session per cache file.
pub struct ChunkCache {
    pool: SqlitePool,
}

impl ChunkCache {
    /// Open (creating if needed) the cache at `db_path` and ensure the
    /// schema exists. Opening is fatal on failure: without a consistent
    /// cache the pipeline does not run.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open chunk cache at {}", db_path.display()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                path TEXT PRIMARY KEY,
                content_hash TEXT NOT NULL,
                mtime INTEGER NOT NULL,
                size INTEGER NOT NULL,
                last_accessed INTEGER NOT NULL,
                language TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path TEXT NOT NULL REFERENCES files(path) ON DELETE CASCADE,
                content TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                kind TEXT NOT NULL,
                name TEXT
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_file_path ON chunks(file_path)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Whether `path` has chunks at least as fresh as `mtime`. A hit bumps
    /// the row's `last_accessed` so prune sees it as live.
    pub async fn has_fresh_chunks(&self, path: &str, mtime: i64) -> Result<bool> {
        let fresh: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM files f
            WHERE f.path = ? AND f.mtime >= ?
              AND EXISTS (SELECT 1 FROM chunks c WHERE c.file_path = f.path)
            "#,
        )
        .bind(path)
        .bind(mtime)
        .fetch_optional(&self.pool)
        .await?;

        if fresh.is_some() {
            let now = chrono::Utc::now().timestamp();
            sqlx::query("UPDATE files SET last_accessed = ? WHERE path = ?")
                .bind(now)
                .bind(path)
                .execute(&self.pool)
                .await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// All chunk rows for `path`, in ascending line order.
    pub async fn get_chunks(&self, path: &str) -> Result<Vec<CachedChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT content, start_line, end_line, kind, name
            FROM chunks WHERE file_path = ?
            ORDER BY start_line
            "#,
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await?;

        let mut chunks = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.get("kind");
            chunks.push(CachedChunk {
                content: row.get("content"),
                start_line: row.get::<i64, _>("start_line") as u32,
                end_line: row.get::<i64, _>("end_line") as u32,
                kind: kind.parse()?,
                name: row.get("name"),
            });
        }
        Ok(chunks)
    }

    /// Upsert the file row for `path`, hashing the content for later
    /// verification.
    pub async fn put_file(
        &self,
        path: &str,
        content: &str,
        mtime: i64,
        size: u64,
        language: &str,
    ) -> Result<()> {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let content_hash = format!("{:x}", hasher.finalize());
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO files (path, content_hash, mtime, size, last_accessed, language)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                content_hash = excluded.content_hash,
                mtime = excluded.mtime,
                size = excluded.size,
                last_accessed = excluded.last_accessed,
                language = excluded.language
            "#,
        )
        .bind(path)
        .bind(content_hash)
        .bind(mtime)
        .bind(size as i64)
        .bind(now)
        .bind(language)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replace all chunks for `path` atomically.
    pub async fn put_chunks(&self, path: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE file_path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (file_path, content, start_line, end_line, kind, name)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(path)
            .bind(&chunk.content)
            .bind(chunk.start_line as i64)
            .bind(chunk.end_line as i64)
            .bind(chunk.kind.as_str())
            .bind(&chunk.name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete file rows not accessed for 30 days; the cascade removes
    /// their chunks. Running prune twice in a row is a no-op.
    pub async fn prune(&self) -> Result<u64> {
        let cutoff = chrono::Utc::now().timestamp() - PRUNE_TTL_DAYS * 86_400;
        let result = sqlx::query("DELETE FROM files WHERE last_accessed < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Empty both relations.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM chunks").execute(&self.pool).await?;
        sqlx::query("DELETE FROM files").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
