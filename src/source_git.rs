//! GitHub repository source.
//!
//! A remote source is a local source after a preparation step: the repo is
//! shallow-cloned into `~/.cache/lmfetch/repos/<owner>/<repo>` on first use
//! and refreshed with `git pull` when the checkout is more than an hour
//! old. Scanning then delegates to [`CodebaseSource`] over the checkout
//! (or a subpath of it), with every relative path prefixed by
//! `<owner>/<repo>/` so output stays attributable.
//!
//! Pull failures are non-fatal: a stale checkout still serves. A failed
//! initial clone is fatal — there is no corpus without it.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

use crate::cache::cache_root;
use crate::models::SourceFile;
use crate::source::{ScanOptions, Source};
use crate::source_fs::CodebaseSource;

/// Seconds before an existing checkout is refreshed.
const REFRESH_TTL_SECS: u64 = 3600;

static GITHUB_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.)?github\.com/([^/\s]+)/([^/\s]+?)(?:\.git)?(?:/(?:tree|blob)/[^/\s]+(?:/(.+))?)?/?$",
    )
    .expect("valid GitHub URL regex")
});

/// Parse a GitHub URL into `(owner, repo, subpath)`.
///
/// Accepts plain repo URLs and `/tree/<ref>/<path>` / `/blob/<ref>/<path>`
/// deep links. Returns `None` for anything that is not a GitHub URL, which
/// is how the builder decides between local and remote sources.
pub fn parse_github_url(url: &str) -> Option<(String, String, Option<String>)> {
    let caps = GITHUB_URL_RE.captures(url.trim().trim_end_matches('/'))?;
    let owner = caps[1].to_string();
    let repo = caps[2].to_string();
    let subpath = caps.get(3).map(|m| m.as_str().trim_end_matches('/').to_string());
    Some((owner, repo, subpath))
}

/// Scans a GitHub repository through a cached local checkout.
pub struct GitHubSource {
    owner: String,
    repo: String,
    subpath: Option<String>,
    options: ScanOptions,
    /// Overrides `~/.cache/lmfetch` (tests point this at a temp dir).
    cache_dir: Option<PathBuf>,
}

impl GitHubSource {
    pub fn new(url: &str, options: ScanOptions) -> Result<Self> {
        let (owner, repo, subpath) =
            parse_github_url(url).ok_or_else(|| anyhow::anyhow!("invalid GitHub URL: {}", url))?;
        Ok(Self {
            owner,
            repo,
            subpath,
            options,
            cache_dir: None,
        })
    }

    #[cfg(test)]
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    fn clone_url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.owner, self.repo)
    }

    fn checkout_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(cache_root)
            .join("repos")
            .join(&self.owner)
            .join(&self.repo)
    }

    /// Clone on first use; refresh an existing checkout past the TTL.
    async fn prepare(&self) -> Result<PathBuf> {
        let checkout = self.checkout_dir();

        if checkout.join(".git").exists() {
            if checkout_age_secs(&checkout) > REFRESH_TTL_SECS {
                // Best effort: a detached head or offline machine should
                // not prevent serving the cached checkout.
                let _ = Command::new("git")
                    .args(["pull", "--ff-only"])
                    .current_dir(&checkout)
                    .output()
                    .await;
            }
        } else {
            let parent = checkout.parent().expect("checkout dir has a parent");
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;

            let output = Command::new("git")
                .args(["clone", "--depth", "1", "--single-branch"])
                .arg(self.clone_url())
                .arg(&checkout)
                .output()
                .await
                .context("failed to execute 'git clone'; is git installed?")?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                bail!("git clone failed for {}: {}", self.clone_url(), stderr.trim());
            }
        }

        Ok(checkout)
    }
}

/// Age of a checkout, judged by the mtime of `.git/HEAD`.
fn checkout_age_secs(checkout: &std::path::Path) -> u64 {
    let head = checkout.join(".git").join("HEAD");
    let modified = match std::fs::metadata(&head).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return u64::MAX,
    };
    std::time::SystemTime::now()
        .duration_since(modified)
        .map(|d| d.as_secs())
        .unwrap_or(u64::MAX)
}

#[async_trait]
impl Source for GitHubSource {
    async fn scan(&self) -> Result<Vec<SourceFile>> {
        let checkout = self.prepare().await?;

        let scan_root = match &self.subpath {
            Some(sub) => checkout.join(sub),
            None => checkout,
        };
        if !scan_root.is_dir() {
            bail!(
                "subpath '{}' does not exist in {}/{}",
                self.subpath.as_deref().unwrap_or(""),
                self.owner,
                self.repo
            );
        }

        let local = CodebaseSource::new(scan_root, self.options.clone());
        let mut files = local.scan().await?;

        let prefix = format!("{}/{}", self.owner, self.repo);
        for file in &mut files {
            file.rel_path = format!("{}/{}", prefix, file.rel_path);
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_repo_urls() {
        let (owner, repo, sub) = parse_github_url("https://github.com/rust-lang/cargo").unwrap();
        assert_eq!(owner, "rust-lang");
        assert_eq!(repo, "cargo");
        assert!(sub.is_none());
    }

    #[test]
    fn parses_git_suffix_and_bare_host() {
        let (owner, repo, _) = parse_github_url("github.com/serde-rs/serde.git").unwrap();
        assert_eq!(owner, "serde-rs");
        assert_eq!(repo, "serde");
    }

    #[test]
    fn parses_tree_links_with_subpath() {
        let (owner, repo, sub) =
            parse_github_url("https://github.com/tokio-rs/tokio/tree/master/tokio/src").unwrap();
        assert_eq!(owner, "tokio-rs");
        assert_eq!(repo, "tokio");
        assert_eq!(sub.as_deref(), Some("tokio/src"));
    }

    #[test]
    fn rejects_non_github_urls() {
        assert!(parse_github_url("https://gitlab.com/a/b").is_none());
        assert!(parse_github_url("./local/dir").is_none());
        assert!(parse_github_url("/tmp/repo").is_none());
    }

    #[tokio::test]
    async fn existing_checkout_is_scanned_without_git() {
        // A pre-populated checkout with a fresh .git/HEAD must be served
        // as-is: no network, no subprocess.
        let tmp = tempfile::TempDir::new().unwrap();
        let checkout = tmp.path().join("repos/acme/widgets");
        std::fs::create_dir_all(checkout.join(".git")).unwrap();
        std::fs::write(checkout.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        std::fs::write(checkout.join("main.py"), "def run():\n    pass\n").unwrap();

        let source = GitHubSource::new("https://github.com/acme/widgets", ScanOptions::default())
            .unwrap()
            .with_cache_dir(tmp.path().to_path_buf());

        let files = source.scan().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, "acme/widgets/main.py");
    }
}
