//! Query-independent file importance.
//!
//! A static prior derived from path heuristics (entry points score up,
//! tests and fixtures score down), combined with the import-graph
//! centrality from [`crate::graph`] into one per-file score the hybrid
//! ranker folds into its fusion.

use std::collections::{HashMap, HashSet};

use crate::language::is_markdown;
use crate::models::SourceFile;

/// Weight of the path-heuristic prior in the combined score.
const PRIOR_WEIGHT: f64 = 0.6;
/// Weight of import-graph centrality in the combined score.
const CENTRALITY_WEIGHT: f64 = 0.4;

/// File stems that mark entry points.
const ENTRY_STEMS: &[&str] = &["index", "main", "cli", "app", "server"];

/// Exact basenames that mark entry points or package manifests.
const ENTRY_NAMES: &[&str] = &[
    "__init__.py", "mod.rs", "lib.rs",
    "package.json", "cargo.toml", "pyproject.toml", "go.mod", "setup.py",
];

const IMPORTANT_DIRS: &[&str] = &[
    "src", "lib", "core", "api", "routes", "controllers", "services",
    "models", "components", "hooks", "utils", "helpers",
];

const LOW_VALUE_DIRS: &[&str] = &[
    "test", "tests", "__tests__", "spec", "specs", "e2e", "fixtures",
    "mocks", "stubs", "examples", "docs", "scripts", "tools", "config",
    "configs",
];

/// Path fragments that mark generated/auxiliary files.
const LOW_VALUE_MARKERS: &[&str] = &[
    ".test.", ".spec.", "_test.", "_spec.", ".d.ts", ".config.", ".mock.",
];

/// Heuristic importance of one file, in [0, 1].
pub fn importance_score(rel_path: &str, language: &str) -> f64 {
    let mut score: f64 = 0.5;

    let components: Vec<&str> = rel_path.split('/').collect();
    let basename = components.last().copied().unwrap_or(rel_path);
    let basename_lower = basename.to_ascii_lowercase();
    let dirs = &components[..components.len().saturating_sub(1)];

    let stem = basename_lower.split('.').next().unwrap_or(&basename_lower);
    if ENTRY_STEMS.contains(&stem) || ENTRY_NAMES.contains(&basename_lower.as_str()) {
        score += 0.3;
    }

    if dirs.iter().any(|d| IMPORTANT_DIRS.contains(&d.to_ascii_lowercase().as_str())) {
        score += 0.1;
    }
    if dirs.iter().any(|d| LOW_VALUE_DIRS.contains(&d.to_ascii_lowercase().as_str())) {
        score -= 0.2;
    }

    let path_lower = rel_path.to_ascii_lowercase();
    if LOW_VALUE_MARKERS.iter().any(|m| path_lower.contains(m)) {
        score -= 0.15;
    }

    let depth = dirs.len();
    if depth > 3 {
        score -= 0.05 * (depth as f64 - 3.0);
    }
    if depth == 0 {
        score += 0.1;
    }

    if is_markdown(language) {
        score -= 0.1;
    } else if language == "json" || language == "yaml" {
        score -= 0.05;
    }

    score.clamp(0.0, 1.0)
}

/// Combined file score: `0.6 · prior + 0.4 · centrality` over the union of
/// discovered files and centrality keys. A path missing on either side
/// contributes a neutral 0.5 for that side.
pub fn combined_scores(
    files: &[SourceFile],
    centrality: &HashMap<String, f64>,
) -> HashMap<String, f64> {
    let priors: HashMap<&str, f64> = files
        .iter()
        .map(|f| (f.rel_path.as_str(), importance_score(&f.rel_path, &f.language)))
        .collect();

    let keys: HashSet<&str> = priors
        .keys()
        .copied()
        .chain(centrality.keys().map(|k| k.as_str()))
        .collect();

    keys.into_iter()
        .map(|path| {
            let prior = priors.get(path).copied().unwrap_or(0.5);
            let central = centrality.get(path).copied().unwrap_or(0.5);
            (path.to_string(), PRIOR_WEIGHT * prior + CENTRALITY_WEIGHT * central)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn entry_points_score_high() {
        assert!(importance_score("src/main.rs", "rust") > importance_score("src/other.rs", "rust"));
        assert!(importance_score("src/index.ts", "typescript") > 0.5);
        assert!(importance_score("pkg/__init__.py", "python") > 0.5);
        assert!(importance_score("Cargo.toml", "toml") > 0.5);
    }

    #[test]
    fn tests_and_fixtures_score_low() {
        assert!(importance_score("tests/test_auth.py", "python") < 0.5);
        assert!(importance_score("src/auth.test.ts", "typescript") < importance_score("src/auth.ts", "typescript"));
        assert!(importance_score("types/api.d.ts", "typescript") < 0.5);
    }

    #[test]
    fn deep_nesting_is_penalized_and_root_boosted() {
        let root = importance_score("readme.txt", "text");
        let shallow = importance_score("a/readme.txt", "text");
        let deep = importance_score("a/b/c/d/e/readme.txt", "text");
        assert!(root > shallow);
        assert!(shallow > deep);
    }

    #[test]
    fn markdown_and_data_formats_are_penalized() {
        assert!(importance_score("guide.md", "markdown") < importance_score("guide.rst", "rst"));
        assert!(importance_score("data.json", "json") < importance_score("data.rst", "rst"));
    }

    #[test]
    fn scores_are_clamped() {
        // Pile every penalty onto one path; the score must not go negative.
        let s = importance_score("tests/a/b/c/d/e/f/fixture.test.json", "json");
        assert!((0.0..=1.0).contains(&s));
        // Pile every boost: must not exceed 1.
        let s = importance_score("main.rs", "rust");
        assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn combined_defaults_missing_sides_to_neutral() {
        let files = vec![SourceFile {
            path: PathBuf::from("/r/src/a.py"),
            rel_path: "src/a.py".to_string(),
            content: String::new(),
            language: "python".to_string(),
            size: 0,
            mtime: 0,
        }];
        let mut centrality = HashMap::new();
        centrality.insert("ghost.py".to_string(), 1.0);

        let combined = combined_scores(&files, &centrality);

        // src/a.py has a prior but no centrality entry.
        let prior = importance_score("src/a.py", "python");
        assert!((combined["src/a.py"] - (0.6 * prior + 0.4 * 0.5)).abs() < 1e-9);
        // ghost.py has centrality but no prior.
        assert!((combined["ghost.py"] - (0.6 * 0.5 + 0.4 * 1.0)).abs() < 1e-9);
    }
}
