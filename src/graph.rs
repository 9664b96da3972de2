//! Import graph construction and centrality.
//!
//! Builds a directed graph of local imports by regex-scanning each file for
//! language-specific import statements. References to external modules are
//! ignored; relative references are resolved lexically against the
//! importing file's directory, trying per-language extension candidates and
//! `index.*` / `__init__.py` fallbacks. No cross-file symbol binding is
//! attempted.
//!
//! Centrality over the graph is a simplified PageRank: files imported by
//! many well-connected files float to the top. Cycles need no special
//! handling — the power iteration converges on any non-negative adjacency.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::SourceFile;

/// PageRank damping factor.
const DAMPING: f64 = 0.85;
/// Fixed iteration count; enough for ranking stability at corpus sizes
/// this tool sees.
const ITERATIONS: usize = 10;

/// Forward and inverse import maps over relative paths of discovered files.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// path → paths it imports.
    pub imports: HashMap<String, Vec<String>>,
    /// path → paths that import it.
    pub imported_by: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Scan every file and resolve its imports against the discovered set.
    pub fn build(files: &[SourceFile]) -> Self {
        let known: HashMap<&str, ()> = files.iter().map(|f| (f.rel_path.as_str(), ())).collect();

        let mut imports: HashMap<String, Vec<String>> = HashMap::new();
        let mut imported_by: HashMap<String, Vec<String>> = HashMap::new();
        for file in files {
            imports.entry(file.rel_path.clone()).or_default();
            imported_by.entry(file.rel_path.clone()).or_default();
        }

        for file in files {
            for reference in extract_imports(&file.content, &file.language) {
                let resolved = resolve_import(&reference, &file.rel_path, &file.language)
                    .into_iter()
                    .find(|candidate| known.contains_key(candidate.as_str()));

                if let Some(target) = resolved {
                    if target == file.rel_path {
                        continue;
                    }
                    let entry = imports.entry(file.rel_path.clone()).or_default();
                    if !entry.contains(&target) {
                        entry.push(target.clone());
                        imported_by.entry(target).or_default().push(file.rel_path.clone());
                    }
                }
            }
        }

        Self { imports, imported_by }
    }

    /// Simplified PageRank, normalized so the best-connected file scores 1.0.
    ///
    /// `score(p) = (1 − d) + d · Σ score(q) / out_degree(q)` over importers
    /// `q`, run for a fixed number of iterations from a uniform start.
    pub fn centrality(&self) -> HashMap<String, f64> {
        if self.imports.is_empty() {
            return HashMap::new();
        }

        let mut scores: HashMap<&str, f64> =
            self.imports.keys().map(|p| (p.as_str(), 1.0)).collect();

        for _ in 0..ITERATIONS {
            let mut next: HashMap<&str, f64> = HashMap::with_capacity(scores.len());
            for path in self.imports.keys() {
                let incoming: f64 = self
                    .imported_by
                    .get(path)
                    .map(|importers| {
                        importers
                            .iter()
                            .map(|q| {
                                let out = self.imports.get(q).map(|v| v.len()).unwrap_or(0);
                                if out == 0 {
                                    0.0
                                } else {
                                    scores.get(q.as_str()).copied().unwrap_or(0.0) / out as f64
                                }
                            })
                            .sum()
                    })
                    .unwrap_or(0.0);
                next.insert(path.as_str(), (1.0 - DAMPING) + DAMPING * incoming);
            }
            scores = next;
        }

        let max = scores.values().cloned().fold(f64::MIN, f64::max);
        if max <= 0.0 {
            return scores.into_iter().map(|(k, _)| (k.to_string(), 0.0)).collect();
        }
        scores
            .into_iter()
            .map(|(k, v)| (k.to_string(), v / max))
            .collect()
    }
}

/// One raw import reference found in a file.
#[derive(Debug, PartialEq)]
struct ImportRef {
    module: String,
    /// Leading-dot count for Python relative imports; 0 otherwise.
    dots: usize,
}

mod patterns {
    use super::*;

    pub static PY_FROM: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^from\s+(\.*)([\w.]*)\s+import\b").expect("valid regex"));
    pub static PY_IMPORT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^import\s+([\w.]+)").expect("valid regex"));

    pub static JS_FROM: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"^import\s+.*?\s+from\s+['"]([^'"]+)['"]"#).expect("valid regex"));
    pub static JS_BARE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"^import\s+['"]([^'"]+)['"]"#).expect("valid regex"));
    pub static JS_REQUIRE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid regex"));
    pub static JS_DYNAMIC: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"import\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid regex"));

    pub static GO_IMPORT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"^(?:import\s+)?"([^"]+)"$"#).expect("valid regex"));

    pub static RUST_USE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(?:pub\s+)?use\s+([\w:]+)").expect("valid regex"));
    pub static RUST_MOD: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(?:pub\s+)?mod\s+(\w+)\s*;").expect("valid regex"));

    pub static RB_REQUIRE_REL: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"^require_relative\s+['"]([^'"]+)['"]"#).expect("valid regex"));
    pub static RB_REQUIRE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"^require\s+['"]([^'"]+)['"]"#).expect("valid regex"));
}

fn extract_imports(content: &str, language: &str) -> Vec<ImportRef> {
    let mut refs = Vec::new();
    for raw_line in content.lines() {
        let line = raw_line.trim();
        match language {
            "python" => {
                if let Some(caps) = patterns::PY_FROM.captures(line) {
                    refs.push(ImportRef {
                        module: caps[2].to_string(),
                        dots: caps[1].len(),
                    });
                } else if let Some(caps) = patterns::PY_IMPORT.captures(line) {
                    refs.push(ImportRef {
                        module: caps[1].to_string(),
                        dots: 0,
                    });
                }
            }
            "javascript" | "typescript" | "jsx" | "tsx" => {
                for re in [
                    &patterns::JS_FROM,
                    &patterns::JS_BARE,
                    &patterns::JS_REQUIRE,
                    &patterns::JS_DYNAMIC,
                ] {
                    if let Some(caps) = re.captures(line) {
                        refs.push(ImportRef {
                            module: caps[1].to_string(),
                            dots: 0,
                        });
                        break;
                    }
                }
            }
            "go" => {
                if let Some(caps) = patterns::GO_IMPORT.captures(line) {
                    refs.push(ImportRef {
                        module: caps[1].to_string(),
                        dots: 0,
                    });
                }
            }
            "rust" => {
                if let Some(caps) = patterns::RUST_MOD.captures(line) {
                    refs.push(ImportRef {
                        module: caps[1].to_string(),
                        dots: 0,
                    });
                } else if let Some(caps) = patterns::RUST_USE.captures(line) {
                    refs.push(ImportRef {
                        module: caps[1].to_string(),
                        dots: 0,
                    });
                }
            }
            "ruby" => {
                if let Some(caps) = patterns::RB_REQUIRE_REL.captures(line) {
                    refs.push(ImportRef {
                        module: caps[1].to_string(),
                        dots: 1,
                    });
                } else if let Some(caps) = patterns::RB_REQUIRE.captures(line) {
                    refs.push(ImportRef {
                        module: caps[1].to_string(),
                        dots: 0,
                    });
                }
            }
            _ => {}
        }
    }
    refs
}

/// Candidate relative paths for one import, most specific first. Candidates
/// are matched against the discovered file set by the caller; anything that
/// resolves nowhere (external packages, std modules) simply drops out.
fn resolve_import(reference: &ImportRef, source_rel: &str, language: &str) -> Vec<String> {
    let source_dir = match source_rel.rfind('/') {
        Some(idx) => &source_rel[..idx],
        None => "",
    };

    let mut candidates = Vec::new();

    match language {
        "python" => {
            let module_path = reference.module.replace('.', "/");
            let base = if reference.dots > 0 {
                // One dot anchors at the file's package; each further dot
                // climbs one level.
                let mut dir = source_dir.to_string();
                for _ in 1..reference.dots {
                    dir = match dir.rfind('/') {
                        Some(idx) => dir[..idx].to_string(),
                        None => String::new(),
                    };
                }
                dir
            } else {
                String::new()
            };
            let prefix = if base.is_empty() {
                module_path.clone()
            } else if module_path.is_empty() {
                base.clone()
            } else {
                format!("{}/{}", base, module_path)
            };
            candidates.push(format!("{}.py", prefix));
            candidates.push(format!("{}/__init__.py", prefix));
        }
        "javascript" | "typescript" | "jsx" | "tsx" => {
            if !reference.module.starts_with('.') {
                return Vec::new(); // package import
            }
            let joined = join_relative(source_dir, &reference.module);
            candidates.push(joined.clone());
            for ext in ["ts", "tsx", "js", "jsx", "mjs", "cjs"] {
                candidates.push(format!("{}.{}", joined, ext));
            }
            for index in ["index.ts", "index.tsx", "index.js", "index.jsx"] {
                candidates.push(format!("{}/{}", joined, index));
            }
        }
        "go" => {
            // Go import paths name packages, not files; nothing lexical to
            // resolve inside a single corpus.
            return Vec::new();
        }
        "rust" => {
            let segments: Vec<&str> = reference
                .module
                .split("::")
                .filter(|s| !s.is_empty())
                .collect();
            match segments.first().copied() {
                Some("crate") => {
                    let rest = segments[1..].join("/");
                    if !rest.is_empty() {
                        candidates.push(format!("src/{}.rs", rest));
                        candidates.push(format!("src/{}/mod.rs", rest));
                        // Also try module paths that drop a trailing item name.
                        if segments.len() > 2 {
                            let parent = segments[1..segments.len() - 1].join("/");
                            candidates.push(format!("src/{}.rs", parent));
                            candidates.push(format!("src/{}/mod.rs", parent));
                        }
                    }
                }
                Some("self") | Some("super") | Some("std") | Some("core") | Some("alloc") => {}
                Some(first) if segments.len() == 1 => {
                    // `mod name;` — a sibling file or directory module.
                    candidates.push(join_relative(source_dir, &format!("./{}.rs", first)));
                    candidates.push(join_relative(source_dir, &format!("./{}/mod.rs", first)));
                }
                _ => {}
            }
        }
        "ruby" => {
            let module = reference.module.trim_end_matches(".rb");
            let base = if reference.dots > 0 {
                join_relative(source_dir, &format!("./{}", module))
            } else {
                module.to_string()
            };
            candidates.push(format!("{}.rb", base));
        }
        _ => {}
    }

    candidates
}

/// Join a relative module specifier (`./x`, `../y/z`) onto a directory and
/// normalize `.` / `..` components lexically.
fn join_relative(source_dir: &str, module: &str) -> String {
    let mut parts: Vec<&str> = if source_dir.is_empty() {
        Vec::new()
    } else {
        source_dir.split('/').collect()
    };

    for segment in module.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
