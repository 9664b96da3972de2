//! End-to-end pipeline tests through the public builder API.
//!
//! Each test assembles a small corpus in a temp directory and drives
//! [`ContextBuilder`] against it with a temp cache, so nothing touches
//! `~/.cache` and no network is involved (keyword ranking only).

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use lmfetch::select::CHUNK_OVERHEAD;
use lmfetch::ContextBuilder;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A Python function of the given name with a recognizable body.
fn py_function(name: &str, lines: usize) -> String {
    let mut s = format!("def {}(user):\n", name);
    for i in 0..lines {
        s.push_str(&format!("    step_{} = process(user, {})\n", i, i));
    }
    s
}

fn builder(corpus: &TempDir, cache: &TempDir, query: &str) -> ContextBuilder {
    ContextBuilder::new(corpus.path().to_str().unwrap(), query)
        .cache_dir(cache.path())
}

#[tokio::test]
async fn exact_name_hit_ranks_first() {
    let corpus = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(corpus.path(), "src/auth.py", &py_function("login", 12));
    write(corpus.path(), "src/util.py", &py_function("format_date", 12));

    let result = builder(&corpus, &cache, "login")
        .budget("50k")
        .build()
        .await
        .unwrap();

    assert!(!result.chunks.is_empty());
    assert_eq!(result.chunks[0].chunk.rel_path, "src/auth.py");
    assert!(result.chunks[0].chunk.content.contains("def login"));

    // In the rendered context the auth chunk comes before anything from
    // util.py.
    let auth_pos = result.context.find("src/auth.py").unwrap();
    if let Some(util_pos) = result.context.find("src/util.py") {
        assert!(auth_pos < util_pos);
    }
}

#[tokio::test]
async fn stopword_only_query_scores_everything_zero() {
    let corpus = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(corpus.path(), "src/auth.py", &py_function("login", 12));
    write(corpus.path(), "src/util.py", &py_function("format_date", 12));

    let result = builder(&corpus, &cache, "how does the code work")
        .build()
        .await
        .unwrap();

    assert!(result.chunks.iter().all(|s| s.score == 0.0));
}

#[tokio::test]
async fn important_term_beats_raw_frequency() {
    let corpus = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(
        corpus.path(),
        "src/runner.ts",
        "export function execute(cmd) {\n  return run(cmd);\n}\n",
    );
    write(
        corpus.path(),
        "docs.md",
        &"execute the plan, execute the tasks, execute everything\n".repeat(30),
    );

    let result = builder(&corpus, &cache, "explain .execute method")
        .build()
        .await
        .unwrap();

    assert_eq!(result.chunks[0].chunk.rel_path, "src/runner.ts");
    assert_eq!(result.chunks[0].chunk.name.as_deref(), Some("execute"));
}

#[tokio::test]
async fn budget_is_never_exceeded() {
    let corpus = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    for i in 0..6 {
        write(
            corpus.path(),
            &format!("src/mod{}.py", i),
            &py_function(&format!("handler_{}", i), 120),
        );
    }

    let budget = 2000usize;
    let result = builder(&corpus, &cache, "handler process user")
        .budget_tokens(budget)
        .build()
        .await
        .unwrap();

    let effective = (budget as f64 * 0.95).floor() as usize;
    let spent: usize = result
        .chunks
        .iter()
        .map(|s| s.chunk.tokens + CHUNK_OVERHEAD)
        .sum();
    assert!(spent <= effective, "spent {} > effective {}", spent, effective);
    assert!(!result.chunks.is_empty());
}

#[tokio::test]
async fn nested_gitignore_is_respected() {
    let corpus = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(corpus.path(), "sub/.gitignore", "secret.txt\n");
    write(corpus.path(), "sub/secret.txt", "token = secret value here\n");
    write(corpus.path(), "secret.txt", "token = secret value here\n");

    let result = builder(&corpus, &cache, "secret token value")
        .build()
        .await
        .unwrap();

    assert!(result.chunks.iter().any(|s| s.chunk.rel_path == "secret.txt"));
    assert!(result.chunks.iter().all(|s| s.chunk.rel_path != "sub/secret.txt"));
    assert!(!result.context.contains("sub/secret.txt"));
}

#[tokio::test]
async fn empty_corpus_yields_well_formed_empty_result() {
    let corpus = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();

    let result = builder(&corpus, &cache, "anything").build().await.unwrap();

    assert_eq!(result.context, "");
    assert!(result.chunks.is_empty());
    assert_eq!(result.tokens, 0);
    assert_eq!(result.files_processed, 0);
    assert_eq!(result.chunks_created, 0);
}

#[tokio::test]
async fn malformed_budget_is_an_error() {
    let corpus = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(corpus.path(), "a.py", "x = 1\n");

    let err = builder(&corpus, &cache, "x")
        .budget("lots")
        .build()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("budget"));
}

#[tokio::test]
async fn missing_root_is_an_error() {
    let cache = TempDir::new().unwrap();
    let result = ContextBuilder::new("/nonexistent/corpus/xyz", "query")
        .cache_dir(cache.path())
        .build()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn chunk_ranges_are_disjoint_per_file() {
    let corpus = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let mut content = String::new();
    for i in 0..8 {
        content.push_str(&py_function(&format!("fn_{}", i), 25));
    }
    write(corpus.path(), "src/big.py", &content);

    let result = builder(&corpus, &cache, "process user step")
        .budget("200k")
        .build()
        .await
        .unwrap();

    let mut by_file: std::collections::HashMap<&str, Vec<(u32, u32)>> =
        std::collections::HashMap::new();
    for s in &result.chunks {
        by_file
            .entry(s.chunk.rel_path.as_str())
            .or_default()
            .push((s.chunk.start_line, s.chunk.end_line));
    }
    for ranges in by_file.values_mut() {
        ranges.sort();
        for pair in ranges.windows(2) {
            assert!(pair[0].1 < pair[1].0, "overlapping ranges: {:?}", pair);
        }
        for (start, end) in ranges.iter() {
            assert!(start <= end);
        }
    }
}

#[tokio::test]
async fn markdown_output_shape() {
    let corpus = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(corpus.path(), "src/auth.py", &py_function("login", 12));

    let result = builder(&corpus, &cache, "login").build().await.unwrap();

    assert!(result.context.contains("## src/auth.py"));
    assert!(result.context.contains("(function: login)"));
    assert!(result.context.contains("```python"));
}

#[tokio::test]
async fn progress_phases_are_reported() {
    let corpus = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(corpus.path(), "src/auth.py", &py_function("login", 12));

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    builder(&corpus, &cache, "login")
        .on_progress(Arc::new(move |m: &str| sink.lock().unwrap().push(m.to_string())))
        .build()
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    for expected in [
        "Discovering files",
        "Analyzing dependencies",
        "Chunking files",
        "Ranking chunks",
        "Computing keyword scores",
        "Selecting best chunks",
        "Formatting context",
    ] {
        assert!(
            seen.iter().any(|m| m == expected),
            "missing progress message {:?} in {:?}",
            expected,
            *seen
        );
    }
    assert!(seen.iter().any(|m| m.starts_with("Found ")));
    assert!(seen.iter().any(|m| m.starts_with("Created ")));
}

#[tokio::test]
async fn include_globs_narrow_the_corpus() {
    let corpus = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(corpus.path(), "src/auth.py", &py_function("login", 12));
    write(corpus.path(), "src/auth.js", "function login(user) { return user; }\n");

    let result = builder(&corpus, &cache, "login")
        .include(["**/*.py"])
        .build()
        .await
        .unwrap();

    assert_eq!(result.files_processed, 1);
    assert!(result.chunks.iter().all(|s| s.chunk.rel_path.ends_with(".py")));
}
