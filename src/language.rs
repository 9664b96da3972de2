//! Language detection from file extensions.
//!
//! A fixed mapping from the path's final extension to a language tag. The
//! tag selects the chunker's boundary pattern set and the import patterns
//! of the dependency analyzer, and is emitted in the formatted output as
//! the fenced-code-block language. Unknown extensions map to `"text"`.

use std::path::Path;

/// Language tag for unknown extensions.
pub const TEXT: &str = "text";

/// Map a path to its language tag by extension (case-insensitive).
pub fn detect_language(path: &Path) -> String {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(e) => e.to_ascii_lowercase(),
        None => return TEXT.to_string(),
    };

    let tag = match ext.as_str() {
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "mts" | "cts" => "typescript",
        "jsx" => "jsx",
        "tsx" => "tsx",
        "vue" => "vue",
        "svelte" => "svelte",
        "go" => "go",
        "rs" => "rust",
        "rb" => "ruby",
        "php" => "php",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "swift" => "swift",
        "cs" => "csharp",
        "fs" => "fsharp",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => "cpp",
        "m" => "objc",
        "sh" | "bash" => "bash",
        "zsh" => "zsh",
        "sql" => "sql",
        "graphql" | "gql" => "graphql",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "less" => "less",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "md" | "markdown" => "markdown",
        "mdx" => "mdx",
        "rst" => "rst",
        "tf" => "terraform",
        "dockerfile" => "dockerfile",
        _ => TEXT,
    };
    tag.to_string()
}

/// Whether a language tag is a markdown flavor (penalized during ranking).
pub fn is_markdown(language: &str) -> bool {
    language == "markdown" || language == "mdx"
}
