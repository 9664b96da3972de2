//! Language-aware heuristic chunker.
//!
//! Splits a file into contiguous, non-overlapping chunks along construct
//! boundaries (functions, classes, types, ...). Boundary detection is a
//! fixed, ordered list of line-anchored regex patterns per language; the
//! first pattern that matches a line wins. Files in languages without a
//! pattern set, and files where no boundary matches, fall back to
//! fixed-size section chunking.
//!
//! Regex boundary detection is deliberately coarse: it is cheap, extensible
//! to new languages by adding patterns, and preserves the property retrieval
//! needs — a whole function is returned, not half of one.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Chunk, ChunkKind, SourceFile};
use crate::tokens::count_tokens;

/// Candidates shorter than this are dropped (unless they are the only one).
pub const MIN_CHUNK_LINES: usize = 10;
/// Candidates longer than this are split into consecutive slices.
pub const MAX_CHUNK_LINES: usize = 200;

/// One boundary pattern: a line-anchored regex, the construct kind it
/// detects, and (via capture group 1) the construct name.
struct BoundaryPattern {
    re: Regex,
    kind: ChunkKind,
}

fn pat(re: &str, kind: ChunkKind) -> BoundaryPattern {
    BoundaryPattern {
        re: Regex::new(re).expect("valid boundary pattern"),
        kind,
    }
}

fn js_patterns() -> Vec<BoundaryPattern> {
    vec![
        pat(
            r"^(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(\w+)",
            ChunkKind::Function,
        ),
        pat(r"^(?:export\s+)?(?:default\s+)?class\s+(\w+)", ChunkKind::Class),
        pat(
            r"^(?:export\s+)?const\s+(\w+)\s*=\s*(?:async\s*)?(?:\(|function\b|\w+\s*=>)",
            ChunkKind::Function,
        ),
        pat(r"^(?:export\s+)?const\s+([A-Z][A-Z0-9_]*)\s*=", ChunkKind::Constant),
    ]
}

fn ts_patterns() -> Vec<BoundaryPattern> {
    let mut patterns = vec![
        pat(r"^(?:export\s+)?(?:declare\s+)?interface\s+(\w+)", ChunkKind::Interface),
        pat(r"^(?:export\s+)?(?:declare\s+)?type\s+(\w+)", ChunkKind::Type),
        pat(r"^(?:export\s+)?(?:declare\s+)?(?:const\s+)?enum\s+(\w+)", ChunkKind::Enum),
        pat(r"^(?:export\s+)?(?:declare\s+)?namespace\s+(\w+)", ChunkKind::Module),
    ];
    patterns.extend(js_patterns());
    patterns
}

fn c_patterns() -> Vec<BoundaryPattern> {
    vec![
        pat(r"^(?:typedef\s+)?struct\s+(\w+)", ChunkKind::Class),
        pat(r"^(?:typedef\s+)?enum\s+(\w+)", ChunkKind::Enum),
        pat(r"^(?:typedef\s+)?union\s+(\w+)", ChunkKind::Type),
        pat(r"^#define\s+(\w+)", ChunkKind::Constant),
        // Function definitions: a return type followed by a name and an
        // argument list that does not end in ';' on the same line.
        pat(
            r"^(?:static\s+|inline\s+|extern\s+)*[A-Za-z_][\w\s\*]*?[\s\*](\w+)\s*\([^;]*$",
            ChunkKind::Function,
        ),
    ]
}

/// Boundary pattern sets, keyed by language tag. Order within each set
/// matters: the first match on a line wins.
static PATTERN_SETS: Lazy<HashMap<&'static str, Vec<BoundaryPattern>>> = Lazy::new(|| {
    let mut sets: HashMap<&'static str, Vec<BoundaryPattern>> = HashMap::new();

    sets.insert(
        "python",
        vec![
            pat(r"^(?:async\s+)?def\s+(\w+)", ChunkKind::Function),
            pat(r"^class\s+(\w+)", ChunkKind::Class),
        ],
    );

    sets.insert("javascript", js_patterns());
    sets.insert("jsx", js_patterns());
    sets.insert("typescript", ts_patterns());
    sets.insert("tsx", ts_patterns());

    sets.insert(
        "go",
        vec![
            pat(r"^func\s+\([^)]+\)\s+(\w+)", ChunkKind::Method),
            pat(r"^func\s+(\w+)", ChunkKind::Function),
            pat(r"^type\s+(\w+)\s+struct\b", ChunkKind::Class),
            pat(r"^type\s+(\w+)\s+interface\b", ChunkKind::Interface),
            pat(r"^type\s+(\w+)", ChunkKind::Type),
            pat(r"^const\s+(\w+)", ChunkKind::Constant),
            pat(r"^var\s+(\w+)", ChunkKind::Variable),
        ],
    );

    sets.insert(
        "rust",
        vec![
            pat(
                r"^(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+(\w+)",
                ChunkKind::Function,
            ),
            pat(r"^(?:pub(?:\([^)]*\))?\s+)?struct\s+(\w+)", ChunkKind::Class),
            pat(r"^(?:pub(?:\([^)]*\))?\s+)?enum\s+(\w+)", ChunkKind::Enum),
            pat(r"^(?:pub(?:\([^)]*\))?\s+)?trait\s+(\w+)", ChunkKind::Interface),
            pat(
                r"^impl(?:<[^>]*>)?\s+(?:[\w:]+(?:<[^>]*>)?\s+for\s+)?([\w:]+)",
                ChunkKind::Class,
            ),
            pat(r"^(?:pub(?:\([^)]*\))?\s+)?mod\s+(\w+)", ChunkKind::Module),
            pat(r"^(?:pub(?:\([^)]*\))?\s+)?type\s+(\w+)", ChunkKind::Type),
            pat(r"^(?:pub(?:\([^)]*\))?\s+)?const\s+(\w+)", ChunkKind::Constant),
            pat(r"^(?:pub(?:\([^)]*\))?\s+)?static\s+(\w+)", ChunkKind::Variable),
        ],
    );

    sets.insert(
        "ruby",
        vec![
            pat(r"^def\s+(?:self\.)?([\w?!]+)", ChunkKind::Method),
            pat(r"^class\s+(\w+)", ChunkKind::Class),
            pat(r"^module\s+(\w+)", ChunkKind::Module),
        ],
    );

    sets.insert(
        "php",
        vec![
            pat(
                r"^(?:(?:public|private|protected|static|final|abstract)\s+)*function\s+(\w+)",
                ChunkKind::Function,
            ),
            pat(r"^(?:final\s+|abstract\s+)?class\s+(\w+)", ChunkKind::Class),
            pat(r"^interface\s+(\w+)", ChunkKind::Interface),
            pat(r"^trait\s+(\w+)", ChunkKind::Interface),
            pat(r"^enum\s+(\w+)", ChunkKind::Enum),
        ],
    );

    sets.insert(
        "java",
        vec![
            pat(
                r"^(?:(?:public|private|protected|static|final|abstract)\s+)*class\s+(\w+)",
                ChunkKind::Class,
            ),
            pat(
                r"^(?:(?:public|private|protected|static)\s+)*interface\s+(\w+)",
                ChunkKind::Interface,
            ),
            pat(r"^(?:(?:public|private|protected)\s+)*enum\s+(\w+)", ChunkKind::Enum),
            pat(
                r"^(?:(?:public|private|protected|static|final|abstract|synchronized)\s+)+[\w<>\[\],\s]+\s+(\w+)\s*\(",
                ChunkKind::Method,
            ),
        ],
    );

    sets.insert(
        "kotlin",
        vec![
            pat(
                r"^(?:(?:public|private|internal|protected)\s+)?enum\s+class\s+(\w+)",
                ChunkKind::Enum,
            ),
            pat(
                r"^(?:(?:public|private|internal|protected|open|abstract|final|sealed|data|annotation|inner)\s+)*class\s+(\w+)",
                ChunkKind::Class,
            ),
            pat(
                r"^(?:(?:public|private|internal|protected)\s+)?interface\s+(\w+)",
                ChunkKind::Interface,
            ),
            pat(
                r"^(?:(?:public|private|internal|protected)\s+)?object\s+(\w+)",
                ChunkKind::Module,
            ),
            pat(
                r"^(?:(?:public|private|internal|protected|open|override|suspend|inline|operator|infix|tailrec)\s+)*fun\s+(?:<[^>]*>\s+)?(\w+)",
                ChunkKind::Function,
            ),
        ],
    );

    sets.insert(
        "scala",
        vec![
            pat(
                r"^(?:(?:final|abstract|sealed|implicit|private|protected)\s+)*(?:case\s+)?class\s+(\w+)",
                ChunkKind::Class,
            ),
            pat(
                r"^(?:(?:final|private|protected)\s+)*(?:case\s+)?object\s+(\w+)",
                ChunkKind::Module,
            ),
            pat(
                r"^(?:(?:sealed|private|protected)\s+)*trait\s+(\w+)",
                ChunkKind::Interface,
            ),
            pat(
                r"^(?:(?:override|private|protected|implicit|final)\s+)*def\s+(\w+)",
                ChunkKind::Function,
            ),
        ],
    );

    sets.insert(
        "swift",
        vec![
            pat(
                r"^(?:(?:public|private|internal|fileprivate|open|static|final|override)\s+)*func\s+(\w+)",
                ChunkKind::Function,
            ),
            pat(
                r"^(?:(?:public|private|internal|fileprivate|open|final)\s+)*class\s+(\w+)",
                ChunkKind::Class,
            ),
            pat(
                r"^(?:(?:public|private|internal|fileprivate)\s+)*struct\s+(\w+)",
                ChunkKind::Class,
            ),
            pat(
                r"^(?:(?:public|private|internal|fileprivate)\s+)*enum\s+(\w+)",
                ChunkKind::Enum,
            ),
            pat(
                r"^(?:(?:public|private|internal|fileprivate)\s+)*protocol\s+(\w+)",
                ChunkKind::Interface,
            ),
            pat(
                r"^(?:(?:public|private|internal|fileprivate)\s+)*extension\s+(\w+)",
                ChunkKind::Class,
            ),
        ],
    );

    sets.insert(
        "csharp",
        vec![
            pat(
                r"^(?:(?:public|private|protected|internal|static|sealed|abstract|partial)\s+)*class\s+(\w+)",
                ChunkKind::Class,
            ),
            pat(
                r"^(?:(?:public|private|protected|internal|partial)\s+)*interface\s+(\w+)",
                ChunkKind::Interface,
            ),
            pat(
                r"^(?:(?:public|private|protected|internal)\s+)*enum\s+(\w+)",
                ChunkKind::Enum,
            ),
            pat(
                r"^(?:(?:public|private|protected|internal)\s+)*struct\s+(\w+)",
                ChunkKind::Class,
            ),
            pat(r"^namespace\s+([\w.]+)", ChunkKind::Module),
            pat(
                r"^(?:(?:public|private|protected|internal|static|virtual|override|async|sealed)\s+)+[\w<>\[\],\s]+\s+(\w+)\s*\(",
                ChunkKind::Method,
            ),
        ],
    );

    sets.insert("c", c_patterns());

    let mut cpp = vec![
        pat(r"^(?:template\s*<[^>]*>\s*)?class\s+(\w+)", ChunkKind::Class),
        pat(r"^namespace\s+(\w+)", ChunkKind::Module),
    ];
    cpp.extend(c_patterns());
    sets.insert("cpp", cpp);

    sets
});

/// A detected construct boundary: 0-indexed line, kind, optional name.
#[derive(Debug)]
struct Boundary {
    line: usize,
    kind: ChunkKind,
    name: Option<String>,
}

/// Split a file into chunks.
///
/// Boundary-based when the language has patterns and at least one line
/// matches; size-based otherwise. Token counts are attached at creation.
pub fn chunk_file(file: &SourceFile) -> Vec<Chunk> {
    let mut lines: Vec<&str> = file.content.split('\n').collect();
    // A trailing newline yields an empty final element; it is not a line.
    if lines.last() == Some(&"") {
        lines.pop();
    }
    if lines.is_empty() {
        return Vec::new();
    }

    if let Some(patterns) = PATTERN_SETS.get(file.language.as_str()) {
        let boundaries = find_boundaries(&lines, patterns);
        if !boundaries.is_empty() {
            return chunk_by_boundaries(file, &lines, &boundaries);
        }
    }

    chunk_by_size(file, &lines)
}

fn find_boundaries(lines: &[&str], patterns: &[BoundaryPattern]) -> Vec<Boundary> {
    let mut boundaries = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        for p in patterns {
            if let Some(caps) = p.re.captures(trimmed) {
                let name = caps.get(1).map(|m| m.as_str().to_string());
                boundaries.push(Boundary {
                    line: i,
                    kind: p.kind,
                    name,
                });
                break;
            }
        }
    }
    boundaries
}

fn chunk_by_boundaries(file: &SourceFile, lines: &[&str], boundaries: &[Boundary]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let single = boundaries.len() == 1;

    for (idx, boundary) in boundaries.iter().enumerate() {
        let end = if idx + 1 < boundaries.len() {
            boundaries[idx + 1].line
        } else {
            lines.len()
        };
        let span = end - boundary.line;

        if span < MIN_CHUNK_LINES && !single {
            continue;
        }

        if span > MAX_CHUNK_LINES {
            push_sliced(file, lines, boundary, end, &mut chunks);
        } else {
            chunks.push(make_chunk(
                file,
                lines,
                boundary.line,
                end,
                boundary.kind,
                boundary.name.clone(),
            ));
        }
    }

    // A preamble (imports, module docs) before the first boundary becomes
    // its own section when it is long enough to matter.
    let first_line = boundaries[0].line;
    if first_line >= MIN_CHUNK_LINES {
        chunks.insert(
            0,
            make_chunk(
                file,
                lines,
                0,
                first_line,
                ChunkKind::Section,
                Some("imports/preamble".to_string()),
            ),
        );
    }

    chunks
}

/// Split one oversized candidate into consecutive slices of at most
/// [`MAX_CHUNK_LINES`]; slices after the first carry a continuation suffix.
fn push_sliced(
    file: &SourceFile,
    lines: &[&str],
    boundary: &Boundary,
    end: usize,
    chunks: &mut Vec<Chunk>,
) {
    let mut part = 0;
    let mut start = boundary.line;
    while start < end {
        let slice_end = (start + MAX_CHUNK_LINES).min(end);
        let name = if part == 0 {
            boundary.name.clone()
        } else {
            match &boundary.name {
                Some(n) => Some(format!("{} (part {})", n, part + 1)),
                None => Some(format!("part {}", part + 1)),
            }
        };
        chunks.push(make_chunk(file, lines, start, slice_end, boundary.kind, name));
        start = slice_end;
        part += 1;
    }
}

fn chunk_by_size(file: &SourceFile, lines: &[&str]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < lines.len() {
        let end = (start + MAX_CHUNK_LINES).min(lines.len());
        chunks.push(make_chunk(file, lines, start, end, ChunkKind::Section, None));
        start = end;
    }
    chunks
}

/// Build a chunk from the half-open 0-indexed line range `[start, end)`.
fn make_chunk(
    file: &SourceFile,
    lines: &[&str],
    start: usize,
    end: usize,
    kind: ChunkKind,
    name: Option<String>,
) -> Chunk {
    let content = lines[start..end].join("\n");
    let tokens = count_tokens(&content);
    let start_line = (start + 1) as u32;
    Chunk {
        id: Chunk::make_id(&file.rel_path, start_line),
        path: file.path.clone(),
        rel_path: file.rel_path.clone(),
        content,
        start_line,
        end_line: end as u32,
        kind,
        name,
        language: file.language.clone(),
        tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(rel: &str, language: &str, content: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from("/repo").join(rel),
            rel_path: rel.to_string(),
            content: content.to_string(),
            language: language.to_string(),
            size: content.len() as u64,
            mtime: 0,
        }
    }

    fn python_function(name: &str, body_lines: usize) -> String {
        let mut s = format!("def {}(x):\n", name);
        for i in 0..body_lines {
            s.push_str(&format!("    y{} = x + {}\n", i, i));
        }
        s
    }

    #[test]
    fn python_functions_become_chunks() {
        let content = format!("{}{}", python_function("login", 12), python_function("logout", 12));
        let f = file("src/auth.py", "python", &content);
        let chunks = chunk_file(&f);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind, ChunkKind::Function);
        assert_eq!(chunks[0].name.as_deref(), Some("login"));
        assert_eq!(chunks[1].name.as_deref(), Some("logout"));
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[1].start_line, chunks[0].end_line + 1);
    }

    #[test]
    fn ranges_are_disjoint_and_content_verbatim() {
        let content = format!(
            "{}{}{}",
            python_function("alpha", 20),
            python_function("beta", 30),
            python_function("gamma", 15)
        );
        let f = file("m.py", "python", &content);
        let chunks = chunk_file(&f);
        let lines: Vec<&str> = content.lines().collect();

        let mut prev_end = 0u32;
        for c in &chunks {
            assert!(c.start_line > prev_end, "ranges must not overlap");
            assert!(c.start_line <= c.end_line);
            prev_end = c.end_line;

            let expected =
                lines[(c.start_line - 1) as usize..c.end_line as usize].join("\n");
            assert_eq!(c.content, expected);
            assert!(c.tokens > 0);
        }
    }

    #[test]
    fn short_candidates_are_dropped() {
        // Two tiny functions followed by one big one: the tiny ones are
        // below MIN_CHUNK_LINES and disappear.
        let content = format!(
            "{}{}{}",
            python_function("a", 2),
            python_function("b", 2),
            python_function("big", 40)
        );
        let f = file("m.py", "python", &content);
        let chunks = chunk_file(&f);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name.as_deref(), Some("big"));
    }

    #[test]
    fn single_boundary_is_kept_even_when_short() {
        let content = python_function("only", 2);
        let f = file("m.py", "python", &content);
        let chunks = chunk_file(&f);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name.as_deref(), Some("only"));
    }

    #[test]
    fn oversized_candidate_is_sliced_with_continuation_names() {
        let content = python_function("huge", 450);
        let f = file("m.py", "python", &content);
        let chunks = chunk_file(&f);

        assert!(chunks.len() >= 3);
        assert_eq!(chunks[0].name.as_deref(), Some("huge"));
        assert_eq!(chunks[1].name.as_deref(), Some("huge (part 2)"));
        assert_eq!(chunks[1].kind, ChunkKind::Function);
        for c in &chunks {
            assert!((c.end_line - c.start_line + 1) as usize <= MAX_CHUNK_LINES);
        }
    }

    #[test]
    fn preamble_becomes_section_chunk() {
        let mut content = String::new();
        for i in 0..12 {
            content.push_str(&format!("import mod{}\n", i));
        }
        content.push_str(&python_function("work", 15));
        let f = file("m.py", "python", &content);
        let chunks = chunk_file(&f);

        assert_eq!(chunks[0].kind, ChunkKind::Section);
        assert_eq!(chunks[0].name.as_deref(), Some("imports/preamble"));
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 12);
    }

    #[test]
    fn short_preamble_is_dropped() {
        let content = format!("import os\nimport sys\n{}", python_function("work", 15));
        let f = file("m.py", "python", &content);
        let chunks = chunk_file(&f);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name.as_deref(), Some("work"));
    }

    #[test]
    fn unknown_language_uses_size_chunking() {
        let content = (0..450).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let f = file("notes.txt", "text", &content);
        let chunks = chunk_file(&f);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].kind, ChunkKind::Section);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 200);
        assert_eq!(chunks[2].end_line, 450);
    }

    #[test]
    fn small_unknown_file_is_one_chunk() {
        let f = file("notes.txt", "text", "a\nb\nc\n");
        let chunks = chunk_file(&f);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
        assert_eq!(chunks[0].content, "a\nb\nc");
    }

    #[test]
    fn empty_file_yields_no_chunks() {
        let f = file("empty.py", "python", "");
        assert!(chunk_file(&f).is_empty());
    }

    #[test]
    fn rust_constructs_are_detected() {
        let mut content = String::from("pub struct Config {\n");
        for i in 0..10 {
            content.push_str(&format!("    field{}: u32,\n", i));
        }
        content.push_str("}\n\nimpl Config {\n");
        for i in 0..10 {
            content.push_str(&format!("    // slot {}\n", i));
        }
        content.push_str("}\n");
        let f = file("src/config.rs", "rust", &content);
        let chunks = chunk_file(&f);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind, ChunkKind::Class);
        assert_eq!(chunks[0].name.as_deref(), Some("Config"));
        assert_eq!(chunks[1].name.as_deref(), Some("Config"));
    }

    #[test]
    fn typescript_interface_and_type() {
        let mut content = String::from("export interface User {\n");
        for i in 0..10 {
            content.push_str(&format!("  f{}: string;\n", i));
        }
        content.push_str("}\n\nexport type Role = 'admin' | 'user';\n");
        for _ in 0..10 {
            content.push_str("// padding\n");
        }
        let f = file("src/types.ts", "typescript", &content);
        let chunks = chunk_file(&f);

        assert_eq!(chunks[0].kind, ChunkKind::Interface);
        assert_eq!(chunks[0].name.as_deref(), Some("User"));
        assert_eq!(chunks[1].kind, ChunkKind::Type);
        assert_eq!(chunks[1].name.as_deref(), Some("Role"));
    }

    #[test]
    fn go_methods_and_functions() {
        let mut content = String::from("func (s *Server) Start() error {\n");
        for i in 0..10 {
            content.push_str(&format!("\t// step {}\n", i));
        }
        content.push_str("}\n\nfunc main() {\n");
        for i in 0..10 {
            content.push_str(&format!("\t// step {}\n", i));
        }
        content.push_str("}\n");
        let f = file("main.go", "go", &content);
        let chunks = chunk_file(&f);

        assert_eq!(chunks[0].kind, ChunkKind::Method);
        assert_eq!(chunks[0].name.as_deref(), Some("Start"));
        assert_eq!(chunks[1].kind, ChunkKind::Function);
        assert_eq!(chunks[1].name.as_deref(), Some("main"));
    }
}
