//! Rendering of selected chunks.
//!
//! Groups chunks by file (first-seen order, which follows selection order
//! and therefore score) and within each file sorts by line number, so a
//! file's pieces read top to bottom even when they were selected out of
//! order. Markdown is the default; an XML rendering exists for consumers
//! that prefer explicit structure.

use std::collections::HashMap;

use crate::models::ScoredChunk;

/// Output format for the assembled context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Xml,
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "xml" => Ok(OutputFormat::Xml),
            other => anyhow::bail!("unknown output format: {} (expected markdown or xml)", other),
        }
    }
}

/// Render the selected chunks.
pub fn format_context(selected: &[ScoredChunk], format: OutputFormat) -> String {
    match format {
        OutputFormat::Markdown => format_markdown(selected),
        OutputFormat::Xml => format_xml(selected),
    }
}

/// Group by relative path preserving first-seen order; ascending lines
/// within each file.
fn group_by_file(selected: &[ScoredChunk]) -> Vec<(&str, Vec<&ScoredChunk>)> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&ScoredChunk>> = HashMap::new();

    for item in selected {
        let path = item.chunk.rel_path.as_str();
        if !groups.contains_key(path) {
            order.push(path);
        }
        groups.entry(path).or_default().push(item);
    }

    order
        .into_iter()
        .map(|path| {
            let mut chunks = groups.remove(path).unwrap_or_default();
            chunks.sort_by_key(|s| s.chunk.start_line);
            (path, chunks)
        })
        .collect()
}

fn format_markdown(selected: &[ScoredChunk]) -> String {
    let mut out = String::new();

    for (path, chunks) in group_by_file(selected) {
        out.push_str(&format!("## {}\n\n", path));

        for item in chunks {
            let chunk = &item.chunk;

            let lines = if chunk.start_line == chunk.end_line {
                format!("Line {}", chunk.start_line)
            } else {
                format!("Lines {}-{}", chunk.start_line, chunk.end_line)
            };
            match &chunk.name {
                Some(name) => {
                    out.push_str(&format!("### {} ({}: {})\n", lines, chunk.kind, name))
                }
                None => out.push_str(&format!("### {}\n", lines)),
            }

            out.push_str(&format!("```{}\n{}\n```\n\n", chunk.language, chunk.content));
        }
    }

    out.trim_end().to_string()
}

fn format_xml(selected: &[ScoredChunk]) -> String {
    let mut parts = Vec::new();

    for (path, chunks) in group_by_file(selected) {
        for item in chunks {
            let chunk = &item.chunk;
            let mut attrs = format!(
                r#"path="{}" lines="{}-{}""#,
                path, chunk.start_line, chunk.end_line
            );
            if let Some(name) = &chunk.name {
                attrs.push_str(&format!(r#" name="{}" type="{}""#, name, chunk.kind));
            }
            if !chunk.language.is_empty() {
                attrs.push_str(&format!(r#" language="{}""#, chunk.language));
            }
            parts.push(format!("<file {}>\n{}\n</file>", attrs, chunk.content));
        }
    }

    parts.join("\n\n")
}
