//! # lmfetch CLI
//!
//! ```bash
//! lmfetch <path-or-url> "<query>" [--budget 50k] [--include GLOB]...
//! ```
//!
//! Prints the assembled context to stdout. Progress and statistics go to
//! stderr so the output can be piped straight into a prompt.
//!
//! ## Examples
//!
//! ```bash
//! # Local codebase, keyword ranking
//! lmfetch . "how does login work" --budget 50k
//!
//! # Remote repository, hybrid ranking, only Python files
//! lmfetch https://github.com/acme/api "rate limiting" --hybrid --include '**/*.py'
//!
//! # XML output with a summary
//! lmfetch . "retry logic" --format xml --stats
//! ```

use anyhow::{bail, Result};
use clap::Parser;

use lmfetch::progress::{default_enabled, stderr_reporter};
use lmfetch::{clear_cache, ContextBuilder, OutputFormat};

/// Assemble a relevance-ranked, token-budgeted excerpt of a codebase for
/// LLM prompts.
#[derive(Parser)]
#[command(
    name = "lmfetch",
    version,
    about = "Assemble a relevance-ranked, token-budgeted excerpt of a codebase for LLM prompts"
)]
struct Cli {
    /// Local directory or GitHub URL to scan.
    path: Option<String>,

    /// Free-text query describing what to retrieve.
    query: Option<String>,

    /// Token budget: a number with optional k/m suffix (e.g. 50k, 1.5m).
    #[arg(long, default_value = "50k")]
    budget: String,

    /// Only include files matching this glob (repeatable).
    #[arg(long = "include", value_name = "GLOB")]
    include: Vec<String>,

    /// Exclude files matching this glob (repeatable).
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// Use hybrid ranking (keyword + embeddings + importance). Requires
    /// OPENAI_API_KEY.
    #[arg(long)]
    hybrid: bool,

    /// Lift the 1 MiB / 20,000-line per-file limits.
    #[arg(long)]
    force_large: bool,

    /// Re-score the top candidates with a model after ranking.
    #[arg(long)]
    smart_rerank: bool,

    /// Output format: markdown or xml.
    #[arg(long, default_value = "markdown")]
    format: String,

    /// Print token/file/chunk statistics to stderr.
    #[arg(long)]
    stats: bool,

    /// Force progress output on (default: only when stderr is a TTY).
    #[arg(long, conflicts_with = "no_progress")]
    progress: bool,

    /// Force progress output off.
    #[arg(long)]
    no_progress: bool,

    /// Empty the persistent chunk cache and exit.
    #[arg(long)]
    clear_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.clear_cache {
        clear_cache(None).await?;
        eprintln!("Chunk cache cleared.");
        return Ok(());
    }

    let (path, query) = match (&cli.path, &cli.query) {
        (Some(path), Some(query)) => (path.clone(), query.clone()),
        _ => bail!("both <PATH> and <QUERY> are required (see --help)"),
    };

    let format: OutputFormat = cli.format.parse()?;

    let mut builder = ContextBuilder::new(path, query)
        .budget(&cli.budget)
        .include(cli.include.clone())
        .exclude(cli.exclude.clone())
        .fast(!cli.hybrid)
        .force_large(cli.force_large)
        .smart_rerank(cli.smart_rerank)
        .format(format);

    let show_progress = if cli.progress {
        true
    } else if cli.no_progress {
        false
    } else {
        default_enabled()
    };
    if show_progress {
        builder = builder.on_progress(stderr_reporter());
    }

    let result = builder.build().await?;

    println!("{}", result.context);

    if cli.stats {
        eprintln!();
        eprintln!("files scanned:  {}", result.files_processed);
        eprintln!("chunks created: {}", result.chunks_created);
        eprintln!("chunks kept:    {}", result.chunks.len());
        eprintln!("tokens:         {}", result.tokens);
    }

    Ok(())
}
