//! # Folio CLI (`folio`)
//!
//! Split documents into chapters and prompt-sized chunks.
//!
//! ## Usage
//!
//! ```bash
//! folio [--config ./folio.toml] [--log-level debug] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `folio chapters <INPUT>` | List the chapters of a document |
//! | `folio split <INPUT\|->` | Split into chunks; print them or write a zip |
//! | `folio batch <DIR> --output-dir <OUT>` | One zip per document in a directory |
//! | `folio separators [KIND]` | Show separator priorities |
//! | `folio serve` | Start the HTTP service |
//! | `folio completions <SHELL>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # See how a book divides
//! folio chapters novel.epub
//!
//! # Chunks of chapter 3, printed
//! folio split novel.epub --chapter 3 --chunk-size 800 --overlap 40
//!
//! # Everything as a zip, Markdown-aware, no prefix
//! folio split notes.md --content markdown --no-prefix --output notes.zip
//!
//! # Text from stdin
//! pbpaste | folio split - --json
//! ```

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use folio::commands;
use folio::config::{self, Config};
use folio::job::{JobOptions, Overrides};
use folio::progress::ProgressMode;
use folio::server;

/// Folio: split EPUB, DOCX, ODT and text documents into chapters and
/// bounded, overlapping chunks.
#[derive(Parser)]
#[command(
    name = "folio",
    about = "Folio: split documents into chapters and prompt-sized chunks",
    version,
    long_about = "Folio extracts chapters from EPUB, DOCX, ODT and plain-text documents, \
    splits each chapter into bounded, overlapping chunks measured in characters or tokens, \
    optionally prefixes every chunk with a fixed instruction, and prints the result or \
    packages it as a zip archive."
)]
struct Cli {
    /// Path to a configuration file (TOML). Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (`error`, `warn`, `info`, `debug`, `trace`, or a full
    /// `RUST_LOG`-style directive). Overrides `RUST_LOG` and `log_level`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the chapters of a document.
    Chapters {
        /// Document path.
        input: String,

        /// Document format (`epub`, `docx`, `odt`, `text`). Detected from the
        /// extension or content when omitted.
        #[arg(long)]
        format: Option<String>,

        /// Chapter strategy: `auto`, `toc`, `spine`, `headings`, `page-breaks`, `single`.
        #[arg(long)]
        strategy: Option<String>,

        /// Print chapters (with text) as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Split a document into chunks.
    ///
    /// Prints `── Chunk i ──` blocks by default, JSON with `--json`, or
    /// writes a zip archive with `--output` (`-o -` streams it to stdout).
    Split {
        /// Document path, or `-` for text on stdin.
        input: String,

        /// Document format (`epub`, `docx`, `odt`, `text`).
        #[arg(long)]
        format: Option<String>,

        #[command(flatten)]
        split: SplitArgs,

        /// Write a zip archive here instead of printing.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Print JSON instead of text blocks.
        #[arg(long)]
        json: bool,
    },

    /// Split every supported document under a directory.
    ///
    /// Writes `<OUTPUT_DIR>/<relative path>.zip` per document, using the
    /// `[inputs]` include and exclude globs.
    Batch {
        /// Directory to scan.
        dir: PathBuf,

        /// Where archives are written.
        #[arg(long)]
        output_dir: PathBuf,

        #[command(flatten)]
        split: SplitArgs,
    },

    /// Show separator priorities for one content kind, or all of them.
    Separators {
        /// Content kind (`text`, `prose`, `markdown`, `rust`, …).
        kind: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP service on `[server].bind`.
    Serve,

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

/// Splitting options shared by `split` and `batch`.
#[derive(Args, Debug, Clone)]
struct SplitArgs {
    /// Chapter strategy: `auto`, `toc`, `spine`, `headings`, `page-breaks`, `single`.
    #[arg(long)]
    strategy: Option<String>,

    /// Only this chapter (1-based).
    #[arg(long)]
    chapter: Option<usize>,

    /// Maximum chunk length, in units of the metric.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Overlap between consecutive chunks, in units of the metric.
    #[arg(long)]
    overlap: Option<usize>,

    /// `recursive` (bounded) or `flat` (single separator level).
    #[arg(long)]
    mode: Option<String>,

    /// Content kind selecting the separator list.
    #[arg(long)]
    content: Option<String>,

    /// Length metric: `chars` or `tokens`.
    #[arg(long)]
    metric: Option<String>,

    /// `tokenizer.json` for `--metric tokens`.
    #[arg(long)]
    tokenizer: Option<PathBuf>,

    /// Text prepended to every chunk (`\n` and `\t` are unescaped).
    #[arg(long, conflicts_with = "no_prefix")]
    prefix: Option<String>,

    /// Do not prepend any prefix.
    #[arg(long)]
    no_prefix: bool,

    /// Keep chapters whole instead of splitting them.
    #[arg(long)]
    whole: bool,

    /// Progress on stderr: `off`, `human` or `json`. Defaults to human on a TTY.
    #[arg(long)]
    progress: Option<String>,
}

impl SplitArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            strategy: self.strategy.clone(),
            chunk_size: self.chunk_size,
            chunk_overlap: self.overlap,
            mode: self.mode.clone(),
            content: self.content.clone(),
            metric: self.metric.clone(),
            tokenizer: self.tokenizer.clone(),
            prefix: self.prefix.as_deref().map(unescape),
            no_prefix: self.no_prefix,
        }
    }

    fn job_options(&self) -> JobOptions {
        JobOptions {
            chapter: self.chapter,
            whole: self.whole,
        }
    }
}

/// Resolve `\n`, `\t` and `\\` in a command-line prefix.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Priority: `--log-level`, then `RUST_LOG`, then the config's `log_level`.
fn init_tracing(cli_level: Option<&str>, config_level: &str) {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_level)),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(*shell, &mut command, "folio", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Separators { kind, json } => {
            commands::run_separators(kind.as_deref(), *json)?;
            return Ok(());
        }
        _ => {}
    }

    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };
    init_tracing(cli.log_level.as_deref(), cfg.log_level());

    match cli.command {
        Commands::Chapters {
            input,
            format,
            strategy,
            json,
        } => {
            let overrides = Overrides {
                strategy,
                ..Overrides::default()
            };
            let cfg = overrides.apply(&cfg)?;
            commands::run_chapters(&cfg, &input, format.as_deref(), json).await?;
        }
        Commands::Split {
            input,
            format,
            split,
            output,
            json,
        } => {
            let cfg = split.overrides().apply(&cfg)?;
            let progress = ProgressMode::from_flag(split.progress.as_deref())?;
            commands::run_split(
                &cfg,
                &input,
                format.as_deref(),
                split.job_options(),
                output.as_deref(),
                json,
                progress,
            )
            .await?;
        }
        Commands::Batch {
            dir,
            output_dir,
            split,
        } => {
            let cfg = split.overrides().apply(&cfg)?;
            let progress = ProgressMode::from_flag(split.progress.as_deref())?;
            commands::run_batch(&cfg, &dir, &output_dir, split.job_options(), progress).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Separators { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn prefix_escapes() {
        assert_eq!(unescape("translate\\n"), "translate\n");
        assert_eq!(unescape("a\\tb\\\\c\\q"), "a\tb\\c\\q");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }

    #[test]
    fn split_flags_map_to_overrides() {
        let cli = Cli::parse_from([
            "folio", "split", "book.epub", "--chunk-size", "500", "--overlap", "25", "--no-prefix",
        ]);
        let Commands::Split { split, .. } = cli.command else {
            panic!("expected split");
        };
        let overrides = split.overrides();
        assert_eq!(overrides.chunk_size, Some(500));
        assert_eq!(overrides.chunk_overlap, Some(25));
        assert!(overrides.no_prefix);
    }
}
