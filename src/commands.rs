//! CLI command implementations.
//!
//! Each `run_*` function backs one `folio` subcommand. Results go to stdout;
//! progress and logs go to stderr.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::Path;

use folio_core::{ContentKind, SeparatorPlacement};

use crate::chunk::load_shared_tokenizer;
use crate::config::Config;
use crate::inputs::scan_inputs;
use crate::job::{self, Document, JobOptions, SplitReport};
use crate::progress::{ProgressMode, ProgressReporter};
use crate::render::{write_chapter_list, write_chunks};

/// `folio chapters`: list the chapters a document splits into.
pub async fn run_chapters(config: &Config, input: &str, format: Option<&str>, json: bool) -> Result<()> {
    let doc = Document::read(input, format)?;
    let chapters = job::extract(&doc, config).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &chapters)?;
        writeln!(out)?;
    } else {
        write_chapter_list(&mut out, &chapters)?;
    }
    Ok(())
}

/// `folio split`: print chunks, or write an archive with `--output`.
pub async fn run_split(
    config: &Config,
    input: &str,
    format: Option<&str>,
    options: JobOptions,
    output: Option<&Path>,
    json: bool,
    progress: ProgressMode,
) -> Result<()> {
    let reporter = progress.reporter();
    let doc = Document::read(input, format)?;
    let chapters = job::run(&doc, config, None, options, reporter.as_ref()).await?;

    if let Some(path) = output {
        let archive = job::package(&doc, config, options, &chapters, reporter.as_ref())?;
        if path == Path::new("-") {
            std::io::stdout().lock().write_all(&archive)?;
        } else {
            write_file(path, &archive)?;
            let chunks: usize = chapters.iter().map(|c| c.chunks.len()).sum();
            println!(
                "Wrote {} ({} chapters, {} chunks)",
                path.display(),
                chapters.len(),
                chunks
            );
        }
        return Ok(());
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        let report = SplitReport {
            source: &doc.name,
            format: doc.format.as_str(),
            chapters: &chapters,
        };
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        write_chunks(&mut out, &chapters)?;
    }
    Ok(())
}

/// `folio batch`: one archive per supported file under `dir`.
///
/// A failing document is logged and skipped; the command fails at the end
/// if any document failed.
pub async fn run_batch(
    config: &Config,
    dir: &Path,
    output_dir: &Path,
    options: JobOptions,
    progress: ProgressMode,
) -> Result<()> {
    let files = scan_inputs(dir, &config.inputs)?;
    if files.is_empty() {
        println!("No supported documents found in {}", dir.display());
        return Ok(());
    }
    let tokenizer = load_shared_tokenizer(&config.chunking)?;
    let reporter = progress.reporter();

    let mut failed = 0usize;
    for file in &files {
        let target = output_dir.join(&file.relative).with_extension("zip");
        match batch_one(config, file.path.as_path(), &target, tokenizer.as_ref(), options, reporter.as_ref()).await {
            Ok(chunks) => println!("{} → {} ({} chunks)", file.relative, target.display(), chunks),
            Err(e) => {
                failed += 1;
                tracing::warn!(document = %file.relative, error = %format!("{:#}", e), "document failed");
                eprintln!("{}: {:#}", file.relative, e);
            }
        }
    }

    println!(
        "Batch complete: {} of {} documents packaged",
        files.len() - failed,
        files.len()
    );
    if failed > 0 {
        bail!("{} of {} documents failed", failed, files.len());
    }
    Ok(())
}

async fn batch_one(
    config: &Config,
    path: &Path,
    target: &Path,
    tokenizer: Option<&crate::chunk::SharedTokenizer>,
    options: JobOptions,
    progress: &dyn ProgressReporter,
) -> Result<usize> {
    let doc = Document::read(&path.to_string_lossy(), None)?;
    let chapters = job::run(&doc, config, tokenizer, options, progress).await?;
    let archive = job::package(&doc, config, options, &chapters, progress)?;
    write_file(target, &archive)?;
    Ok(chapters.iter().map(|c| c.chunks.len()).sum())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

/// `folio separators`: show separator priorities per content kind.
pub fn run_separators(kind: Option<&str>, json: bool) -> Result<()> {
    let kinds: Vec<ContentKind> = match kind {
        Some(k) => vec![k.parse()?],
        None => ContentKind::ALL.to_vec(),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        let table: Vec<_> = kinds.iter().map(|k| separator_entry(*k)).collect();
        serde_json::to_writer_pretty(&mut out, &table)?;
        writeln!(out)?;
        return Ok(());
    }
    for k in kinds {
        let placement = match k.placement() {
            SeparatorPlacement::End => "end",
            SeparatorPlacement::Start => "start",
        };
        let list = k
            .separators()
            .iter()
            .map(|s| format!("{:?}", s))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "{:<9} {:<6} {}", k.as_str(), placement, list)?;
    }
    Ok(())
}

/// One row of the separator table, shared with `GET /separators`.
pub fn separator_entry(kind: ContentKind) -> serde_json::Value {
    serde_json::json!({
        "kind": kind.as_str(),
        "placement": kind.placement(),
        "separators": kind.separators(),
    })
}
