//! One document through the whole pipeline.
//!
//! Shared by the CLI commands and the HTTP handlers: resolve the input
//! format, apply per-run overrides to the loaded [`Config`], extract
//! chapters, split them (or keep them whole) and optionally package the
//! result.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use folio_core::Chapter;

use crate::chunk::{build_split_config, resolve_metric, SharedTokenizer};
use crate::config::Config;
use crate::extract::{extract_chapters, DocumentFormat, ExtractOptions};
use crate::package::{build_archive, ArchiveOptions};
use crate::pipeline::{select_chapter, split_chapters, whole_chapters, ChapterChunks};
use crate::progress::{ProgressEvent, ProgressReporter};

/// Per-run settings layered over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub strategy: Option<String>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub mode: Option<String>,
    pub content: Option<String>,
    pub metric: Option<String>,
    pub tokenizer: Option<PathBuf>,
    pub prefix: Option<String>,
    pub no_prefix: bool,
}

impl Overrides {
    /// A copy of `base` with the overrides applied, re-validated.
    pub fn apply(&self, base: &Config) -> Result<Config> {
        let mut config = base.clone();
        if let Some(strategy) = &self.strategy {
            config.extract.strategy = strategy.clone();
        }
        let chunking = &mut config.chunking;
        if let Some(size) = self.chunk_size {
            chunking.chunk_size = size;
        }
        if let Some(overlap) = self.chunk_overlap {
            chunking.chunk_overlap = overlap;
        }
        if let Some(mode) = &self.mode {
            chunking.mode = mode.clone();
        }
        if let Some(content) = &self.content {
            chunking.content = content.clone();
        }
        if let Some(metric) = &self.metric {
            chunking.metric = metric.clone();
        }
        if let Some(tokenizer) = &self.tokenizer {
            chunking.tokenizer = Some(tokenizer.clone());
        }
        if self.no_prefix {
            config.output.prefix = None;
        } else if let Some(prefix) = &self.prefix {
            config.output.prefix = Some(prefix.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

/// Chapter selection and output shape for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobOptions {
    /// Only this chapter (1-based).
    pub chapter: Option<usize>,
    /// Skip splitting; one piece per chapter.
    pub whole: bool,
}

/// Input bytes plus the format they will be read as.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub format: DocumentFormat,
    pub bytes: Arc<[u8]>,
}

impl Document {
    /// Resolve the format: explicit hint, then the name's extension, then
    /// content sniffing.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, hint: Option<&str>) -> Result<Self> {
        let name = name.into();
        let format = match hint {
            Some(hint) => hint.parse::<DocumentFormat>()?,
            None => DocumentFormat::from_path(Path::new(&name))
                .unwrap_or_else(|| DocumentFormat::sniff(&bytes)),
        };
        Ok(Self {
            name,
            format,
            bytes: bytes.into(),
        })
    }

    /// Read a file, or stdin for `-` (plain text unless a hint says otherwise).
    pub fn read(input: &str, hint: Option<&str>) -> Result<Self> {
        if input == "-" {
            let mut bytes = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut bytes)
                .context("Failed to read stdin")?;
            return Self::new("stdin", bytes, Some(hint.unwrap_or("text")));
        }
        let bytes = std::fs::read(input).with_context(|| format!("Failed to read {}", input))?;
        Self::new(input, bytes, hint)
    }
}

/// JSON shape of a split run.
#[derive(Debug, Serialize)]
pub struct SplitReport<'a> {
    pub source: &'a str,
    pub format: &'static str,
    pub chapters: &'a [ChapterChunks],
}

/// Extract chapters on the blocking pool.
pub async fn extract(doc: &Document, config: &Config) -> Result<Vec<Chapter>> {
    let options = ExtractOptions::from_config(&config.extract)?;
    let bytes = Arc::clone(&doc.bytes);
    let format = doc.format;
    let chapters = tokio::task::spawn_blocking(move || extract_chapters(&bytes, format, &options))
        .await
        .context("Extraction task failed")?
        .with_context(|| format!("Failed to extract chapters from {}", doc.name))?;
    tracing::info!(document = %doc.name, format = %doc.format, chapters = chapters.len(), "extracted");
    Ok(chapters)
}

/// Extract, select and split.
pub async fn run(
    doc: &Document,
    config: &Config,
    tokenizer: Option<&SharedTokenizer>,
    options: JobOptions,
    progress: &dyn ProgressReporter,
) -> Result<Vec<ChapterChunks>> {
    progress.report(ProgressEvent::Extracting {
        document: doc.name.clone(),
    });
    let mut chapters = extract(doc, config).await?;
    if let Some(number) = options.chapter {
        chapters = select_chapter(chapters, number)?;
    }

    let prefix = config.output.effective_prefix().map(str::to_string);
    if options.whole {
        return Ok(whole_chapters(&chapters, prefix.as_deref()));
    }

    let metric = resolve_metric(&config.chunking, tokenizer)?;
    let split_config = Arc::new(build_split_config(&config.chunking, metric)?);
    let out = split_chapters(chapters, split_config, prefix, &doc.name, progress).await?;
    tracing::info!(
        document = %doc.name,
        chunks = out.iter().map(|c| c.chunks.len()).sum::<usize>(),
        "split"
    );
    Ok(out)
}

/// Effective settings, recorded in archive manifests.
pub fn settings_json(config: &Config, options: JobOptions) -> serde_json::Value {
    serde_json::json!({
        "chunk_size": config.chunking.chunk_size,
        "chunk_overlap": config.chunking.chunk_overlap,
        "mode": config.chunking.mode,
        "content": config.chunking.content,
        "metric": config.chunking.metric,
        "strategy": config.extract.strategy,
        "prefix": config.output.effective_prefix(),
        "whole": options.whole,
        "chapter": options.chapter,
    })
}

/// Package split output as a zip archive.
pub fn package(
    doc: &Document,
    config: &Config,
    options: JobOptions,
    chapters: &[ChapterChunks],
    progress: &dyn ProgressReporter,
) -> Result<Vec<u8>> {
    let files = if options.whole {
        chapters.iter().filter(|c| !c.prefixed.is_empty()).count()
    } else {
        chapters.iter().map(|c| c.prefixed.len()).sum()
    };
    progress.report(ProgressEvent::Packaging {
        document: doc.name.clone(),
        files: files as u64,
    });
    let archive_options = ArchiveOptions {
        pad_width: config.output.pad_width,
        whole: options.whole,
        manifest: config.output.manifest,
        source: Some(doc.name.clone()),
        settings: settings_json(config, options),
    };
    build_archive(chapters, &archive_options)
}
