//! Zip packaging of split output.
//!
//! One archive per run. Entry names are derived from the chapter number, a
//! slug of the chapter title and the chunk number, so they never collide:
//!
//! ```text
//! 001_prologue/chunk_001.txt      chunked mode
//! 001_prologue/chunk_002.txt
//! 002_chapter/chunk_001.txt       untitled chapter
//! 001_prologue.txt                whole-chapter mode
//! manifest.json
//! ```
//!
//! Entries carry a fixed timestamp and are written in sorted order, so the
//! same input always produces byte-identical archives.

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::pipeline::ChapterChunks;

const SLUG_MAX_CHARS: usize = 48;
const MANIFEST: &str = "manifest.json";

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Minimum digits for chapter and chunk numbers.
    pub pad_width: usize,
    /// One file per chapter instead of one per chunk.
    pub whole: bool,
    pub manifest: bool,
    /// Source document name recorded in the manifest.
    pub source: Option<String>,
    /// Effective settings recorded in the manifest.
    pub settings: serde_json::Value,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            pad_width: 3,
            whole: false,
            manifest: true,
            source: None,
            settings: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    tool: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    settings: &'a serde_json::Value,
    files: Vec<ManifestFile<'a>>,
}

#[derive(Debug, Serialize)]
struct ManifestFile<'a> {
    path: String,
    chapter: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunk: Option<usize>,
    bytes: usize,
    sha256: String,
}

/// Build the archive in memory.
pub fn build_archive(chapters: &[ChapterChunks], options: &ArchiveOptions) -> Result<Vec<u8>> {
    let max_chapter = chapters.iter().map(|c| c.chapter + 1).max().unwrap_or(1);
    let max_chunk = chapters.iter().map(|c| c.prefixed.len()).max().unwrap_or(1);
    let chapter_width = options.pad_width.max(digits(max_chapter));
    let chunk_width = options.pad_width.max(digits(max_chunk));

    let mut entries: Vec<(String, Cow<'_, str>, ManifestFile<'_>)> = Vec::new();
    for chapter in chapters {
        if chapter.prefixed.is_empty() {
            continue;
        }
        let number = chapter.chapter + 1;
        let dir = format!(
            "{:0width$}_{}",
            number,
            slug(chapter.title.as_deref().unwrap_or("")),
            width = chapter_width
        );
        if options.whole {
            let path = format!("{}.txt", dir);
            let body: Cow<'_, str> = match chapter.prefixed.as_slice() {
                [single] => Cow::Borrowed(single.as_str()),
                many => Cow::Owned(many.join("\n\n")),
            };
            let file = manifest_file(&path, chapter, None, &body);
            entries.push((path, body, file));
        } else {
            for (i, text) in chapter.prefixed.iter().enumerate() {
                let path = format!("{}/chunk_{:0width$}.txt", dir, i + 1, width = chunk_width);
                let file = manifest_file(&path, chapter, Some(i + 1), text);
                entries.push((path, Cow::Borrowed(text.as_str()), file));
            }
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (path, body, _) in &entries {
        writer
            .start_file(path.as_str(), file_options)
            .with_context(|| format!("Failed to add {} to archive", path))?;
        writer.write_all(body.as_bytes())?;
    }

    if options.manifest {
        let manifest = Manifest {
            tool: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            source: options.source.as_deref(),
            settings: &options.settings,
            files: entries.into_iter().map(|(_, _, file)| file).collect(),
        };
        let json = serde_json::to_vec_pretty(&manifest)?;
        writer.start_file(MANIFEST, file_options)?;
        writer.write_all(&json)?;
    }

    let cursor = writer.finish().context("Failed to finish archive")?;
    let bytes = cursor.into_inner();
    tracing::debug!(bytes = bytes.len(), "archive written");
    Ok(bytes)
}

fn manifest_file<'a>(
    path: &str,
    chapter: &'a ChapterChunks,
    chunk: Option<usize>,
    body: &str,
) -> ManifestFile<'a> {
    ManifestFile {
        path: path.to_string(),
        chapter: chapter.chapter + 1,
        title: chapter.title.as_deref(),
        chunk,
        bytes: body.len(),
        sha256: format!("{:x}", Sha256::digest(body.as_bytes())),
    }
}

fn digits(n: usize) -> usize {
    n.max(1).to_string().len()
}

/// File-name-safe form of a chapter title.
///
/// Lower-cased; every run of non-alphanumeric characters becomes one `-`;
/// at most 48 characters; `chapter` when nothing is left.
pub fn slug(title: &str) -> String {
    let mut out = String::new();
    let mut dash = false;
    for ch in title.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if dash && !out.is_empty() {
                out.push('-');
            }
            dash = false;
            out.push(ch);
        } else {
            dash = true;
        }
    }
    let out: String = out.chars().take(SLUG_MAX_CHARS).collect();
    let out = out.trim_matches('-');
    if out.is_empty() {
        "chapter".to_string()
    } else {
        out.to_string()
    }
}

/// Archive name for a source document: `book.epub` → `book.zip`.
pub fn archive_name(source: &str) -> String {
    let stem = std::path::Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "folio".to_string());
    format!("{}.zip", stem)
}
