//! Chapter extraction for EPUB, DOCX, ODT and plain text.
//!
//! Every extractor turns raw document bytes into an ordered list of
//! [`Chapter`]s holding plain text. The container formats are all zip
//! archives, so they share one bounded entry reader ([`Package`]) that
//! refuses entries decompressing past `max_entry_bytes`.
//!
//! Extraction never panics on malformed input; it returns an
//! [`ExtractError`] describing the first problem found.
//!
//! | Format | Chapter boundaries |
//! |--------|--------------------|
//! | EPUB | table of contents (NCX or EPUB 3 nav), else one per spine document |
//! | DOCX | heading styles, else explicit page breaks, else one chapter |
//! | ODT  | `text:h` outline levels, else page-break paragraph styles, else one chapter |
//! | text | one chapter |

mod docx;
mod epub;
mod odt;
mod xml;

use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use encoding_rs::{Encoding, GB18030, UTF_8, WINDOWS_1252};
use folio_core::Chapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Epub,
    Docx,
    Odt,
    Text,
}

impl DocumentFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentFormat::Epub => "epub",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Odt => "odt",
            DocumentFormat::Text => "text",
        }
    }

    /// Map a file extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "epub" => Some(DocumentFormat::Epub),
            "docx" => Some(DocumentFormat::Docx),
            "odt" => Some(DocumentFormat::Odt),
            "txt" | "text" | "md" => Some(DocumentFormat::Text),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Guess the format from content. Zip containers are told apart by their
    /// `mimetype` entry or well-known parts; anything that is not a zip is
    /// treated as text.
    pub fn sniff(bytes: &[u8]) -> Self {
        if !bytes.starts_with(b"PK\x03\x04") {
            return DocumentFormat::Text;
        }
        let Ok(mut archive) = zip::ZipArchive::new(std::io::Cursor::new(bytes)) else {
            return DocumentFormat::Text;
        };
        if let Ok(entry) = archive.by_name("mimetype") {
            let mut mime = String::new();
            if entry.take(128).read_to_string(&mut mime).is_ok() {
                match mime.trim() {
                    "application/epub+zip" => return DocumentFormat::Epub,
                    "application/vnd.oasis.opendocument.text" => return DocumentFormat::Odt,
                    _ => {}
                }
            }
        }
        let names: Vec<&str> = archive.file_names().collect();
        if names.contains(&"word/document.xml") {
            DocumentFormat::Docx
        } else if names.contains(&"META-INF/container.xml") {
            DocumentFormat::Epub
        } else if names.contains(&"content.xml") {
            DocumentFormat::Odt
        } else {
            DocumentFormat::Text
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentFormat {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim().trim_start_matches('.'))
            .ok_or_else(|| ExtractError::UnsupportedFormat(s.to_string()))
    }
}

/// How chapter boundaries are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChapterStrategy {
    /// Best available structure for the format.
    #[default]
    Auto,
    /// EPUB table of contents.
    Toc,
    /// One chapter per EPUB spine document.
    Spine,
    /// DOCX / ODT headings up to `heading_level`.
    Headings,
    /// DOCX / ODT explicit page breaks.
    PageBreaks,
    /// Whole document as one chapter.
    Single,
}

impl ChapterStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ChapterStrategy::Auto => "auto",
            ChapterStrategy::Toc => "toc",
            ChapterStrategy::Spine => "spine",
            ChapterStrategy::Headings => "headings",
            ChapterStrategy::PageBreaks => "page-breaks",
            ChapterStrategy::Single => "single",
        }
    }
}

impl FromStr for ChapterStrategy {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ChapterStrategy::Auto),
            "toc" => Ok(ChapterStrategy::Toc),
            "spine" => Ok(ChapterStrategy::Spine),
            "headings" => Ok(ChapterStrategy::Headings),
            "page-breaks" | "pagebreaks" | "pages" => Ok(ChapterStrategy::PageBreaks),
            "single" => Ok(ChapterStrategy::Single),
            other => Err(ExtractError::UnknownStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub strategy: ChapterStrategy,
    pub heading_level: u8,
    pub max_entry_bytes: u64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            strategy: ChapterStrategy::Auto,
            heading_level: 1,
            max_entry_bytes: 50 * 1024 * 1024,
        }
    }
}

impl ExtractOptions {
    pub fn from_config(config: &crate::config::ExtractConfig) -> Result<Self, ExtractError> {
        Ok(Self {
            strategy: config.strategy.parse()?,
            heading_level: config.heading_level,
            max_entry_bytes: config.max_entry_bytes,
        })
    }
}

/// Extraction error.
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedFormat(String),
    UnknownStrategy(String),
    /// Not a readable zip archive.
    Archive(String),
    /// A required part (container, package document, body) is absent.
    MissingEntry(String),
    Xml { entry: String, message: String },
    EntryTooLarge { entry: String, limit: u64 },
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedFormat(fmt) => write!(f, "unsupported document format: {}", fmt),
            ExtractError::UnknownStrategy(s) => write!(
                f,
                "unknown chapter strategy '{}'; expected auto, toc, spine, headings, page-breaks or single",
                s
            ),
            ExtractError::Archive(e) => write!(f, "corrupt archive: {}", e),
            ExtractError::MissingEntry(name) => write!(f, "missing archive entry: {}", name),
            ExtractError::Xml { entry, message } => {
                write!(f, "malformed XML in {}: {}", entry, message)
            }
            ExtractError::EntryTooLarge { entry, limit } => {
                write!(f, "archive entry {} exceeds size limit ({} bytes)", entry, limit)
            }
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract chapters from `bytes`.
///
/// Blank chapters are dropped, chapter text is trimmed, and indices are
/// reassigned so they run `0..n` in document order.
pub fn extract_chapters(
    bytes: &[u8],
    format: DocumentFormat,
    options: &ExtractOptions,
) -> Result<Vec<Chapter>, ExtractError> {
    let raw = match format {
        DocumentFormat::Epub => epub::extract(bytes, options)?,
        DocumentFormat::Docx => docx::extract(bytes, options)?,
        DocumentFormat::Odt => odt::extract(bytes, options)?,
        DocumentFormat::Text => vec![RawChapter {
            title: None,
            text: decode_text(bytes),
        }],
    };
    let raw = if options.strategy == ChapterStrategy::Single {
        merge_all(raw)
    } else {
        raw
    };

    let chapters = finalize(raw);
    tracing::debug!(format = %format, strategy = options.strategy.as_str(), chapters = chapters.len(), "extracted");
    Ok(chapters)
}

/// Decode plain text. A BOM decides the encoding; otherwise strict UTF-8,
/// then GB18030, then windows-1252, which accepts any byte.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }
    for encoding in [UTF_8, GB18030] {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            if encoding != UTF_8 {
                tracing::debug!(encoding = encoding.name(), "decoded non-UTF-8 text");
            }
            return text.into_owned();
        }
    }
    tracing::debug!(encoding = WINDOWS_1252.name(), "decoded non-UTF-8 text");
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Chapter before trimming and reindexing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawChapter {
    pub title: Option<String>,
    pub text: String,
}

fn merge_all(raw: Vec<RawChapter>) -> Vec<RawChapter> {
    let text = raw
        .iter()
        .map(|c| c.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    vec![RawChapter { title: None, text }]
}

fn finalize(raw: Vec<RawChapter>) -> Vec<Chapter> {
    raw.into_iter()
        .filter(|c| !c.text.trim().is_empty())
        .enumerate()
        .map(|(index, c)| {
            let title = c
                .title
                .map(|t| collapse_whitespace(&t))
                .filter(|t| !t.is_empty());
            Chapter::new(index, title, c.text.trim())
        })
        .collect()
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============ Block-structured documents (DOCX, ODT) ============

/// Flat paragraph stream shared by the word-processor extractors.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Block {
    Paragraph {
        text: String,
        /// Outline level (1 = top); `Some(0)` marks a document title.
        heading: Option<u8>,
    },
    PageBreak,
}

/// Group blocks into chapters according to `strategy`.
pub(crate) fn chapters_from_blocks(
    blocks: &[Block],
    strategy: ChapterStrategy,
    heading_level: u8,
) -> Vec<RawChapter> {
    let is_boundary_heading =
        |h: &Option<u8>| matches!(h, Some(level) if *level <= heading_level);
    let has_headings = blocks.iter().any(|b| match b {
        Block::Paragraph { text, heading } => is_boundary_heading(heading) && !text.trim().is_empty(),
        Block::PageBreak => false,
    });
    let has_breaks = blocks.iter().any(|b| matches!(b, Block::PageBreak));

    let by_headings = match strategy {
        ChapterStrategy::Headings => true,
        ChapterStrategy::PageBreaks | ChapterStrategy::Single => false,
        _ => has_headings,
    };
    let by_breaks = match strategy {
        ChapterStrategy::PageBreaks => true,
        ChapterStrategy::Headings | ChapterStrategy::Single => false,
        _ => !has_headings && has_breaks,
    };

    let mut chapters = Vec::new();
    let mut current = RawChapter {
        title: None,
        text: String::new(),
    };
    let flush = |current: &mut RawChapter, chapters: &mut Vec<RawChapter>| {
        if !current.text.trim().is_empty() {
            chapters.push(std::mem::replace(
                current,
                RawChapter {
                    title: None,
                    text: String::new(),
                },
            ));
        } else {
            current.title = None;
            current.text.clear();
        }
    };

    for block in blocks {
        match block {
            Block::PageBreak => {
                if by_breaks {
                    flush(&mut current, &mut chapters);
                }
            }
            Block::Paragraph { text, heading } => {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if by_headings && is_boundary_heading(heading) {
                    flush(&mut current, &mut chapters);
                    current.title = Some(text.to_string());
                } else if by_breaks && current.text.is_empty() && heading.is_some() {
                    current.title = Some(text.to_string());
                }
                if !current.text.is_empty() {
                    current.text.push_str("\n\n");
                }
                current.text.push_str(text);
            }
        }
    }
    flush(&mut current, &mut chapters);
    chapters
}

// ============ Zip access ============

/// Zip archive with bounded entry reads.
pub(crate) struct Package<'a> {
    archive: zip::ZipArchive<std::io::Cursor<&'a [u8]>>,
    max_entry_bytes: u64,
}

impl<'a> Package<'a> {
    pub fn open(bytes: &'a [u8], max_entry_bytes: u64) -> Result<Self, ExtractError> {
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        Ok(Self {
            archive,
            max_entry_bytes,
        })
    }

    /// Read a required entry.
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>, ExtractError> {
        self.read_optional(name)?
            .ok_or_else(|| ExtractError::MissingEntry(name.to_string()))
    }

    /// Read an entry that may legitimately be absent.
    pub fn read_optional(&mut self, name: &str) -> Result<Option<Vec<u8>>, ExtractError> {
        let entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(ExtractError::Archive(format!("{}: {}", name, e))),
        };
        let mut out = Vec::new();
        entry
            .take(self.max_entry_bytes + 1)
            .read_to_end(&mut out)
            .map_err(|e| ExtractError::Archive(format!("{}: {}", name, e)))?;
        if out.len() as u64 > self.max_entry_bytes {
            return Err(ExtractError::EntryTooLarge {
                entry: name.to_string(),
                limit: self.max_entry_bytes,
            });
        }
        Ok(Some(out))
    }
}
