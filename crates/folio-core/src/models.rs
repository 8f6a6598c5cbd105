//! Core data models shared by the splitter and every front end.
//!
//! A document is an ordered `Vec<Chapter>`; splitting a chapter yields an
//! ordered `Vec<Chunk>`. Both are plain values, immutable once built.

use serde::{Deserialize, Serialize};

/// One chapter of an extracted document.
///
/// `text` is plain text with markup already removed. `index` is the 0-based
/// position in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
}

impl Chapter {
    pub fn new(index: usize, title: Option<String>, text: impl Into<String>) -> Self {
        Self {
            index,
            title,
            text: text.into(),
        }
    }

    /// True when the chapter holds nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Title if present, otherwise `"Chapter N"` (1-based).
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(t) if !t.trim().is_empty() => t.trim().to_string(),
            _ => format!("Chapter {}", self.index + 1),
        }
    }
}

/// A bounded slice of a chapter's text.
///
/// `start..end` is the byte range of `text` inside the source it was cut
/// from, so consecutive chunks overlap exactly where `next.start < prev.end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Chunk {
    /// Byte length of the overlap shared with the following chunk.
    pub fn overlap_with(&self, next: &Chunk) -> usize {
        self.end.saturating_sub(next.start)
    }
}
