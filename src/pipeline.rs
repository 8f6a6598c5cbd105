//! Parallel chapter splitting.
//!
//! Each chapter is split on tokio's blocking pool; the [`SplitConfig`] (and
//! the metric inside it) is shared read-only through an `Arc`. Results come
//! back in completion order and are put back into document order before
//! returning. The optional prefix is applied here, never by the splitter.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;

use folio_core::{split, Chapter, Chunk, LengthMetric, SplitConfig};

use crate::progress::{ProgressEvent, ProgressReporter};

/// Split output for one chapter.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterChunks {
    pub chapter: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub chunks: Vec<Chunk>,
    /// `prefix + chunk.text` for every chunk; equal to the chunk text when
    /// no prefix is configured.
    pub prefixed: Vec<String>,
}

impl ChapterChunks {
    fn new(chapter: &Chapter, chunks: Vec<Chunk>, prefix: Option<&str>) -> Self {
        let prefixed = chunks
            .iter()
            .map(|c| match prefix {
                Some(p) => format!("{}{}", p, c.text),
                None => c.text.clone(),
            })
            .collect();
        Self {
            chapter: chapter.index,
            title: chapter.title.clone(),
            chunks,
            prefixed,
        }
    }
}

/// Split every chapter concurrently.
pub async fn split_chapters<M>(
    chapters: Vec<Chapter>,
    config: Arc<SplitConfig<M>>,
    prefix: Option<String>,
    document: &str,
    progress: &dyn ProgressReporter,
) -> Result<Vec<ChapterChunks>>
where
    M: LengthMetric + 'static,
{
    let total = chapters.len() as u64;
    let prefix: Option<Arc<str>> = prefix.map(Arc::from);
    let mut set = JoinSet::new();

    for (slot, chapter) in chapters.into_iter().enumerate() {
        let config = Arc::clone(&config);
        let prefix = prefix.clone();
        set.spawn_blocking(move || {
            let chunks = if chapter.is_blank() {
                Vec::new()
            } else {
                split(&chapter.text, &config)
                    .with_context(|| format!("Failed to split chapter {}", chapter.index + 1))?
            };
            tracing::debug!(chapter = chapter.index, chunks = chunks.len(), "chapter split");
            Ok::<_, anyhow::Error>((slot, ChapterChunks::new(&chapter, chunks, prefix.as_deref())))
        });
    }

    let mut results: Vec<Option<ChapterChunks>> = (0..total).map(|_| None).collect();
    let mut done = 0u64;
    while let Some(joined) = set.join_next().await {
        let (slot, chunks) = joined.map_err(|e| anyhow!("Split task failed: {}", e))??;
        results[slot] = Some(chunks);
        done += 1;
        progress.report(ProgressEvent::Splitting {
            document: document.to_string(),
            n: done,
            total,
        });
    }

    Ok(results.into_iter().flatten().collect())
}

/// Chapters as single unsplit pieces, for whole-chapter output.
pub fn whole_chapters(chapters: &[Chapter], prefix: Option<&str>) -> Vec<ChapterChunks> {
    chapters
        .iter()
        .map(|chapter| {
            let chunks = if chapter.is_blank() {
                Vec::new()
            } else {
                vec![Chunk {
                    index: 0,
                    text: chapter.text.clone(),
                    start: 0,
                    end: chapter.text.len(),
                }]
            };
            ChapterChunks::new(chapter, chunks, prefix)
        })
        .collect()
}

/// A `--chapter` / `?chapter=` selection outside the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterOutOfRange {
    pub requested: usize,
    pub available: usize,
}

impl std::fmt::Display for ChapterOutOfRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "chapter {} out of range; document has {} chapter(s)",
            self.requested, self.available
        )
    }
}

impl std::error::Error for ChapterOutOfRange {}

/// Keep only chapter `number` (1-based, as shown to users).
pub fn select_chapter(chapters: Vec<Chapter>, number: usize) -> Result<Vec<Chapter>> {
    if number == 0 || number > chapters.len() {
        return Err(ChapterOutOfRange {
            requested: number,
            available: chapters.len(),
        }
        .into());
    }
    Ok(chapters.into_iter().filter(|c| c.index + 1 == number).collect())
}
