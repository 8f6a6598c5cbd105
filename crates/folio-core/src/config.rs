//! Validated splitter configuration.
//!
//! [`SplitConfig`] is immutable and can only be obtained through
//! [`SplitConfigBuilder::build`], which rejects inconsistent settings before
//! any text is touched. The length metric is a generic parameter so the hot
//! measuring loop is statically dispatched.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SplitError;
use crate::metric::LengthMetric;
use crate::separators::{ContentKind, SeparatorPlacement};

pub const DEFAULT_CHUNK_SIZE: usize = 1950;
pub const DEFAULT_CHUNK_OVERLAP: usize = 10;

/// How separators are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Full separator hierarchy with hard-cut fallback; every chunk honours
    /// the size bound.
    #[default]
    Recursive,
    /// Only the first separator is used; oversized pieces pass through.
    Flat,
}

impl SplitMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SplitMode::Recursive => "recursive",
            SplitMode::Flat => "flat",
        }
    }
}

impl std::fmt::Display for SplitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SplitMode {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recursive" => Ok(SplitMode::Recursive),
            "flat" | "character" => Ok(SplitMode::Flat),
            other => Err(SplitError::invalid(format!(
                "unknown split mode '{}'; expected 'recursive' or 'flat'",
                other
            ))),
        }
    }
}

/// Immutable splitting parameters plus the injected length metric.
#[derive(Debug, Clone)]
pub struct SplitConfig<M> {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
    placement: SeparatorPlacement,
    mode: SplitMode,
    metric: M,
}

impl<M: LengthMetric> SplitConfig<M> {
    /// Start a builder with the default size, overlap and `text` separators.
    pub fn builder(metric: M) -> SplitConfigBuilder<M> {
        SplitConfigBuilder::new(metric)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn separators(&self) -> &[String] {
        &self.separators
    }

    pub fn placement(&self) -> SeparatorPlacement {
        self.placement
    }

    pub fn mode(&self) -> SplitMode {
        self.mode
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }
}

/// Builder for [`SplitConfig`].
///
/// Choosing a [`ContentKind`] sets both the separator list and the
/// placement; explicit `separators` / `placement` calls made afterwards
/// override it.
#[derive(Debug, Clone)]
pub struct SplitConfigBuilder<M> {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
    placement: SeparatorPlacement,
    mode: SplitMode,
    metric: M,
}

impl<M: LengthMetric> SplitConfigBuilder<M> {
    pub fn new(metric: M) -> Self {
        let kind = ContentKind::default();
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: kind.separators().iter().map(|s| s.to_string()).collect(),
            placement: kind.placement(),
            mode: SplitMode::default(),
            metric,
        }
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = overlap;
        self
    }

    pub fn separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    pub fn content(mut self, kind: ContentKind) -> Self {
        self.separators = kind.separators().iter().map(|s| s.to_string()).collect();
        self.placement = kind.placement();
        self
    }

    pub fn placement(mut self, placement: SeparatorPlacement) -> Self {
        self.placement = placement;
        self
    }

    pub fn mode(mut self, mode: SplitMode) -> Self {
        self.mode = mode;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<SplitConfig<M>, SplitError> {
        if self.chunk_size == 0 {
            return Err(SplitError::invalid("chunk_size must be greater than 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(SplitError::invalid(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.separators.is_empty() {
            return Err(SplitError::invalid("separator list must not be empty"));
        }

        Ok(SplitConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            separators: self.separators,
            placement: self.placement,
            mode: self.mode,
            metric: self.metric,
        })
    }
}
