//! Bridge between configuration and the core splitter.
//!
//! Turns the string-typed `[chunking]` settings into a validated
//! [`SplitConfig`] over [`AnyMetric`], the closed set of metrics the
//! application can select at runtime. The core crate stays generic; this is
//! the one place the choice is made.

use anyhow::{bail, Context, Result};
use std::str::FromStr;

use folio_core::{CharCount, ContentKind, LengthMetric, MeasureError, SplitConfig, SplitError, SplitMode};

use crate::config::ChunkingConfig;
#[cfg(feature = "token-metric")]
use crate::tokenize::TokenCount;

pub use folio_core::{split, split_text, Chapter, Chunk};

/// Which length metric `[chunking].metric` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Chars,
    Tokens,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Chars => "chars",
            MetricKind::Tokens => "tokens",
        }
    }
}

impl FromStr for MetricKind {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chars" | "characters" => Ok(MetricKind::Chars),
            "tokens" => Ok(MetricKind::Tokens),
            other => Err(SplitError::invalid(format!(
                "unknown metric '{}'; expected 'chars' or 'tokens'",
                other
            ))),
        }
    }
}

/// Runtime-selected length metric.
#[derive(Debug, Clone)]
pub enum AnyMetric {
    Chars(CharCount),
    #[cfg(feature = "token-metric")]
    Tokens(TokenCount),
}

impl LengthMetric for AnyMetric {
    fn measure(&self, text: &str) -> Result<usize, MeasureError> {
        match self {
            AnyMetric::Chars(m) => m.measure(text),
            #[cfg(feature = "token-metric")]
            AnyMetric::Tokens(m) => m.measure(text),
        }
    }

    fn name(&self) -> &str {
        match self {
            AnyMetric::Chars(m) => m.name(),
            #[cfg(feature = "token-metric")]
            AnyMetric::Tokens(m) => m.name(),
        }
    }
}

/// Tokenizer handle a caller can load once and pass to [`resolve_metric`].
#[cfg(feature = "token-metric")]
pub type SharedTokenizer = TokenCount;
#[cfg(not(feature = "token-metric"))]
pub type SharedTokenizer = std::convert::Infallible;

/// Load the configured tokenizer up front when `metric = "tokens"`.
pub fn load_shared_tokenizer(settings: &ChunkingConfig) -> Result<Option<SharedTokenizer>> {
    if settings.metric.parse::<MetricKind>()? != MetricKind::Tokens {
        return Ok(None);
    }
    match resolve_metric(settings, None)? {
        #[cfg(feature = "token-metric")]
        AnyMetric::Tokens(tokens) => Ok(Some(tokens)),
        _ => Ok(None),
    }
}

/// Resolve the configured metric, loading the tokenizer when needed.
///
/// `preloaded` lets a long-running server reuse one tokenizer handle instead
/// of reading `tokenizer.json` per request.
pub fn resolve_metric(settings: &ChunkingConfig, preloaded: Option<&SharedTokenizer>) -> Result<AnyMetric> {
    match settings.metric.parse::<MetricKind>()? {
        MetricKind::Chars => Ok(AnyMetric::Chars(CharCount)),
        #[cfg(feature = "token-metric")]
        MetricKind::Tokens => {
            if let Some(tokens) = preloaded {
                return Ok(AnyMetric::Tokens(tokens.clone()));
            }
            let Some(path) = settings.tokenizer.as_deref() else {
                bail!("metric 'tokens' requires a tokenizer path");
            };
            Ok(AnyMetric::Tokens(TokenCount::from_file(path)?))
        }
        #[cfg(not(feature = "token-metric"))]
        MetricKind::Tokens => {
            let _ = preloaded;
            bail!("metric 'tokens' needs the `token-metric` feature")
        }
    }
}

/// Build the validated splitter configuration for `settings`.
pub fn build_split_config(settings: &ChunkingConfig, metric: AnyMetric) -> Result<SplitConfig<AnyMetric>> {
    let kind: ContentKind = settings.content.parse()?;
    let mode: SplitMode = settings.mode.parse()?;
    let config = SplitConfig::builder(metric)
        .content(kind)
        .mode(mode)
        .chunk_size(settings.chunk_size)
        .chunk_overlap(settings.chunk_overlap)
        .build()
        .context("Failed to build splitter configuration")?;

    tracing::debug!(
        chunk_size = config.chunk_size(),
        chunk_overlap = config.chunk_overlap(),
        content = %kind,
        mode = %mode,
        metric = config.metric().name(),
        "split configuration ready"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_kind_parsing() {
        assert_eq!("chars".parse::<MetricKind>().unwrap(), MetricKind::Chars);
        assert_eq!("TOKENS".parse::<MetricKind>().unwrap(), MetricKind::Tokens);
        assert!("bytes".parse::<MetricKind>().is_err());
    }

    #[test]
    fn default_settings_build_char_config() {
        let settings = ChunkingConfig::default();
        let metric = resolve_metric(&settings, None).unwrap();
        let config = build_split_config(&settings, metric).unwrap();
        assert_eq!(config.chunk_size(), 1950);
        assert_eq!(config.metric().name(), "chars");
        assert_eq!(config.mode(), SplitMode::Recursive);
    }

    #[test]
    fn invalid_overlap_surfaces_split_error() {
        let settings = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..ChunkingConfig::default()
        };
        let err = build_split_config(&settings, AnyMetric::Chars(CharCount)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SplitError>(),
            Some(SplitError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn content_and_mode_are_applied() {
        let settings = ChunkingConfig {
            content: "python".to_string(),
            mode: "flat".to_string(),
            ..ChunkingConfig::default()
        };
        let config = build_split_config(&settings, AnyMetric::Chars(CharCount)).unwrap();
        assert_eq!(config.separators()[0], "\nclass ");
        assert_eq!(config.mode(), SplitMode::Flat);
    }

    #[cfg(feature = "token-metric")]
    #[test]
    fn preloaded_tokenizer_is_reused() {
        let tokens = TokenCount::from_bytes(crate::tokenize::TEST_TOKENIZER_JSON.as_bytes()).unwrap();
        let settings = ChunkingConfig {
            metric: "tokens".to_string(),
            ..ChunkingConfig::default()
        };
        let metric = resolve_metric(&settings, Some(&tokens)).unwrap();
        assert_eq!(metric.name(), "tokens");
        assert_eq!(metric.measure("hello world").unwrap(), 2);
    }
}
