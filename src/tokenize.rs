//! Tokenizer-backed length metric.
//!
//! [`TokenCount`] measures text as the number of ids a Hugging Face
//! `tokenizer.json` produces, without special tokens. The tokenizer is loaded
//! once by the caller and shared immutably through an `Arc`, so one handle
//! serves every chapter split on the blocking pool.

use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::Arc;

use folio_core::{LengthMetric, MeasureError};

#[derive(Clone)]
pub struct TokenCount {
    tokenizer: Arc<tokenizers::Tokenizer>,
}

impl TokenCount {
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Load tokenizer {}: {}", path.display(), e))?;
        tracing::debug!(path = %path.display(), "loaded tokenizer");
        Ok(Self::new(tokenizer))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let tokenizer = tokenizers::Tokenizer::from_bytes(bytes)
            .map_err(|e| anyhow!("Parse tokenizer: {}", e))?;
        Ok(Self::new(tokenizer))
    }

    pub fn new(tokenizer: tokenizers::Tokenizer) -> Self {
        Self {
            tokenizer: Arc::new(tokenizer),
        }
    }
}

impl LengthMetric for TokenCount {
    fn measure(&self, text: &str) -> Result<usize, MeasureError> {
        self.tokenizer
            .encode(text, false)
            .map(|encoding| encoding.get_ids().len())
            .map_err(|e| MeasureError::new(format!("tokenize: {}", e)))
    }

    fn name(&self) -> &str {
        "tokens"
    }
}

impl std::fmt::Debug for TokenCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCount").finish_non_exhaustive()
    }
}

/// A word-level tokenizer with a whitespace pre-tokenizer: one id per word
/// or run of punctuation.
#[cfg(test)]
pub(crate) const TEST_TOKENIZER_JSON: &str = r#"{
  "version": "1.0",
  "truncation": null,
  "padding": null,
  "added_tokens": [],
  "normalizer": null,
  "pre_tokenizer": { "type": "Whitespace" },
  "post_processor": null,
  "decoder": null,
  "model": {
    "type": "WordLevel",
    "vocab": { "[UNK]": 0, "hello": 1, "world": 2 },
    "unk_token": "[UNK]"
  }
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_words_and_punctuation() {
        let metric = TokenCount::from_bytes(TEST_TOKENIZER_JSON.as_bytes()).unwrap();
        assert_eq!(metric.measure("").unwrap(), 0);
        assert_eq!(metric.measure("hello world").unwrap(), 2);
        assert_eq!(metric.measure("hello, unknown world!").unwrap(), 5);
        assert_eq!(metric.name(), "tokens");
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, TEST_TOKENIZER_JSON).unwrap();
        let metric = TokenCount::from_file(&path).unwrap();
        assert_eq!(metric.measure("hello hello hello").unwrap(), 3);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = TokenCount::from_file(Path::new("/nonexistent/tokenizer.json")).unwrap_err();
        assert!(err.to_string().contains("Load tokenizer"));
    }

    #[test]
    fn bounds_chunks_by_tokens() {
        use folio_core::{split_text, SplitConfig};

        let metric = TokenCount::from_bytes(TEST_TOKENIZER_JSON.as_bytes()).unwrap();
        let config = SplitConfig::builder(metric.clone())
            .chunk_size(4)
            .chunk_overlap(1)
            .build()
            .unwrap();
        let text = "hello world hello world hello world hello world";
        let chunks = split_text(text, &config).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(metric.measure(chunk).unwrap() <= 4);
        }
    }
}
