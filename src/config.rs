//! TOML configuration.
//!
//! Every section is optional; a missing file section falls back to the
//! built-in defaults, and running without `--config` is the same as an empty
//! file. CLI flags and HTTP query parameters override file values and are
//! re-checked with [`Config::validate`].

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use folio_core::config::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use folio_core::{ContentKind, SplitMode};

use crate::chunk::MetricKind;
use crate::extract::ChapterStrategy;

/// Instruction prepended to every chunk unless disabled.
pub const DEFAULT_PREFIX: &str = "translate following text from chinese to english\n";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub chunking: ChunkingConfig,
    pub extract: ExtractConfig,
    pub output: OutputConfig,
    pub inputs: InputsConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub mode: String,
    pub content: String,
    pub metric: String,
    /// Path to a `tokenizer.json`; required when `metric = "tokens"`.
    pub tokenizer: Option<PathBuf>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            mode: "recursive".to_string(),
            content: "text".to_string(),
            metric: "chars".to_string(),
            tokenizer: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ExtractConfig {
    pub strategy: String,
    /// Deepest heading level that starts a chapter (DOCX / ODT).
    pub heading_level: u8,
    /// Decompressed size limit for a single archive entry.
    pub max_entry_bytes: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            strategy: "auto".to_string(),
            heading_level: 1,
            max_entry_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    /// Text prepended to every chunk. `None` or `""` disables it.
    pub prefix: Option<String>,
    pub pad_width: usize,
    pub manifest: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: Some(DEFAULT_PREFIX.to_string()),
            pad_width: 3,
            manifest: true,
        }
    }
}

impl OutputConfig {
    pub fn effective_prefix(&self) -> Option<&str> {
        self.prefix.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct InputsConfig {
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            include_globs: vec![
                "**/*.epub".to_string(),
                "**/*.docx".to_string(),
                "**/*.odt".to_string(),
                "**/*.txt".to_string(),
            ],
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7341".to_string(),
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Check every cross-field rule. Called after loading and again after
    /// CLI overrides are applied.
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if c.chunk_overlap >= c.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                c.chunk_overlap,
                c.chunk_size
            );
        }
        c.mode
            .parse::<SplitMode>()
            .with_context(|| "invalid chunking.mode")?;
        c.content
            .parse::<ContentKind>()
            .with_context(|| "invalid chunking.content")?;
        let metric = c
            .metric
            .parse::<MetricKind>()
            .with_context(|| "invalid chunking.metric")?;
        if metric == MetricKind::Tokens && c.tokenizer.is_none() {
            bail!("chunking.tokenizer must be set when chunking.metric is 'tokens'");
        }

        self.extract
            .strategy
            .parse::<ChapterStrategy>()
            .with_context(|| "invalid extract.strategy")?;
        if !(1..=6).contains(&self.extract.heading_level) {
            bail!("extract.heading_level must be in 1..=6");
        }
        if self.extract.max_entry_bytes == 0 {
            bail!("extract.max_entry_bytes must be > 0");
        }

        if !(1..=6).contains(&self.output.pad_width) {
            bail!("output.pad_width must be in 1..=6");
        }
        if self.server.max_upload_bytes == 0 {
            bail!("server.max_upload_bytes must be > 0");
        }
        Ok(())
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("warn")
    }
}

/// Read, parse and validate a config file.
///
/// A relative `chunking.tokenizer` path is resolved against the directory
/// containing the config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if let Some(tok) = config.chunking.tokenizer.as_mut() {
        if tok.is_relative() {
            if let Some(dir) = path.parent() {
                *tok = dir.join(&*tok);
            }
        }
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.chunking.chunk_size, 1950);
        assert_eq!(config.chunking.chunk_overlap, 10);
        assert_eq!(config.output.effective_prefix(), Some(DEFAULT_PREFIX));
        assert_eq!(config.server.bind, "127.0.0.1:7341");
        assert_eq!(config.log_level(), "warn");
    }

    #[test]
    fn empty_file_uses_defaults() {
        let f = write_config("");
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.chunking.mode, "recursive");
        assert_eq!(config.extract.heading_level, 1);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let f = write_config(
            r#"
log_level = "debug"

[chunking]
chunk_size = 500
content = "prose"

[output]
prefix = ""
"#,
        );
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 10);
        assert_eq!(config.chunking.content, "prose");
        assert_eq!(config.output.effective_prefix(), None);
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        let f = write_config("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn unknown_content_kind_is_rejected() {
        let f = write_config("[chunking]\ncontent = \"klingon\"\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("klingon"));
    }

    #[test]
    fn tokens_metric_requires_tokenizer() {
        let f = write_config("[chunking]\nmetric = \"tokens\"\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("tokenizer"));
    }

    #[test]
    fn relative_tokenizer_is_resolved_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.toml");
        std::fs::write(
            &path,
            "[chunking]\nmetric = \"tokens\"\ntokenizer = \"models/tokenizer.json\"\n",
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(
            config.chunking.tokenizer.unwrap(),
            dir.path().join("models/tokenizer.json")
        );
    }

    #[test]
    fn heading_level_and_pad_width_bounds() {
        let mut config = Config::default();
        config.extract.heading_level = 7;
        assert!(config.validate().is_err());
        config.extract.heading_level = 2;
        config.output.pad_width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let mut config = Config::default();
        config.extract.strategy = "by-vibes".to_string();
        assert!(config.validate().is_err());
    }
}
