//! # Folio Core
//!
//! Pure, synchronous logic shared by every Folio front end: chapter and
//! chunk models, the [`LengthMetric`](metric::LengthMetric) strategy,
//! language-aware separator tables, the validated
//! [`SplitConfig`](config::SplitConfig), and the bounded-size splitter.
//!
//! This crate performs no I/O and pulls in no async runtime. Document
//! extraction, tokenizer loading, packaging and the CLI live in the `folio`
//! app crate.
//!
//! ## Example
//!
//! ```rust
//! use folio_core::config::SplitConfig;
//! use folio_core::metric::CharCount;
//! use folio_core::splitter::split_text;
//!
//! let config = SplitConfig::builder(CharCount)
//!     .chunk_size(4)
//!     .chunk_overlap(1)
//!     .separators(["\n\n", " ", ""])
//!     .build()
//!     .unwrap();
//!
//! let chunks = split_text("A.\n\nB.\n\nC.", &config).unwrap();
//! assert_eq!(chunks, vec!["A.\n\n", "B.\n\n", "\nC."]);
//! ```

pub mod config;
pub mod error;
pub mod metric;
pub mod models;
pub mod separators;
pub mod splitter;

pub use config::{SplitConfig, SplitConfigBuilder, SplitMode};
pub use error::{MeasureError, SplitError};
pub use metric::{CharCount, FnMetric, LengthMetric};
pub use models::{Chapter, Chunk};
pub use separators::{ContentKind, SeparatorPlacement};
pub use splitter::{split, split_text};
