//! # Folio
//!
//! Split EPUB, DOCX, ODT and plain-text documents into chapters, then into
//! bounded, overlapping, prompt-sized chunks, optionally prefixed with a
//! fixed instruction and packaged as a zip of text files.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │ Extractor  │──▶│ Pipeline  │──▶│  Packager  │──▶│   zip    │
//! │ EPUB/DOCX/ │   │ parallel  │   │ names +    │   │ / text / │
//! │ ODT/text   │   │ split     │   │ manifest   │   │   JSON   │
//! └────────────┘   └─────┬─────┘   └────────────┘   └──────────┘
//!                        ▼
//!                  folio-core splitter
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! folio chapters novel.epub
//! folio split novel.epub --chunk-size 1500 --overlap 50 --output novel.zip
//! cat notes.txt | folio split - --no-prefix --json
//! folio batch ./books --output-dir ./out
//! folio serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | Chapter extraction per document format |
//! | [`chunk`] | Config → splitter bridge, runtime metric choice |
//! | [`tokenize`] | Tokenizer-backed length metric |
//! | [`pipeline`] | Parallel chapter splitting |
//! | [`package`] | Zip packaging |
//! | [`job`] | One document end to end |
//! | [`inputs`] | Directory scanning for batch runs |
//! | [`progress`] | Progress reporting on stderr |
//! | [`render`] | Human-readable output |
//! | [`commands`] | CLI command implementations |
//! | [`server`] | HTTP service |

pub mod chunk;
pub mod commands;
pub mod config;
pub mod extract;
pub mod inputs;
pub mod job;
pub mod package;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod server;
#[cfg(feature = "token-metric")]
pub mod tokenize;

pub use folio_core as core;
