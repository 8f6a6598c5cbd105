//! Batch and split progress reporting.
//!
//! Reports observable progress while `folio split` and `folio batch` extract,
//! split and package documents. Progress is emitted on **stderr** so stdout
//! (chunk text, JSON, or an archive streamed to `-o -`) stays parseable.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// Reading chapters out of a document.
    Extracting { document: String },
    /// `n` of `total` chapters split.
    Splitting { document: String, n: u64, total: u64 },
    /// Writing the output archive.
    Packaging { document: String, files: u64 },
}

/// Reports progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "folio book.epub  splitting  12 / 40 chapters".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Extracting { document } => {
                format!("folio {}  extracting...\n", document)
            }
            ProgressEvent::Splitting { document, n, total } => format!(
                "folio {}  splitting  {} / {} chapters\n",
                document,
                format_number(*n),
                format_number(*total)
            ),
            ProgressEvent::Packaging { document, files } => format!(
                "folio {}  packaging  {} files\n",
                document,
                format_number(*files)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Extracting { document } => serde_json::json!({
                "event": "progress",
                "document": document,
                "phase": "extracting"
            }),
            ProgressEvent::Splitting { document, n, total } => serde_json::json!({
                "event": "progress",
                "document": document,
                "phase": "splitting",
                "n": n,
                "total": total
            }),
            ProgressEvent::Packaging { document, files } => serde_json::json!({
                "event": "progress",
                "document": document,
                "phase": "packaging",
                "files": files
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// `--progress` flag value, falling back to the TTY default.
    pub fn from_flag(flag: Option<&str>) -> anyhow::Result<Self> {
        match flag {
            None => Ok(Self::default_for_tty()),
            Some("off") | Some("none") => Ok(ProgressMode::Off),
            Some("human") => Ok(ProgressMode::Human),
            Some("json") => Ok(ProgressMode::Json),
            Some(other) => anyhow::bail!("unknown progress mode '{}'; expected off, human or json", other),
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
