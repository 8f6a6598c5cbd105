//! Error types for configuration and measurement failures.
//!
//! Content never causes a split to fail: empty input, missing separators and
//! oversized units all have algorithmic fallbacks. Only a bad configuration or
//! a failing length metric surfaces as an error.

/// Failure raised by a [`LengthMetric`](crate::metric::LengthMetric).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureError {
    message: String,
}

impl MeasureError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for MeasureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for MeasureError {}

/// Splitter error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    /// Rejected before any text is touched: `chunk_overlap >= chunk_size`,
    /// `chunk_size == 0`, an empty separator list, or an unknown content tag.
    InvalidConfiguration(String),
    /// The injected length metric failed; no fallback metric is substituted.
    Measurement(MeasureError),
}

impl SplitError {
    pub fn invalid(message: impl Into<String>) -> Self {
        SplitError::InvalidConfiguration(message.into())
    }
}

impl std::fmt::Display for SplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitError::InvalidConfiguration(msg) => {
                write!(f, "invalid split configuration: {}", msg)
            }
            SplitError::Measurement(e) => write!(f, "length measurement failed: {}", e),
        }
    }
}

impl std::error::Error for SplitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SplitError::Measurement(e) => Some(e),
            SplitError::InvalidConfiguration(_) => None,
        }
    }
}

impl From<MeasureError> for SplitError {
    fn from(e: MeasureError) -> Self {
        SplitError::Measurement(e)
    }
}
