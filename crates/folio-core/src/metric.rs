//! Length metrics used to test the chunk-size bound.
//!
//! A metric is injected into [`SplitConfig`](crate::config::SplitConfig) at
//! construction time and must be pure: the same text always measures the same,
//! and measuring has no side effects. Tokenizer-backed metrics live in the app
//! crate; they hold their own immutable tokenizer handle.

use crate::error::MeasureError;

/// Strategy that maps text to a non-negative size.
///
/// The splitter assumes the metric is monotone over prefixes and suffixes
/// (a longer slice never measures smaller), which holds for character counts
/// and, in practice, for subword tokenizers.
pub trait LengthMetric: Send + Sync {
    /// Measure `text`.
    fn measure(&self, text: &str) -> Result<usize, MeasureError>;

    /// Short identifier used in logs and archive manifests.
    fn name(&self) -> &str {
        "custom"
    }
}

/// Counts Unicode scalar values, the equivalent of Python's `len(str)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharCount;

impl LengthMetric for CharCount {
    fn measure(&self, text: &str) -> Result<usize, MeasureError> {
        Ok(text.chars().count())
    }

    fn name(&self) -> &str {
        "chars"
    }
}

/// Adapts a plain function or closure into a [`LengthMetric`].
///
/// ```rust
/// use folio_core::metric::{FnMetric, LengthMetric};
///
/// let words = FnMetric::new(|t: &str| Ok(t.split_whitespace().count()));
/// assert_eq!(words.measure("two words").unwrap(), 2);
/// ```
#[derive(Clone)]
pub struct FnMetric<F> {
    f: F,
}

impl<F> FnMetric<F>
where
    F: Fn(&str) -> Result<usize, MeasureError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> LengthMetric for FnMetric<F>
where
    F: Fn(&str) -> Result<usize, MeasureError> + Send + Sync,
{
    fn measure(&self, text: &str) -> Result<usize, MeasureError> {
        (self.f)(text)
    }
}

impl<M: LengthMetric + ?Sized> LengthMetric for &M {
    fn measure(&self, text: &str) -> Result<usize, MeasureError> {
        (**self).measure(text)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<M: LengthMetric + ?Sized> LengthMetric for std::sync::Arc<M> {
    fn measure(&self, text: &str) -> Result<usize, MeasureError> {
        (**self).measure(text)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
