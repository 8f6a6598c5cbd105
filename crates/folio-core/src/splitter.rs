//! Bounded-size text splitter with overlap.
//!
//! Splits a chapter into [`Chunk`]s whose measured length never exceeds
//! `chunk_size` (recursive mode), with consecutive chunks sharing a trailing
//! slice of at most `chunk_overlap`. Lengths come from the injected
//! [`LengthMetric`], so the same code bounds chunks by characters or by
//! tokenizer ids.
//!
//! # Algorithm
//!
//! 1. **Atomize.** Find the first separator (coarsest first) that occurs in
//!    the text and split on every occurrence, keeping the separator on the
//!    side given by [`SeparatorPlacement`]. Pieces that fit are atomic;
//!    larger pieces recurse with the next separator. When no separator is
//!    left (or the next one is `""`), cut on character boundaries into the
//!    longest prefixes that fit.
//! 2. **Merge.** Walk the pieces with a contiguous buffer. A piece is
//!    appended while the buffer still fits. Otherwise the buffer is closed as
//!    a chunk and the next buffer is seeded with the longest proper suffix of
//!    that chunk whose length is within `chunk_overlap`.
//! 3. **Make room.** When the seed plus the next piece is too long, a piece
//!    cut out by a separator is never split again: the seed gives up leading
//!    characters, all of them if needed, until the piece fits whole. Pieces
//!    that came from a character cut carry no structure, so they are instead
//!    re-cut to the room left behind the seed, keeping the overlap.
//!
//! Nothing is trimmed or dropped: chunks are byte ranges of the input, and
//! removing each chunk's overlap with its predecessor reassembles the text.
//!
//! Flat mode only uses the first separator and lets oversized pieces through
//! as chunks of their own.

use std::collections::VecDeque;

use crate::config::{SplitConfig, SplitMode};
use crate::error::SplitError;
use crate::metric::LengthMetric;
use crate::models::Chunk;
use crate::separators::SeparatorPlacement;

/// Split `text` into bounded, overlapping chunks.
///
/// Returns an empty vector for empty input and a single chunk when the
/// whole text already fits. Fails only when the metric fails.
pub fn split<M: LengthMetric>(text: &str, config: &SplitConfig<M>) -> Result<Vec<Chunk>, SplitError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let splitter = Splitter { text, config };
    let spans = if splitter.fits(0, text.len())? {
        vec![(0, text.len())]
    } else {
        let pieces = match config.mode() {
            SplitMode::Recursive => {
                let mut out = Vec::new();
                splitter.atomize(0, text.len(), 0, &mut out)?;
                out
            }
            SplitMode::Flat => splitter.flat_pieces()?,
        };
        splitter.merge(pieces)?
    };

    Ok(spans
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| Chunk {
            index,
            text: text[start..end].to_string(),
            start,
            end,
        })
        .collect())
}

/// Same as [`split`], returning only the chunk texts.
pub fn split_text<M: LengthMetric>(
    text: &str,
    config: &SplitConfig<M>,
) -> Result<Vec<String>, SplitError> {
    Ok(split(text, config)?.into_iter().map(|c| c.text).collect())
}

/// A byte range of the input that the merge step treats as one unit.
///
/// `cut` marks pieces produced by a character cut rather than a separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Piece {
    start: usize,
    end: usize,
    cut: bool,
}

struct Splitter<'a, M> {
    text: &'a str,
    config: &'a SplitConfig<M>,
}

impl<'a, M: LengthMetric> Splitter<'a, M> {
    fn measure(&self, start: usize, end: usize) -> Result<usize, SplitError> {
        Ok(self.config.metric().measure(&self.text[start..end])?)
    }

    fn fits(&self, start: usize, end: usize) -> Result<bool, SplitError> {
        if start >= end {
            return Ok(true);
        }
        Ok(self.measure(start, end)? <= self.config.chunk_size())
    }

    /// Char boundaries of `start..end`, both ends included.
    fn boundaries(&self, start: usize, end: usize) -> Vec<usize> {
        self.text[start..end]
            .char_indices()
            .map(|(i, _)| start + i)
            .chain(std::iter::once(end))
            .collect()
    }

    /// First usable separator at or after `level` that occurs in the slice.
    /// `None` means the list is exhausted or reached `""`.
    fn find_separator(&self, start: usize, end: usize, level: usize) -> Option<usize> {
        let slice = &self.text[start..end];
        for (i, sep) in self.config.separators().iter().enumerate().skip(level) {
            if sep.is_empty() {
                return None;
            }
            if slice.contains(sep.as_str()) {
                return Some(i);
            }
        }
        None
    }

    /// Split `start..end` on every occurrence of `sep`, keeping the separator.
    fn split_on(&self, start: usize, end: usize, sep: &str) -> Vec<(usize, usize)> {
        let slice = &self.text[start..end];
        let mut cuts: Vec<usize> = slice
            .match_indices(sep)
            .map(|(m, _)| match self.config.placement() {
                SeparatorPlacement::End => start + m + sep.len(),
                SeparatorPlacement::Start => start + m,
            })
            .filter(|&cut| cut > start && cut < end)
            .collect();
        cuts.push(end);

        let mut ranges = Vec::with_capacity(cuts.len());
        let mut from = start;
        for cut in cuts {
            if cut > from {
                ranges.push((from, cut));
                from = cut;
            }
        }
        ranges
    }

    fn atomize(
        &self,
        start: usize,
        end: usize,
        level: usize,
        out: &mut Vec<Piece>,
    ) -> Result<(), SplitError> {
        match self.find_separator(start, end, level) {
            Some(idx) => {
                let sep = &self.config.separators()[idx];
                for (s, e) in self.split_on(start, end, sep) {
                    if self.fits(s, e)? {
                        out.push(Piece {
                            start: s,
                            end: e,
                            cut: false,
                        });
                    } else {
                        self.atomize(s, e, idx + 1, out)?;
                    }
                }
                Ok(())
            }
            None => self.hard_cut(start, end, out),
        }
    }

    /// Longest-prefix character cuts; every piece holds at least one char.
    fn hard_cut(&self, start: usize, end: usize, out: &mut Vec<Piece>) -> Result<(), SplitError> {
        let bounds = self.boundaries(start, end);
        let last = bounds.len() - 1;
        let mut i = 0;
        while i < last {
            let from = bounds[i];
            let k = largest_fitting(last - i, |k| self.fits(from, bounds[i + k]))?.max(1);
            out.push(Piece {
                start: from,
                end: bounds[i + k],
                cut: true,
            });
            i += k;
        }
        Ok(())
    }

    fn flat_pieces(&self) -> Result<Vec<Piece>, SplitError> {
        let end = self.text.len();
        let first = self.config.separators().first().map(String::as_str).unwrap_or("");
        if first.is_empty() {
            let mut out = Vec::new();
            self.hard_cut(0, end, &mut out)?;
            return Ok(out);
        }
        Ok(self
            .split_on(0, end, first)
            .into_iter()
            .map(|(start, end)| Piece { start, end, cut: false })
            .collect())
    }

    /// Re-cut a character-cut piece so its head fits behind the buffer
    /// starting at `buf_start`. `None` when no character fits there.
    fn cut_behind(&self, piece: Piece, buf_start: usize) -> Result<Option<[Piece; 2]>, SplitError> {
        let bounds = self.boundaries(piece.start, piece.end);
        let last = bounds.len() - 1;
        if last < 2 {
            return Ok(None);
        }
        let k = largest_fitting(last - 1, |k| self.fits(buf_start, bounds[k]))?;
        if k == 0 {
            return Ok(None);
        }
        let cut = bounds[k];
        Ok(Some([
            Piece {
                end: cut,
                ..piece
            },
            Piece {
                start: cut,
                ..piece
            },
        ]))
    }

    /// Start of the longest proper suffix of `start..end` within the overlap.
    fn overlap_start(&self, start: usize, end: usize) -> Result<usize, SplitError> {
        let overlap = self.config.chunk_overlap();
        if overlap == 0 {
            return Ok(end);
        }
        let bounds = self.boundaries(start, end);
        let n = bounds.len() - 1;
        if n < 2 {
            return Ok(end);
        }
        let k = largest_fitting(n - 1, |k| Ok(self.measure(bounds[n - k], end)? <= overlap))?;
        Ok(bounds[n - k])
    }

    /// Drop leading seed characters until `piece_end` fits, or drop the seed.
    fn shrink_seed(&self, buf_start: usize, cursor: usize, piece_end: usize) -> Result<usize, SplitError> {
        let bounds = self.boundaries(buf_start, cursor);
        let m = bounds.len() - 1;
        let k = largest_fitting(m, |k| self.fits(bounds[m - k], piece_end))?;
        Ok(bounds[m - k])
    }

    fn merge(&self, pieces: Vec<Piece>) -> Result<Vec<(usize, usize)>, SplitError> {
        let refinable = self.config.mode() == SplitMode::Recursive;
        let mut queue: VecDeque<Piece> = pieces.into();
        let mut spans = Vec::new();

        // buffer is text[buf_start..cursor]; text[buf_start..fresh] is the seed
        let mut buf_start = 0;
        let mut cursor = 0;
        let mut fresh = 0;

        while let Some(piece) = queue.pop_front() {
            if self.fits(buf_start, piece.end)? {
                cursor = piece.end;
                continue;
            }

            if cursor > fresh {
                spans.push((buf_start, cursor));
                buf_start = self.overlap_start(buf_start, cursor)?;
                fresh = cursor;
                queue.push_front(piece);
                continue;
            }

            if refinable && piece.cut {
                if let Some([head, tail]) = self.cut_behind(piece, buf_start)? {
                    queue.push_front(tail);
                    queue.push_front(head);
                    continue;
                }
            }

            if buf_start < cursor {
                buf_start = self.shrink_seed(buf_start, cursor, piece.end)?;
                queue.push_front(piece);
                continue;
            }

            // Nothing fits even on an empty buffer. Recursive mode gives up one
            // character at a time; flat mode emits the piece whole.
            if refinable {
                let next = self.text[piece.start..piece.end]
                    .chars()
                    .next()
                    .map(|c| piece.start + c.len_utf8())
                    .unwrap_or(piece.end);
                cursor = next;
                if next < piece.end {
                    queue.push_front(Piece {
                        start: next,
                        ..piece
                    });
                }
            } else {
                cursor = piece.end;
            }
        }

        if cursor > fresh {
            spans.push((buf_start, cursor));
        }
        Ok(spans)
    }
}

/// Largest `k` in `0..=max` with `fits(k)`, assuming `fits(0)` holds and
/// `fits` is monotone. Gallops from 1 then bisects, so a cut near the start
/// of a long slice costs a handful of measurements. The returned `k` was
/// always checked, so the bound holds even for a non-monotone metric.
fn largest_fitting<F>(max: usize, mut fits: F) -> Result<usize, SplitError>
where
    F: FnMut(usize) -> Result<bool, SplitError>,
{
    let mut lo = 0;
    let mut hi = max + 1;
    let mut k = 1;
    while k <= max {
        if fits(k)? {
            lo = k;
            k *= 2;
        } else {
            hi = k;
            break;
        }
    }
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if fits(mid)? {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeasureError;
    use crate::metric::{CharCount, FnMetric};
    use crate::separators::ContentKind;

    fn chars(size: usize, overlap: usize, seps: &[&str]) -> SplitConfig<CharCount> {
        SplitConfig::builder(CharCount)
            .chunk_size(size)
            .chunk_overlap(overlap)
            .separators(seps.iter().copied())
            .build()
            .unwrap()
    }

    fn reassemble(text: &str, chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for c in chunks {
            assert!(c.start <= covered, "gap before chunk {}", c.index);
            out.push_str(&text[covered..c.end]);
            covered = c.end;
        }
        out
    }

    #[test]
    fn paragraphs_with_single_char_overlap() {
        let config = chars(4, 1, &["\n\n", " ", ""]);
        let chunks = split_text("A.\n\nB.\n\nC.", &config).unwrap();
        assert_eq!(chunks, vec!["A.\n\n", "B.\n\n", "\nC."]);
    }

    #[test]
    fn fitting_words_are_never_cut_to_keep_overlap() {
        let config = chars(10, 3, &[" ", ""]);
        let chunks = split_text("abcdefghi klmnopqrs", &config).unwrap();
        assert_eq!(chunks, vec!["abcdefghi ", " klmnopqrs"]);
    }

    #[test]
    fn fitting_paragraph_stays_in_one_chunk() {
        let config = SplitConfig::builder(CharCount)
            .chunk_size(30)
            .chunk_overlap(5)
            .build()
            .unwrap();
        let text = "First paragraph is right here.\n\nSecond one fits in thirty.";
        let chunks = split_text(text, &config).unwrap();
        assert!(chunks.iter().all(|c| c.chars().count() <= 30));
        assert!(
            chunks.iter().any(|c| c.contains("Second one fits in thirty.")),
            "paragraph was cut: {:?}",
            chunks
        );
    }

    #[test]
    fn character_cuts_still_carry_overlap() {
        let config = chars(6, 2, &[""]);
        let text = "abcdefghijklmnop";
        let chunks = split(text, &config).unwrap();
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 6));
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end - pair[1].start, 2);
        }
        assert_eq!(reassemble(text, &chunks), text);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let config = chars(10, 2, &["\n\n", ""]);
        assert!(split("", &config).unwrap().is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let config = SplitConfig::builder(CharCount).build().unwrap();
        let chunks = split("Short enough.", &config).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short enough.");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 13));
    }

    #[test]
    fn whitespace_only_text_is_kept() {
        let config = chars(4, 0, &["\n", ""]);
        let text = "\n\n\n\n\n\n";
        let chunks = split(text, &config).unwrap();
        assert_eq!(reassemble(text, &chunks), text);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 4));
    }

    #[test]
    fn repeated_words_respect_bound_and_count() {
        let text = "word ".repeat(10_000);
        let config = chars(50, 10, &[" ", ""]);
        let chunks = split(&text, &config).unwrap();
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 50));
        let len = text.chars().count();
        assert!(chunks.len() >= len / 50);
        assert!(chunks.len() <= len / (50 - 10) + 2);
        assert_eq!(reassemble(&text, &chunks), text);
        for pair in chunks.windows(2) {
            let shared = &text[pair[1].start..pair[0].end];
            assert!(!shared.is_empty());
            assert!(shared.chars().count() <= 10);
        }
    }

    #[test]
    fn cjk_without_separators_is_cut_on_char_boundaries() {
        let config = chars(4, 1, &["\n\n", "\n", " ", ""]);
        let chunks = split_text("一二三四五六七八九十", &config).unwrap();
        assert_eq!(chunks, vec!["一二三四", "四五六七", "七八九十"]);
    }

    #[test]
    fn zero_overlap_chunks_are_disjoint() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let config = chars(12, 0, &[" ", ""]);
        let chunks = split(text, &config).unwrap();
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn code_separators_open_the_next_piece() {
        let config = SplitConfig::builder(CharCount)
            .content(ContentKind::Rust)
            .chunk_size(12)
            .chunk_overlap(0)
            .build()
            .unwrap();
        let chunks = split_text("use x;\nfn a() {}\nfn b() {}", &config).unwrap();
        assert_eq!(chunks, vec!["use x;", "\nfn a() {}", "\nfn b() {}"]);
    }

    #[test]
    fn flat_mode_lets_oversized_pieces_through() {
        let config = SplitConfig::builder(CharCount)
            .chunk_size(5)
            .chunk_overlap(0)
            .separators(["\n\n"])
            .mode(SplitMode::Flat)
            .build()
            .unwrap();
        let chunks = split_text("aaaa\n\nbbbbbbbbbb\n\ncc", &config).unwrap();
        assert_eq!(chunks, vec!["aaaa\n\n", "bbbbbbbbbb\n\n", "cc"]);
    }

    #[test]
    fn flat_mode_with_empty_separator_cuts_characters() {
        let config = SplitConfig::builder(CharCount)
            .chunk_size(3)
            .chunk_overlap(0)
            .separators([""])
            .mode(SplitMode::Flat)
            .build()
            .unwrap();
        let chunks = split_text("abcdefg", &config).unwrap();
        assert_eq!(chunks, vec!["abc", "def", "g"]);
    }

    #[test]
    fn word_metric_bounds_by_words() {
        let words = FnMetric::new(|t: &str| Ok(t.split_whitespace().count()));
        let config = SplitConfig::builder(words)
            .chunk_size(3)
            .chunk_overlap(1)
            .build()
            .unwrap();
        let chunks = split_text("one two three four five", &config).unwrap();
        assert_eq!(chunks, vec!["one two three ", " three four five"]);
    }

    #[test]
    fn metric_failure_is_propagated() {
        let picky = FnMetric::new(|t: &str| {
            if t.contains("boom") {
                Err(MeasureError::new("cannot measure"))
            } else {
                Ok(t.len())
            }
        });
        let config = SplitConfig::builder(picky)
            .chunk_size(8)
            .chunk_overlap(0)
            .build()
            .unwrap();
        let err = split("a boom b", &config).unwrap_err();
        assert!(matches!(err, SplitError::Measurement(_)));
    }

    #[test]
    fn coarse_separator_wins_over_fine() {
        let text = "one two.\n\nthree four.";
        let config = chars(14, 0, &["\n\n", " ", ""]);
        let chunks = split_text(text, &config).unwrap();
        assert_eq!(chunks, vec!["one two.\n\n", "three four."]);
    }

    #[test]
    fn deterministic() {
        let text = "Lorem ipsum dolor sit amet.\n\nConsectetur adipiscing elit.\nSed do.";
        let config = chars(16, 4, &["\n\n", "\n", " ", ""]);
        assert_eq!(split(text, &config).unwrap(), split(text, &config).unwrap());
    }

    #[test]
    fn largest_fitting_finds_threshold() {
        for threshold in 0..40 {
            let got = largest_fitting(32, |k| Ok(k <= threshold)).unwrap();
            assert_eq!(got, threshold.min(32));
        }
        assert_eq!(largest_fitting(0, |_| Ok(true)).unwrap(), 0);
    }
}
