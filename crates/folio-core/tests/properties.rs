//! Property tests over generated texts and configurations.

use folio_core::{split, CharCount, Chunk, ContentKind, FnMetric, SplitConfig, SplitMode};
use proptest::prelude::*;

const ALPHABET: &[&str] = &[
    "a", "b", "c", "lorem", "ipsum", " ", " ", " ", "\n", "\n\n", ". ", "é", "章", "。", "🙂",
    "\n## ", "# ", "\nfn ", "\n}", "{", "```\n",
];

#[derive(Debug, Clone, Copy)]
enum Separators {
    List(&'static [&'static str]),
    Kind(ContentKind),
}

fn text(max_tokens: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(ALPHABET.to_vec()), 0..=max_tokens)
        .prop_map(|tokens| tokens.concat())
}

fn separators() -> impl Strategy<Value = Separators> {
    prop::sample::select(vec![
        Separators::List(&["\n\n", "\n", " ", ""]),
        Separators::List(&["\n\n", " ", ""]),
        Separators::List(&[". ", "。", ""]),
        Separators::List(&[""]),
        Separators::List(&["\n"]),
        Separators::Kind(ContentKind::Markdown),
        Separators::Kind(ContentKind::Rust),
        Separators::Kind(ContentKind::Prose),
    ])
}

/// Size and an overlap strictly below it.
fn size_and_overlap(min: usize, max: usize) -> impl Strategy<Value = (usize, usize)> {
    (min..max).prop_flat_map(|size| (Just(size), 0..size))
}

fn char_config(size: usize, overlap: usize, seps: Separators) -> SplitConfig<CharCount> {
    let builder = SplitConfig::builder(CharCount)
        .chunk_size(size)
        .chunk_overlap(overlap);
    match seps {
        Separators::List(list) => builder.separators(list.iter().copied()),
        Separators::Kind(kind) => builder.content(kind),
    }
    .build()
    .unwrap()
}

fn assert_coverage(text: &str, chunks: &[Chunk]) {
    if text.is_empty() {
        assert!(chunks.is_empty());
        return;
    }
    assert!(!chunks.is_empty());
    assert_eq!(chunks[0].start, 0);
    assert_eq!(chunks.last().unwrap().end, text.len());

    let mut rebuilt = chunks[0].text.clone();
    for (i, pair) in chunks.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        assert_eq!(next.index, i + 1);
        assert!(next.start <= prev.end, "gap between chunks {} and {}", i, i + 1);
        assert!(next.end > prev.end, "chunk {} makes no progress", i + 1);
        rebuilt.push_str(&next.text[prev.end - next.start..]);
    }
    assert_eq!(rebuilt, text);

    for c in chunks {
        assert_eq!(&text[c.start..c.end], c.text);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(400))]

    #[test]
    fn recursive_char_splits_hold_all_invariants(
        text in text(120),
        (size, overlap) in size_and_overlap(2, 42),
        seps in separators(),
    ) {
        let config = char_config(size, overlap, seps);
        let chunks = split(&text, &config).unwrap();
        assert_coverage(&text, &chunks);

        for c in &chunks {
            prop_assert!(c.text.chars().count() <= size, "chunk {:?} exceeds {}", c.text, size);
        }

        for pair in chunks.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let shared = &text[next.start..prev.end];
            prop_assert!(shared.chars().count() <= overlap);
            // An empty overlap means a whole piece filled the next chunk.
            if shared.is_empty() && overlap > 0 && prev.text.chars().count() > 1 {
                prop_assert_eq!(next.text.chars().count(), size, "overlap dropped before {:?}", next.text);
            }
        }

        prop_assert_eq!(split(&text, &config).unwrap(), chunks);
    }

    #[test]
    fn fitting_words_are_never_cut(
        words in prop::collection::vec("[a-z]{1,8}", 1..40),
        (size, overlap) in size_and_overlap(10, 40),
    ) {
        let text = words.join(" ");
        let config = char_config(size, overlap, Separators::List(&[" ", ""]));
        let chunks = split(&text, &config).unwrap();
        assert_coverage(&text, &chunks);

        let mut start = 0;
        for word in &words {
            let end = start + word.len();
            prop_assert!(
                chunks.iter().any(|c| c.start <= start && end <= c.end),
                "word {:?} at {}..{} was cut",
                word,
                start,
                end
            );
            start = end + 1;
        }
    }

    #[test]
    fn flat_mode_covers_text(
        text in text(80),
        (size, overlap) in size_and_overlap(2, 32),
    ) {
        let config = SplitConfig::builder(CharCount)
            .chunk_size(size)
            .chunk_overlap(overlap)
            .separators(["\n\n", "\n", " ", ""])
            .mode(SplitMode::Flat)
            .build()
            .unwrap();
        let chunks = split(&text, &config).unwrap();
        assert_coverage(&text, &chunks);
    }

    // Multi-byte characters make byte length coarser than char count, which
    // exercises the character re-cut with a non-char metric.
    #[test]
    fn byte_metric_respects_bound(
        text in text(60),
        size in 4usize..34,
        overlap in 0usize..8,
        seps in separators(),
    ) {
        let bytes = FnMetric::new(|t: &str| Ok(t.len()));
        let builder = SplitConfig::builder(&bytes)
            .chunk_size(size)
            .chunk_overlap(overlap.min(size - 1));
        let config = match seps {
            Separators::List(list) => builder.separators(list.iter().copied()),
            Separators::Kind(kind) => builder.content(kind),
        }
        .build()
        .unwrap();
        let chunks = split(&text, &config).unwrap();
        assert_coverage(&text, &chunks);
        for c in &chunks {
            prop_assert!(c.text.len() <= size, "{:?} is {} bytes > {}", c.text, c.text.len(), size);
        }
    }
}

#[test]
fn short_texts_are_single_chunks() {
    let config = SplitConfig::builder(CharCount).build().unwrap();
    for text in ["x", "A.\n\nB.", "章节一", "   "] {
        let chunks = split(text, &config).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }
}
