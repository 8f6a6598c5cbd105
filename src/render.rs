//! Human-readable stdout rendering for `folio chapters` and `folio split`.

use std::io::{self, Write};

use folio_core::Chapter;

use crate::pipeline::ChapterChunks;

/// Chapter listing: number, title and size.
pub fn write_chapter_list<W: Write>(out: &mut W, chapters: &[Chapter]) -> io::Result<()> {
    if chapters.is_empty() {
        writeln!(out, "No chapters found.")?;
        return Ok(());
    }
    let width = chapters.len().to_string().len();
    for chapter in chapters {
        writeln!(
            out,
            "{:>width$}  {}  ({} chars)",
            chapter.index + 1,
            chapter.display_title(),
            chapter.text.chars().count(),
            width = width
        )?;
    }
    Ok(())
}

/// Chunks as `── Chunk i ──` blocks, numbered from 1 within each chapter.
///
/// A chapter heading is printed only when more than one chapter is shown.
pub fn write_chunks<W: Write>(out: &mut W, chapters: &[ChapterChunks]) -> io::Result<()> {
    let headed = chapters.len() > 1;
    for chapter in chapters {
        if headed {
            let title = chapter
                .title
                .clone()
                .unwrap_or_else(|| format!("Chapter {}", chapter.chapter + 1));
            writeln!(out, "══ {} ══", title)?;
            writeln!(out)?;
        }
        for (i, text) in chapter.prefixed.iter().enumerate() {
            writeln!(out, "── Chunk {} ──", i + 1)?;
            writeln!(out, "{}", text)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::Chunk;

    fn rendered<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(f: F) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn chapter_list() {
        let chapters = vec![
            Chapter::new(0, Some("Prologue".into()), "abc"),
            Chapter::new(1, None, "章节"),
        ];
        let text = rendered(|out| write_chapter_list(out, &chapters));
        assert_eq!(text, "1  Prologue  (3 chars)\n2  Chapter 2  (2 chars)\n");
    }

    #[test]
    fn single_chapter_has_no_heading() {
        let chapters = vec![ChapterChunks {
            chapter: 0,
            title: Some("Only".into()),
            chunks: vec![Chunk {
                index: 0,
                text: "x".into(),
                start: 0,
                end: 1,
            }],
            prefixed: vec!["p: x".into()],
        }];
        let text = rendered(|out| write_chunks(out, &chapters));
        assert_eq!(text, "── Chunk 1 ──\np: x\n\n");
    }

    #[test]
    fn many_chapters_are_headed() {
        let chapter = |i: usize| ChapterChunks {
            chapter: i,
            title: None,
            chunks: Vec::new(),
            prefixed: vec![format!("c{}", i)],
        };
        let text = rendered(|out| write_chunks(out, &[chapter(0), chapter(1)]));
        assert!(text.starts_with("══ Chapter 1 ══\n\n── Chunk 1 ──\nc0\n"));
        assert!(text.contains("══ Chapter 2 ══"));
    }
}
