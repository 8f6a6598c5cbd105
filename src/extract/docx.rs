//! DOCX (WordprocessingML) chapter extraction.
//!
//! Paragraph headings come from the paragraph style: either a built-in
//! `HeadingN` / `Title` id, a style whose name in `word/styles.xml` is
//! `heading N`, or an explicit `w:outlineLvl`.

use std::collections::HashMap;

use quick_xml::events::Event;

use super::xml::{attr, local_name, reader, text_of, xml_error};
use super::{chapters_from_blocks, Block, ExtractError, ExtractOptions, Package, RawChapter};

const DOCUMENT: &str = "word/document.xml";
const STYLES: &str = "word/styles.xml";

pub(super) fn extract(bytes: &[u8], options: &ExtractOptions) -> Result<Vec<RawChapter>, ExtractError> {
    let mut pkg = Package::open(bytes, options.max_entry_bytes)?;
    let styles = match pkg.read_optional(STYLES)? {
        Some(xml) => parse_styles(&xml)?,
        None => HashMap::new(),
    };
    let document = pkg.read(DOCUMENT)?;
    let blocks = parse_document(&document, &styles)?;
    tracing::trace!(blocks = blocks.len(), "docx paragraphs read");
    Ok(chapters_from_blocks(&blocks, options.strategy, options.heading_level))
}

/// `HeadingN`, `heading N` or `Title`, case-insensitive.
fn heading_from_name(name: &str) -> Option<u8> {
    let compact: String = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    if compact == "title" {
        return Some(0);
    }
    compact
        .strip_prefix("heading")
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| (1..=9).contains(n))
}

fn outline_level(val: &str) -> Option<u8> {
    // 9 means "body text"
    val.trim().parse::<u8>().ok().filter(|n| *n < 9).map(|n| n + 1)
}

/// Style id → outline level, from `word/styles.xml`.
fn parse_styles(xml: &[u8]) -> Result<HashMap<String, Option<u8>>, ExtractError> {
    let mut reader = reader(xml);
    let mut buf = Vec::new();
    let mut styles = HashMap::new();
    let mut current: Option<(String, Option<u8>)> = None;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match local_name(&e).as_slice() {
                b"style" => {
                    current = attr(&e, b"styleId").map(|id| {
                        let level = heading_from_name(&id);
                        (id, level)
                    });
                }
                b"name" => {
                    if let (Some((_, level)), Some(name)) = (current.as_mut(), attr(&e, b"val")) {
                        if let Some(from_name) = heading_from_name(&name) {
                            *level = Some(from_name);
                        }
                    }
                }
                b"outlinelvl" => {
                    if let (Some((_, level)), Some(val)) = (current.as_mut(), attr(&e, b"val")) {
                        *level = outline_level(&val);
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.local_name().as_ref().eq_ignore_ascii_case(b"style") {
                    if let Some((id, level)) = current.take() {
                        styles.insert(id, level);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(STYLES, e)),
            _ => {}
        }
    }
    Ok(styles)
}

#[derive(Default)]
struct Paragraph {
    text: String,
    heading: Option<u8>,
}

impl Paragraph {
    fn take_block(&mut self) -> Block {
        Block::Paragraph {
            text: std::mem::take(&mut self.text),
            heading: self.heading,
        }
    }
}

fn parse_document(xml: &[u8], styles: &HashMap<String, Option<u8>>) -> Result<Vec<Block>, ExtractError> {
    let mut reader = reader(xml);
    let mut buf = Vec::new();
    let mut blocks = Vec::new();
    let mut para: Option<Paragraph> = None;
    let mut in_ppr = false;
    let mut in_text = false;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(&e).as_slice() {
                b"p" => para = Some(Paragraph::default()),
                b"ppr" => in_ppr = true,
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                let Some(p) = para.as_mut() else {
                    continue;
                };
                match name.as_slice() {
                    b"pstyle" if in_ppr => {
                        if let Some(id) = attr(&e, b"val") {
                            p.heading = match styles.get(&id) {
                                Some(level) => *level,
                                None => heading_from_name(&id),
                            };
                        }
                    }
                    b"outlinelvl" if in_ppr => {
                        if let Some(val) = attr(&e, b"val") {
                            p.heading = outline_level(&val);
                        }
                    }
                    b"pagebreakbefore" if in_ppr => {
                        let on = attr(&e, b"val")
                            .map(|v| !matches!(v.as_str(), "0" | "false" | "off"))
                            .unwrap_or(true);
                        if on {
                            blocks.push(Block::PageBreak);
                        }
                    }
                    b"tab" if !in_ppr => p.text.push('\t'),
                    b"br" | b"cr" => {
                        if attr(&e, b"type").as_deref() == Some("page") {
                            if !p.text.trim().is_empty() {
                                blocks.push(p.take_block());
                            }
                            p.text.clear();
                            blocks.push(Block::PageBreak);
                        } else {
                            p.text.push('\n');
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref().to_ascii_lowercase().as_slice() {
                b"p" => {
                    if let Some(mut p) = para.take() {
                        blocks.push(p.take_block());
                    }
                }
                b"ppr" => in_ppr = false,
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                if let Some(p) = para.as_mut() {
                    p.text.push_str(&text_of(&t));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(DOCUMENT, e)),
            _ => {}
        }
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::super::testutil::zip_of;
    use super::super::{extract_chapters, ChapterStrategy, DocumentFormat};
    use super::*;

    fn document(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        )
    }

    fn para(style: Option<&str>, text: &str) -> String {
        let ppr = style
            .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{}"/></w:pPr>"#, s))
            .unwrap_or_default();
        format!(r#"<w:p>{}<w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, ppr, text)
    }

    fn docx(body: &str) -> Vec<u8> {
        let doc = document(body);
        zip_of(&[("[Content_Types].xml", "<Types/>"), (DOCUMENT, doc.as_str())])
    }

    #[test]
    fn headings_start_chapters() {
        let body = [
            para(Some("Title"), "The Book"),
            para(None, "Front matter."),
            para(Some("Heading1"), "Chapter 1"),
            para(None, "First body."),
            para(Some("Heading2"), "Section"),
            para(None, "Still first."),
            para(Some("heading 1"), "Chapter 2"),
            para(None, "Second body."),
        ]
        .concat();
        let chapters =
            extract_chapters(&docx(&body), DocumentFormat::Docx, &ExtractOptions::default()).unwrap();
        let titles: Vec<_> = chapters.iter().map(|c| c.title.as_deref()).collect();
        assert_eq!(titles, vec![Some("The Book"), Some("Chapter 1"), Some("Chapter 2")]);
        assert_eq!(chapters[1].text, "Chapter 1\n\nFirst body.\n\nSection\n\nStill first.");
    }

    #[test]
    fn page_breaks_split_when_no_headings() {
        let body = format!(
            r#"{}<w:p><w:r><w:t>tail of one</w:t><w:br w:type="page"/><w:t>start of two</w:t></w:r></w:p>{}<w:p><w:pPr><w:pageBreakBefore/></w:pPr><w:r><w:t>three</w:t></w:r></w:p>"#,
            para(None, "one"),
            para(None, "more two"),
        );
        let chapters =
            extract_chapters(&docx(&body), DocumentFormat::Docx, &ExtractOptions::default()).unwrap();
        let texts: Vec<_> = chapters.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["one\n\ntail of one", "start of two\n\nmore two", "three"]);
    }

    #[test]
    fn tabs_and_line_breaks_inside_runs() {
        let body = r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c &amp; d</w:t></w:r></w:p>"#;
        let chapters =
            extract_chapters(&docx(body), DocumentFormat::Docx, &ExtractOptions::default()).unwrap();
        assert_eq!(chapters[0].text, "a\tb\nc & d");
    }

    #[test]
    fn localized_styles_resolve_through_styles_xml() {
        let styles = r#"<w:styles xmlns:w="w">
<w:style w:type="paragraph" w:styleId="berschrift1"><w:name w:val="heading 1"/></w:style>
<w:style w:type="paragraph" w:styleId="Kapitel"><w:name w:val="Kapitel"/><w:pPr><w:outlineLvl w:val="0"/></w:pPr></w:style>
</w:styles>"#;
        let body = [
            para(Some("berschrift1"), "Eins"),
            para(None, "a"),
            para(Some("Kapitel"), "Zwei"),
            para(None, "b"),
        ]
        .concat();
        let doc = document(&body);
        let bytes = zip_of(&[(STYLES, styles), (DOCUMENT, doc.as_str())]);
        let chapters =
            extract_chapters(&bytes, DocumentFormat::Docx, &ExtractOptions::default()).unwrap();
        let titles: Vec<_> = chapters.iter().map(|c| c.title.as_deref()).collect();
        assert_eq!(titles, vec![Some("Eins"), Some("Zwei")]);
    }

    #[test]
    fn headings_strategy_ignores_page_breaks() {
        let body = format!(
            r#"{}<w:p><w:r><w:br w:type="page"/></w:r></w:p>{}"#,
            para(None, "one"),
            para(None, "two"),
        );
        let options = ExtractOptions {
            strategy: ChapterStrategy::Headings,
            ..ExtractOptions::default()
        };
        let chapters = extract_chapters(&docx(&body), DocumentFormat::Docx, &options).unwrap();
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].text, "one\n\ntwo");
    }

    #[test]
    fn missing_document_part() {
        let bytes = zip_of(&[("[Content_Types].xml", "<Types/>")]);
        let err = extract_chapters(&bytes, DocumentFormat::Docx, &ExtractOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExtractError::MissingEntry(ref e) if e == DOCUMENT));
    }

    #[test]
    fn style_names() {
        assert_eq!(heading_from_name("Heading3"), Some(3));
        assert_eq!(heading_from_name("heading 2"), Some(2));
        assert_eq!(heading_from_name("TITLE"), Some(0));
        assert_eq!(heading_from_name("Normal"), None);
        assert_eq!(outline_level("9"), None);
    }
}
