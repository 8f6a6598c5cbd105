//! ODT (OpenDocument text) chapter extraction.
//!
//! Headings are `text:h` elements with their `text:outline-level`. Page
//! breaks are paragraph styles carrying `fo:break-before="page"` or
//! `fo:break-after="page"`, declared in `content.xml` automatic styles or in
//! `styles.xml`, possibly through a parent style.

use std::collections::HashMap;

use quick_xml::events::Event;

use super::xml::{attr, local_name, reader, text_of, xml_error};
use super::{chapters_from_blocks, Block, ExtractError, ExtractOptions, Package, RawChapter};

const CONTENT: &str = "content.xml";
const STYLES: &str = "styles.xml";

/// Parent chains deeper than this are treated as cycles.
const MAX_STYLE_DEPTH: usize = 16;

const SKIPPED: &[&[u8]] = &[b"note", b"annotation", b"tracked-changes", b"sequence-decls"];

#[derive(Debug, Default, Clone)]
struct StyleInfo {
    parent: Option<String>,
    break_before: bool,
    break_after: bool,
}

type Styles = HashMap<String, StyleInfo>;

pub(super) fn extract(bytes: &[u8], options: &ExtractOptions) -> Result<Vec<RawChapter>, ExtractError> {
    let mut pkg = Package::open(bytes, options.max_entry_bytes)?;
    let mut styles = Styles::new();
    if let Some(xml) = pkg.read_optional(STYLES)? {
        collect_styles(&xml, STYLES, &mut styles)?;
    }
    let content = pkg.read(CONTENT)?;
    // automatic styles override common styles of the same name
    collect_styles(&content, CONTENT, &mut styles)?;
    let blocks = parse_body(&content, &styles)?;
    tracing::trace!(blocks = blocks.len(), "odt paragraphs read");
    Ok(chapters_from_blocks(&blocks, options.strategy, options.heading_level))
}

fn collect_styles(xml: &[u8], entry: &str, styles: &mut Styles) -> Result<(), ExtractError> {
    let mut reader = reader(xml);
    let mut buf = Vec::new();
    let mut current: Option<(String, StyleInfo)> = None;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match local_name(&e).as_slice() {
                b"style" => {
                    if let Some((name, info)) = current.take() {
                        styles.insert(name, info);
                    }
                    current = attr(&e, b"name").map(|name| {
                        let info = StyleInfo {
                            parent: attr(&e, b"parent-style-name"),
                            ..StyleInfo::default()
                        };
                        (name, info)
                    });
                }
                b"paragraph-properties" => {
                    if let Some((_, info)) = current.as_mut() {
                        info.break_before |= attr(&e, b"break-before").as_deref() == Some("page");
                        info.break_after |= attr(&e, b"break-after").as_deref() == Some("page");
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"style" {
                    if let Some((name, info)) = current.take() {
                        styles.insert(name, info);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(entry, e)),
            _ => {}
        }
    }
    if let Some((name, info)) = current.take() {
        styles.insert(name, info);
    }
    Ok(())
}

/// `(break_before, break_after)` for a paragraph style, following parents.
fn style_breaks(styles: &Styles, name: &str) -> (bool, bool) {
    let mut before = false;
    let mut after = false;
    let mut next = Some(name);
    for _ in 0..MAX_STYLE_DEPTH {
        let Some(info) = next.and_then(|n| styles.get(n)) else {
            break;
        };
        before |= info.break_before;
        after |= info.break_after;
        next = info.parent.as_deref();
    }
    (before, after)
}

#[derive(Default)]
struct OpenParagraph {
    text: String,
    heading: Option<u8>,
    break_after: bool,
    /// Collapsible whitespace was seen and not yet emitted.
    pending_space: bool,
}

impl OpenParagraph {
    fn push_text(&mut self, s: &str) {
        for ch in s.chars() {
            if matches!(ch, ' ' | '\t' | '\n' | '\r') {
                self.pending_space = true;
            } else {
                self.flush_space();
                self.text.push(ch);
            }
        }
    }

    fn push_literal(&mut self, s: &str) {
        self.flush_space();
        self.text.push_str(s);
    }

    fn flush_space(&mut self) {
        if self.pending_space && !self.text.is_empty() && !self.text.ends_with(['\n', ' ', '\t']) {
            self.text.push(' ');
        }
        self.pending_space = false;
    }
}

fn parse_body(xml: &[u8], styles: &Styles) -> Result<Vec<Block>, ExtractError> {
    let mut reader = reader(xml);
    let mut buf = Vec::new();
    let mut blocks = Vec::new();
    let mut in_body = false;
    let mut skip_depth = 0usize;
    let mut para_depth = 0usize;
    let mut para = OpenParagraph::default();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if name.as_slice() == b"body" {
                    in_body = true;
                }
                if !in_body {
                    continue;
                }
                if SKIPPED.contains(&name.as_slice()) {
                    skip_depth += 1;
                }
                if skip_depth > 0 {
                    continue;
                }
                match name.as_slice() {
                    b"p" | b"h" => {
                        if para_depth == 0 {
                            let (before, after) = attr(&e, b"style-name")
                                .map(|s| style_breaks(styles, &s))
                                .unwrap_or_default();
                            if before {
                                blocks.push(Block::PageBreak);
                            }
                            para = OpenParagraph {
                                heading: heading_level(&name, &e),
                                break_after: after,
                                ..OpenParagraph::default()
                            };
                        } else {
                            // frame or text box nested in a paragraph
                            para.pending_space = true;
                        }
                        para_depth += 1;
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                if !in_body || skip_depth > 0 {
                    continue;
                }
                let name = local_name(&e);
                match name.as_slice() {
                    b"s" if para_depth > 0 => {
                        let count = attr(&e, b"c")
                            .and_then(|c| c.parse::<usize>().ok())
                            .unwrap_or(1);
                        para.push_literal(&" ".repeat(count));
                    }
                    b"tab" if para_depth > 0 => para.push_literal("\t"),
                    b"line-break" if para_depth > 0 => para.push_literal("\n"),
                    b"p" | b"h" if para_depth == 0 => {
                        let (before, after) = attr(&e, b"style-name")
                            .map(|s| style_breaks(styles, &s))
                            .unwrap_or_default();
                        if before {
                            blocks.push(Block::PageBreak);
                        }
                        if after {
                            blocks.push(Block::PageBreak);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name().as_ref().to_ascii_lowercase();
                if !in_body {
                    continue;
                }
                if skip_depth > 0 {
                    if SKIPPED.contains(&name.as_slice()) {
                        skip_depth -= 1;
                    }
                    continue;
                }
                match name.as_slice() {
                    b"p" | b"h" if para_depth > 0 => {
                        para_depth -= 1;
                        if para_depth == 0 {
                            let done = std::mem::take(&mut para);
                            blocks.push(Block::Paragraph {
                                text: done.text,
                                heading: done.heading,
                            });
                            if done.break_after {
                                blocks.push(Block::PageBreak);
                            }
                        }
                    }
                    b"body" => in_body = false,
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                if in_body && skip_depth == 0 && para_depth > 0 {
                    para.push_text(&text_of(&t));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(CONTENT, e)),
            _ => {}
        }
    }
    Ok(blocks)
}

fn heading_level(name: &[u8], e: &quick_xml::events::BytesStart) -> Option<u8> {
    if name != b"h" {
        return None;
    }
    let level = attr(e, b"outline-level")
        .and_then(|l| l.trim().parse::<u8>().ok())
        .unwrap_or(1);
    Some(level.max(1))
}
