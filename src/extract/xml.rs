//! quick-xml helpers shared by the extractors, plus XHTML → text.

use std::borrow::Cow;
use std::collections::HashMap;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

use super::ExtractError;

/// Reader tuned for real-world markup: whitespace is kept (callers decide
/// what is significant) and sloppy end tags do not abort the parse.
pub(crate) fn reader(xml: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(xml);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    reader
}

pub(crate) fn xml_error(entry: &str, e: quick_xml::Error) -> ExtractError {
    ExtractError::Xml {
        entry: entry.to_string(),
        message: e.to_string(),
    }
}

/// Attribute value by local name, ignoring any namespace prefix.
pub(crate) fn attr(e: &BytesStart, local: &[u8]) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.local_name().as_ref() == local {
            Some(match a.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
            })
        } else {
            None
        }
    })
}

/// Text content with XML and HTML named entities resolved. Unknown entities
/// are kept verbatim.
pub(crate) fn text_of<'a>(t: &'a BytesText<'a>) -> Cow<'a, str> {
    match t.unescape_with(quick_xml::escape::resolve_html5_entity) {
        Ok(s) => s,
        Err(_) => String::from_utf8_lossy(t).into_owned().into(),
    }
}

pub(crate) fn local_name(e: &BytesStart) -> Vec<u8> {
    e.local_name().as_ref().to_ascii_lowercase()
}

/// Plain text of one XHTML document.
#[derive(Debug, Default, Clone)]
pub(crate) struct XhtmlText {
    pub text: String,
    /// First `h1`–`h6`, falling back to `<title>`.
    pub title: Option<String>,
    /// Byte offset in `text` where each `id` attribute appeared.
    pub anchors: HashMap<String, usize>,
}

const BLOCK_ELEMENTS: &[&[u8]] = &[
    b"p", b"div", b"section", b"article", b"aside", b"header", b"footer", b"blockquote",
    b"h1", b"h2", b"h3", b"h4", b"h5", b"h6", b"li", b"ul", b"ol", b"dl", b"dt", b"dd",
    b"table", b"tr", b"pre", b"figure", b"figcaption", b"hr", b"body", b"nav", b"main",
];

const SKIPPED_ELEMENTS: &[&[u8]] = &[b"head", b"script", b"style", b"svg"];

fn is_heading(name: &[u8]) -> bool {
    matches!(name, b"h1" | b"h2" | b"h3" | b"h4" | b"h5" | b"h6")
}

/// Accumulates rendered text with HTML whitespace rules: runs of whitespace
/// collapse to one space, block boundaries become blank lines, `<br>` a
/// newline, and `<pre>` is copied as-is.
#[derive(Default)]
struct TextSink {
    out: String,
    pending_break: usize,
    pending_space: bool,
}

impl TextSink {
    fn push(&mut self, s: &str, preformatted: bool) {
        for ch in s.chars() {
            if !preformatted && ch.is_ascii_whitespace() {
                self.pending_space = true;
                continue;
            }
            if self.pending_break > 0 {
                if !self.out.is_empty() {
                    let trimmed = self.out.trim_end_matches([' ', '\t']).len();
                    self.out.truncate(trimmed);
                    for _ in 0..self.pending_break {
                        self.out.push('\n');
                    }
                }
                self.pending_break = 0;
                self.pending_space = false;
            } else if self.pending_space {
                if !self.out.is_empty() && !self.out.ends_with('\n') {
                    self.out.push(' ');
                }
                self.pending_space = false;
            }
            self.out.push(ch);
        }
    }

    fn line_break(&mut self) {
        self.pending_break = self.pending_break.max(1);
        if self.pending_break == 1 && !self.out.is_empty() {
            // consecutive <br> stack into blank lines
            self.out.push('\n');
            self.pending_break = 0;
            self.pending_space = false;
        }
    }

    fn block_break(&mut self) {
        self.pending_break = 2;
    }
}

/// Convert an XHTML document to plain text.
pub(crate) fn xhtml_to_text(xml: &[u8], entry: &str) -> Result<XhtmlText, ExtractError> {
    let mut reader = reader(xml);
    let mut buf = Vec::new();
    let mut sink = TextSink::default();
    let mut result = XhtmlText::default();

    let mut skip_depth = 0usize;
    let mut pre_depth = 0usize;
    let mut in_title = false;
    let mut head_title = String::new();
    let mut heading: Option<String> = None;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if name.as_slice() == b"title" {
                    in_title = true;
                }
                if SKIPPED_ELEMENTS.contains(&name.as_slice()) {
                    skip_depth += 1;
                }
                if skip_depth > 0 {
                    continue;
                }
                if let Some(id) = attr(&e, b"id") {
                    result.anchors.entry(id).or_insert(sink.out.len());
                }
                if BLOCK_ELEMENTS.contains(&name.as_slice()) {
                    sink.block_break();
                }
                if name.as_slice() == b"pre" {
                    pre_depth += 1;
                }
                if is_heading(&name) && result.title.is_none() && heading.is_none() {
                    heading = Some(String::new());
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name().as_ref().to_ascii_lowercase();
                if name.as_slice() == b"title" {
                    in_title = false;
                }
                if skip_depth > 0 {
                    if SKIPPED_ELEMENTS.contains(&name.as_slice()) {
                        skip_depth -= 1;
                    }
                    continue;
                }
                if BLOCK_ELEMENTS.contains(&name.as_slice()) {
                    sink.block_break();
                }
                if name.as_slice() == b"pre" {
                    pre_depth = pre_depth.saturating_sub(1);
                }
                if is_heading(&name) {
                    if let Some(h) = heading.take() {
                        let h = super::collapse_whitespace(&h);
                        if !h.is_empty() {
                            result.title = Some(h);
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if skip_depth == 0 {
                    let name = local_name(&e);
                    if let Some(id) = attr(&e, b"id") {
                        result.anchors.entry(id).or_insert(sink.out.len());
                    }
                    match name.as_slice() {
                        b"br" => sink.line_break(),
                        b"hr" | b"p" | b"div" => sink.block_break(),
                        b"img" => {
                            if let Some(alt) = attr(&e, b"alt").filter(|a| !a.trim().is_empty()) {
                                sink.push(&alt, false);
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let text = text_of(&t);
                if in_title {
                    head_title.push_str(&text);
                } else if skip_depth == 0 {
                    if let Some(h) = heading.as_mut() {
                        h.push_str(&text);
                    }
                    sink.push(&text, pre_depth > 0);
                }
            }
            Ok(Event::CData(c)) => {
                if skip_depth == 0 {
                    sink.push(&String::from_utf8_lossy(&c), pre_depth > 0);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(entry, e)),
            _ => {}
        }
    }

    if result.title.is_none() {
        let t = super::collapse_whitespace(&head_title);
        if !t.is_empty() {
            result.title = Some(t);
        }
    }
    result.text = sink.out;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(xhtml: &str) -> XhtmlText {
        xhtml_to_text(xhtml.as_bytes(), "test.xhtml").unwrap()
    }

    #[test]
    fn paragraphs_become_blank_lines() {
        let doc = render(
            r#"<html><head><title>Ignored title</title><style>p { color: red }</style></head>
<body>
  <h1>Chapter  One</h1>
  <p>First   line
     continues.</p>
  <p>Second<br/>line</p>
</body></html>"#,
        );
        assert_eq!(
            doc.text,
            "Chapter One\n\nFirst line continues.\n\nSecond\nline"
        );
        assert_eq!(doc.title.as_deref(), Some("Chapter One"));
    }

    #[test]
    fn html_entities_are_resolved() {
        let doc = render("<html><body><p>a&nbsp;&amp;&mdash;b &#20013;</p></body></html>");
        assert_eq!(doc.text, "a\u{a0}&\u{2014}b 中");
    }

    #[test]
    fn head_title_is_fallback() {
        let doc = render("<html><head><title> Prologue </title></head><body><p>x</p></body></html>");
        assert_eq!(doc.title.as_deref(), Some("Prologue"));
        assert_eq!(doc.text, "x");
    }

    #[test]
    fn anchors_record_offsets() {
        let doc = render(
            r#"<html><body><p id="a">one</p><h2 id="b">Two</h2><p>two</p></body></html>"#,
        );
        assert_eq!(doc.anchors["a"], 0);
        let b = doc.anchors["b"];
        assert!(doc.text[b..].trim_start().starts_with("Two"));
    }

    #[test]
    fn preformatted_whitespace_is_kept() {
        let doc = render("<html><body><pre>a  b\n  c</pre></body></html>");
        assert_eq!(doc.text, "a  b\n  c");
    }

    #[test]
    fn scripts_are_skipped() {
        let doc = render("<html><body><script>var x = 1;</script><p>visible</p></body></html>");
        assert_eq!(doc.text, "visible");
    }
}
