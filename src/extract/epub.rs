//! EPUB 2 / EPUB 3 chapter extraction.
//!
//! `META-INF/container.xml` → package document (OPF) → manifest + spine.
//! Chapter boundaries come from the NCX `navMap` or the EPUB 3 `nav`
//! document when one exists, otherwise every spine document is a chapter.

use std::collections::HashMap;

use quick_xml::events::Event;

use super::xml::{attr, local_name, reader, text_of, xhtml_to_text, xml_error, XhtmlText};
use super::{ChapterStrategy, ExtractError, ExtractOptions, Package, RawChapter};

const CONTAINER: &str = "META-INF/container.xml";

#[derive(Debug, Clone)]
struct ManifestItem {
    href: String,
    media_type: String,
    properties: String,
}

#[derive(Debug, Default)]
struct PackageDocument {
    manifest: HashMap<String, ManifestItem>,
    spine: Vec<String>,
    /// `toc` attribute of `<spine>`, the NCX manifest id.
    ncx_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct TocEntry {
    title: String,
    /// Archive path of the target document.
    path: String,
    fragment: Option<String>,
}

pub(super) fn extract(bytes: &[u8], options: &ExtractOptions) -> Result<Vec<RawChapter>, ExtractError> {
    let mut pkg = Package::open(bytes, options.max_entry_bytes)?;

    let container = pkg.read(CONTAINER)?;
    let opf_path = parse_container(&container)?
        .ok_or_else(|| ExtractError::MissingEntry(format!("{} rootfile", CONTAINER)))?;
    let opf = pkg.read(&opf_path)?;
    let package = parse_opf(&opf, &opf_path)?;
    let base = parent_dir(&opf_path);

    let mut spine_paths = Vec::new();
    for idref in &package.spine {
        let Some(item) = package.manifest.get(idref) else {
            tracing::warn!(idref = %idref, "spine item missing from manifest");
            continue;
        };
        if is_xhtml(&item.media_type) {
            spine_paths.push(resolve_href(base, &item.href));
        }
    }

    let mut docs = Vec::with_capacity(spine_paths.len());
    for path in &spine_paths {
        match pkg.read_optional(path)? {
            Some(xml) => docs.push(xhtml_to_text(&xml, path)?),
            None => {
                tracing::warn!(path = %path, "spine document missing from archive");
                docs.push(XhtmlText::default());
            }
        }
    }

    let toc = read_toc(&mut pkg, &package, base)?;
    let toc_driven = matches!(options.strategy, ChapterStrategy::Auto | ChapterStrategy::Toc);

    if toc_driven && !toc.is_empty() {
        let chapters = chapters_from_toc(&toc, &spine_paths, &docs);
        if !chapters.is_empty() {
            return Ok(chapters);
        }
        tracing::debug!("table of contents did not match the spine, using spine documents");
    }

    Ok(chapters_from_spine(&spine_paths, &docs, &toc))
}

fn is_xhtml(media_type: &str) -> bool {
    matches!(media_type, "application/xhtml+xml" | "text/html" | "application/xml")
}

fn parse_container(xml: &[u8]) -> Result<Option<String>, ExtractError> {
    let mut reader = reader(xml);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if local_name(&e) == b"rootfile" {
                    if let Some(path) = attr(&e, b"full-path") {
                        return Ok(Some(percent_decode(&path)));
                    }
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(xml_error(CONTAINER, e)),
            _ => {}
        }
    }
}

fn parse_opf(xml: &[u8], entry: &str) -> Result<PackageDocument, ExtractError> {
    let mut reader = reader(xml);
    let mut buf = Vec::new();
    let mut doc = PackageDocument::default();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match local_name(&e).as_slice() {
                b"item" => {
                    if let (Some(id), Some(href)) = (attr(&e, b"id"), attr(&e, b"href")) {
                        doc.manifest.insert(
                            id,
                            ManifestItem {
                                href,
                                media_type: attr(&e, b"media-type").unwrap_or_default(),
                                properties: attr(&e, b"properties").unwrap_or_default(),
                            },
                        );
                    }
                }
                b"spine" => doc.ncx_id = attr(&e, b"toc"),
                b"itemref" => {
                    let linear = attr(&e, b"linear").unwrap_or_default();
                    if let Some(idref) = attr(&e, b"idref") {
                        if linear != "no" {
                            doc.spine.push(idref);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(entry, e)),
            _ => {}
        }
    }
    Ok(doc)
}

/// EPUB 3 nav document first, then the NCX.
fn read_toc(
    pkg: &mut Package<'_>,
    package: &PackageDocument,
    base: &str,
) -> Result<Vec<TocEntry>, ExtractError> {
    let nav = package
        .manifest
        .values()
        .find(|item| item.properties.split_whitespace().any(|p| p == "nav"));
    if let Some(item) = nav {
        let path = resolve_href(base, &item.href);
        if let Some(xml) = pkg.read_optional(&path)? {
            let entries = parse_nav(&xml, &path)?;
            if !entries.is_empty() {
                return Ok(entries);
            }
        }
    }

    let ncx = package
        .ncx_id
        .as_ref()
        .and_then(|id| package.manifest.get(id))
        .or_else(|| {
            package
                .manifest
                .values()
                .find(|item| item.media_type == "application/x-dtbncx+xml")
        });
    if let Some(item) = ncx {
        let path = resolve_href(base, &item.href);
        if let Some(xml) = pkg.read_optional(&path)? {
            return parse_ncx(&xml, &path);
        }
    }
    Ok(Vec::new())
}

/// `navPoint`s in document order, nested points included.
fn parse_ncx(xml: &[u8], entry: &str) -> Result<Vec<TocEntry>, ExtractError> {
    let base = parent_dir(entry);
    let mut reader = reader(xml);
    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut in_label = false;
    let mut in_text = false;
    let mut label = String::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(&e).as_slice() {
                b"navpoint" => label.clear(),
                b"navlabel" => in_label = true,
                b"text" if in_label => in_text = true,
                b"content" => push_target(&mut entries, &label, attr(&e, b"src"), base),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if local_name(&e) == b"content" {
                    push_target(&mut entries, &label, attr(&e, b"src"), base);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref().to_ascii_lowercase().as_slice() {
                b"navlabel" => in_label = false,
                b"text" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => label.push_str(&text_of(&t)),
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(entry, e)),
            _ => {}
        }
    }
    Ok(entries)
}

/// Links inside `<nav epub:type="toc">`.
fn parse_nav(xml: &[u8], entry: &str) -> Result<Vec<TocEntry>, ExtractError> {
    let base = parent_dir(entry);
    let mut reader = reader(xml);
    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut nav_depth = 0usize;
    let mut in_toc = false;
    let mut link: Option<(String, String)> = None;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(&e).as_slice() {
                b"nav" => {
                    nav_depth += 1;
                    if nav_depth == 1 {
                        in_toc = attr(&e, b"type")
                            .map(|t| t.split_whitespace().any(|v| v == "toc"))
                            .unwrap_or(false);
                    }
                }
                b"a" if in_toc => {
                    if let Some(href) = attr(&e, b"href") {
                        link = Some((href, String::new()));
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref().to_ascii_lowercase().as_slice() {
                b"nav" => {
                    nav_depth = nav_depth.saturating_sub(1);
                    if nav_depth == 0 {
                        in_toc = false;
                    }
                }
                b"a" => {
                    if let Some((href, title)) = link.take() {
                        push_target(&mut entries, &title, Some(href), base);
                    }
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let Some((_, title)) = link.as_mut() {
                    title.push_str(&text_of(&t));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(entry, e)),
            _ => {}
        }
    }
    Ok(entries)
}

fn push_target(entries: &mut Vec<TocEntry>, label: &str, src: Option<String>, base: &str) {
    let Some(src) = src else { return };
    if src.contains("://") {
        return;
    }
    let (file, fragment) = match src.split_once('#') {
        Some((f, frag)) => (f, Some(frag.to_string()).filter(|s| !s.is_empty())),
        None => (src.as_str(), None),
    };
    entries.push(TocEntry {
        title: super::collapse_whitespace(label),
        path: resolve_href(base, file),
        fragment,
    });
}

/// Slice the concatenated spine at every TOC target.
///
/// Text before the first target (cover, title page) becomes an untitled
/// leading chapter so nothing is lost.
fn chapters_from_toc(toc: &[TocEntry], spine: &[String], docs: &[XhtmlText]) -> Vec<RawChapter> {
    let mut starts: Vec<((usize, usize), &str)> = Vec::new();
    for entry in toc {
        let Some(doc_idx) = spine.iter().position(|p| *p == entry.path) else {
            continue;
        };
        let offset = match &entry.fragment {
            Some(frag) => match docs[doc_idx].anchors.get(frag) {
                Some(&off) => off,
                None => continue,
            },
            None => 0,
        };
        starts.push(((doc_idx, offset), entry.title.as_str()));
    }
    starts.sort_by_key(|(pos, _)| *pos);
    starts.dedup_by_key(|(pos, _)| *pos);
    if starts.is_empty() {
        return Vec::new();
    }

    let mut chapters = Vec::with_capacity(starts.len() + 1);
    if starts[0].0 != (0, 0) {
        chapters.push(RawChapter {
            title: None,
            text: span_text(docs, (0, 0), starts[0].0),
        });
    }
    for (i, (pos, title)) in starts.iter().enumerate() {
        let end = starts
            .get(i + 1)
            .map(|(next, _)| *next)
            .unwrap_or((docs.len(), 0));
        chapters.push(RawChapter {
            title: Some(title.to_string()).filter(|t| !t.is_empty()),
            text: span_text(docs, *pos, end),
        });
    }
    chapters
}

/// Text from `(doc, offset)` up to, but excluding, `(doc, offset)`.
fn span_text(docs: &[XhtmlText], from: (usize, usize), to: (usize, usize)) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for (idx, doc) in docs.iter().enumerate() {
        if idx < from.0 || idx > to.0 {
            continue;
        }
        let len = doc.text.len();
        let start = if idx == from.0 { from.1.min(len) } else { 0 };
        let end = if idx == to.0 { to.1.min(len) } else { len };
        if start < end {
            let part = doc.text[start..end].trim();
            if !part.is_empty() {
                parts.push(part);
            }
        }
    }
    parts.join("\n\n")
}

fn chapters_from_spine(spine: &[String], docs: &[XhtmlText], toc: &[TocEntry]) -> Vec<RawChapter> {
    spine
        .iter()
        .zip(docs)
        .map(|(path, doc)| {
            let toc_title = toc
                .iter()
                .find(|e| e.path == *path && !e.title.is_empty())
                .map(|e| e.title.clone());
            RawChapter {
                title: toc_title.or_else(|| doc.title.clone()),
                text: doc.text.clone(),
            }
        })
        .collect()
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

/// Join `href` onto `base` and normalise `.` / `..` segments.
fn resolve_href(base: &str, href: &str) -> String {
    let href = percent_decode(href);
    let mut segments: Vec<&str> = if href.starts_with('/') {
        Vec::new()
    } else {
        base.split('/').filter(|s| !s.is_empty()).collect()
    };
    for seg in href.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
