//! Language-aware separator tables.
//!
//! Each [`ContentKind`] maps to a fixed, ordered list of literal separators
//! (coarsest first) and a [`SeparatorPlacement`]. Only the literals change
//! between kinds; the splitting algorithm is the same for all of them.
//!
//! The empty string always terminates a list and means "split anywhere"
//! (the hard-cut fallback).

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::SplitError;

/// Which side of a boundary keeps the separator text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeparatorPlacement {
    /// `"A.\n\nB."` on `"\n\n"` → `"A.\n\n"`, `"B."`.
    #[default]
    End,
    /// `"a\nfn b"` on `"\nfn "` → `"a"`, `"\nfn b"`.
    Start,
}

/// Closed set of content classes with their separator priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Paragraph, line, space, anywhere.
    #[default]
    Text,
    /// Natural-language prose: adds sentence-ending punctuation (Latin and CJK).
    Prose,
    Markdown,
    Html,
    Latex,
    Python,
    Rust,
    Js,
    Ts,
    Go,
    Java,
    C,
    Cpp,
}

const TEXT: &[&str] = &["\n\n", "\n", " ", ""];

const PROSE: &[&str] = &[
    "\n\n", "\n", "。", "！", "？", ". ", "! ", "? ", "; ", "；", "，", ", ", " ", "",
];

const MARKDOWN: &[&str] = &[
    "\n# ", "\n## ", "\n### ", "\n#### ", "\n##### ", "\n###### ", "```\n", "\n***\n",
    "\n---\n", "\n___\n", "\n\n", "\n", " ", "",
];

const HTML: &[&str] = &[
    "<body", "<div", "<p", "<br", "<li", "<h1", "<h2", "<h3", "<h4", "<h5", "<h6", "<span",
    "<table", "<tr", "<td", "<th", "<ul", "<ol", "<header", "<footer", "<nav", "<head",
    "<style", "<script", "<meta", "<title", "",
];

const LATEX: &[&str] = &[
    "\n\\chapter{",
    "\n\\section{",
    "\n\\subsection{",
    "\n\\subsubsection{",
    "\n\\begin{enumerate}",
    "\n\\begin{itemize}",
    "\n\\begin{description}",
    "\n\\begin{list}",
    "\n\\begin{quote}",
    "\n\\begin{quotation}",
    "\n\\begin{verse}",
    "\n\\begin{verbatim}",
    "\n\\begin{align}",
    "$$",
    "$",
    " ",
    "",
];

const PYTHON: &[&str] = &["\nclass ", "\ndef ", "\n\tdef ", "\n\n", "\n", " ", ""];

const RUST: &[&str] = &[
    "\nfn ", "\nconst ", "\nlet ", "\nif ", "\nwhile ", "\nfor ", "\nloop ", "\nmatch ", "\n\n",
    "\n", " ", "",
];

const JS: &[&str] = &[
    "\nfunction ",
    "\nconst ",
    "\nlet ",
    "\nvar ",
    "\nclass ",
    "\nif ",
    "\nfor ",
    "\nwhile ",
    "\nswitch ",
    "\ncase ",
    "\ndefault ",
    "\n\n",
    "\n",
    " ",
    "",
];

const TS: &[&str] = &[
    "\nenum ",
    "\ninterface ",
    "\nnamespace ",
    "\ntype ",
    "\nclass ",
    "\nfunction ",
    "\nconst ",
    "\nlet ",
    "\nvar ",
    "\nif ",
    "\nfor ",
    "\nwhile ",
    "\nswitch ",
    "\ncase ",
    "\ndefault ",
    "\n\n",
    "\n",
    " ",
    "",
];

const GO: &[&str] = &[
    "\nfunc ", "\nvar ", "\nconst ", "\ntype ", "\nif ", "\nfor ", "\nswitch ", "\ncase ",
    "\n\n", "\n", " ", "",
];

const JAVA: &[&str] = &[
    "\nclass ",
    "\npublic ",
    "\nprotected ",
    "\nprivate ",
    "\nstatic ",
    "\nif ",
    "\nfor ",
    "\nwhile ",
    "\nswitch ",
    "\ncase ",
    "\n\n",
    "\n",
    " ",
    "",
];

const C_FAMILY: &[&str] = &[
    "\nclass ",
    "\nvoid ",
    "\nint ",
    "\nfloat ",
    "\ndouble ",
    "\nif ",
    "\nfor ",
    "\nwhile ",
    "\nswitch ",
    "\ncase ",
    "\n\n",
    "\n",
    " ",
    "",
];

impl ContentKind {
    /// Every supported kind, in display order.
    pub const ALL: [ContentKind; 13] = [
        ContentKind::Text,
        ContentKind::Prose,
        ContentKind::Markdown,
        ContentKind::Html,
        ContentKind::Latex,
        ContentKind::Python,
        ContentKind::Rust,
        ContentKind::Js,
        ContentKind::Ts,
        ContentKind::Go,
        ContentKind::Java,
        ContentKind::C,
        ContentKind::Cpp,
    ];

    /// Separator literals, coarsest first.
    pub fn separators(self) -> &'static [&'static str] {
        match self {
            ContentKind::Text => TEXT,
            ContentKind::Prose => PROSE,
            ContentKind::Markdown => MARKDOWN,
            ContentKind::Html => HTML,
            ContentKind::Latex => LATEX,
            ContentKind::Python => PYTHON,
            ContentKind::Rust => RUST,
            ContentKind::Js => JS,
            ContentKind::Ts => TS,
            ContentKind::Go => GO,
            ContentKind::Java => JAVA,
            ContentKind::C | ContentKind::Cpp => C_FAMILY,
        }
    }

    /// Source-code and markup separators open a construct (`"\nfn "`, `"<div"`),
    /// so they stay with the piece that follows them.
    pub fn placement(self) -> SeparatorPlacement {
        match self {
            ContentKind::Text | ContentKind::Prose => SeparatorPlacement::End,
            _ => SeparatorPlacement::Start,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Prose => "prose",
            ContentKind::Markdown => "markdown",
            ContentKind::Html => "html",
            ContentKind::Latex => "latex",
            ContentKind::Python => "python",
            ContentKind::Rust => "rust",
            ContentKind::Js => "js",
            ContentKind::Ts => "ts",
            ContentKind::Go => "go",
            ContentKind::Java => "java",
            ContentKind::C => "c",
            ContentKind::Cpp => "cpp",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = SplitError;

    /// Accepts the canonical tags plus a few common aliases; anything else is
    /// rejected rather than silently mapped to [`ContentKind::Text`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => ContentKind::Text,
            "prose" => ContentKind::Prose,
            "markdown" | "md" => ContentKind::Markdown,
            "html" => ContentKind::Html,
            "latex" | "tex" => ContentKind::Latex,
            "python" | "py" => ContentKind::Python,
            "rust" | "rs" => ContentKind::Rust,
            "js" | "javascript" => ContentKind::Js,
            "ts" | "typescript" => ContentKind::Ts,
            "go" | "golang" => ContentKind::Go,
            "java" => ContentKind::Java,
            "c" => ContentKind::C,
            "cpp" | "c++" => ContentKind::Cpp,
            other => {
                return Err(SplitError::invalid(format!(
                    "unknown content kind '{}'; expected one of: {}",
                    other,
                    ContentKind::ALL
                        .iter()
                        .map(|k| k.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )))
            }
        };
        Ok(kind)
    }
}
