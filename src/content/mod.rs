//! Structured representations of the three content kinds the pipeline
//! understands, plus the opaque fallback for everything else.
//!
//! | Kind | Representation | Module |
//! |------|----------------|--------|
//! | Markup | arena DOM ([`markup::Document`]) | [`markup`] |
//! | Style | rule tree ([`style::Stylesheet`]) | [`style`] |
//! | Script | syntax tree ([`script::Program`]) | [`script`] |
//! | Other | raw bytes | none |
//!
//! Parsers are tolerant where browsers are tolerant (unclosed markup
//! elements, unknown at-rules) and strict where guessing would silently change
//! meaning (unterminated strings and comments, unsupported script syntax).

pub mod markup;
pub mod script;
pub mod style;

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unterminated {what} starting at line {line}")]
    Unterminated { what: &'static str, line: usize },
    #[error("unexpected {found} at line {line}, expected {expected}")]
    Unexpected {
        found: String,
        expected: &'static str,
        line: usize,
    },
    #[error("unsupported syntax at line {line}: {what}")]
    Unsupported { what: String, line: usize },
}

/// 1-based line number of a byte offset.
pub(crate) fn line_at(src: &str, offset: usize) -> usize {
    src.as_bytes()[..offset.min(src.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// The content kind of a node, used for classifier and rewriter dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Markup,
    Style,
    Script,
    Other,
}

impl ContentKind {
    /// Guess the kind from a path or URL extension.
    pub fn from_extension(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("html" | "htm" | "xhtml" | "svg") => ContentKind::Markup,
            Some("css") => ContentKind::Style,
            Some("js" | "mjs") => ContentKind::Script,
            _ => ContentKind::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Markup => "markup",
            ContentKind::Style => "style",
            ContentKind::Script => "script",
            ContentKind::Other => "other",
        }
    }
}

/// A loaded node's structured representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Markup(markup::Document),
    Style(style::Stylesheet),
    Script(script::Program),
    Opaque(Vec<u8>),
}

impl Content {
    /// Parse raw source text into the representation for `kind`.
    pub fn parse(kind: ContentKind, bytes: &[u8]) -> Result<Self, ParseError> {
        let text = || String::from_utf8_lossy(bytes);
        Ok(match kind {
            ContentKind::Markup => Content::Markup(markup::Document::parse(&text())?),
            ContentKind::Style => Content::Style(style::Stylesheet::parse(&text())?),
            ContentKind::Script => Content::Script(script::Program::parse(&text())?),
            ContentKind::Other => Content::Opaque(bytes.to_vec()),
        })
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            Content::Markup(_) => ContentKind::Markup,
            Content::Style(_) => ContentKind::Style,
            Content::Script(_) => ContentKind::Script,
            Content::Opaque(_) => ContentKind::Other,
        }
    }

    /// Print the representation back to bytes.
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Content::Markup(doc) => doc.to_html().into_bytes(),
            Content::Style(sheet) => sheet.to_css().into_bytes(),
            Content::Script(program) => program.to_js().into_bytes(),
            Content::Opaque(bytes) => bytes.clone(),
        }
    }
}
