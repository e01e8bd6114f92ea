//! Style rule trees.
//!
//! Stylesheets are parsed into a list of [`StyleItem`]s. Qualified rules get a
//! [`RuleId`] that is stable across clones of the sheet, so reference edges
//! created from `url(...)` tokens can anchor on the rule they live in.
//! Conditional group rules (`@media`, `@supports`, …) are parsed recursively;
//! other block at-rules (`@font-face`, `@keyframes`) are kept verbatim.
//! Comments are dropped.

use super::{ParseError, line_at};
use regex::Regex;
use std::sync::LazyLock;

static URL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)\s]*))\s*\)"#)
        .expect("url() pattern is valid")
});

const NESTED_AT_RULES: &[&str] = &["media", "supports", "layer", "container", "document"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) u32);

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub id: RuleId,
    pub selector: String,
    pub declarations: Vec<Declaration>,
}

impl StyleRule {
    /// Every `url(...)` target referenced from this rule's declarations.
    pub fn urls(&self) -> Vec<String> {
        self.declarations
            .iter()
            .flat_map(|d| extract_urls(&d.value))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StyleItem {
    Rule(StyleRule),
    /// `@media …`, `@supports …` and friends, with nested items.
    Block { prelude: String, items: Vec<StyleItem> },
    /// `@import …;`, `@charset …;`
    Statement(String),
    /// Any other block at-rule, kept as written.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stylesheet {
    pub items: Vec<StyleItem>,
    next_id: u32,
}

/// All `url(...)` targets in a declaration value.
pub fn extract_urls(value: &str) -> Vec<String> {
    URL_TOKEN
        .captures_iter(value)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map(|m| m.as_str().to_string())
        .filter(|u| !u.is_empty())
        .collect()
}

/// `value` with the first `url(...)` target equal to `old` replaced by `new`,
/// quoting kept. `None` when no such target exists.
pub fn replace_url(value: &str, old: &str, new: &str) -> Option<String> {
    let target = URL_TOKEN
        .captures_iter(value)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .find(|m| m.as_str() == old)?;
    Some(format!("{}{new}{}", &value[..target.start()], &value[target.end()..]))
}

impl Stylesheet {
    pub fn parse(src: &str) -> Result<Self, ParseError> {
        let stripped = strip_comments(src)?;
        let mut parser = Parser {
            src: &stripped,
            pos: 0,
            next_id: 0,
        };
        let items = parser.parse_items(false)?;
        Ok(Self {
            items,
            next_id: parser.next_id,
        })
    }

    /// Every qualified rule, nested ones included, in source order.
    pub fn rules(&self) -> Vec<&StyleRule> {
        fn walk<'a>(items: &'a [StyleItem], out: &mut Vec<&'a StyleRule>) {
            for item in items {
                match item {
                    StyleItem::Rule(rule) => out.push(rule),
                    StyleItem::Block { items, .. } => walk(items, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.items, &mut out);
        out
    }

    pub fn rule(&self, id: RuleId) -> Option<&StyleRule> {
        self.rules().into_iter().find(|r| r.id == id)
    }

    pub fn rule_mut(&mut self, id: RuleId) -> Option<&mut StyleRule> {
        fn walk(items: &mut [StyleItem], id: RuleId) -> Option<&mut StyleRule> {
            for item in items {
                match item {
                    StyleItem::Rule(rule) if rule.id == id => return Some(rule),
                    StyleItem::Block { items, .. } => {
                        if let Some(found) = walk(items, id) {
                            return Some(found);
                        }
                    }
                    _ => {}
                }
            }
            None
        }
        walk(&mut self.items, id)
    }

    /// Delete a rule wherever it is nested. Returns whether it existed.
    pub fn remove_rule(&mut self, id: RuleId) -> bool {
        fn walk(items: &mut Vec<StyleItem>, id: RuleId) -> bool {
            if let Some(pos) = items
                .iter()
                .position(|i| matches!(i, StyleItem::Rule(r) if r.id == id))
            {
                items.remove(pos);
                return true;
            }
            items.iter_mut().any(|item| match item {
                StyleItem::Block { items, .. } => walk(items, id),
                _ => false,
            })
        }
        walk(&mut self.items, id)
    }

    /// Append a new rule at top level and return its id.
    pub fn push_rule(&mut self, selector: &str, declarations: Vec<Declaration>) -> RuleId {
        let id = RuleId(self.next_id);
        self.next_id += 1;
        self.items.push(StyleItem::Rule(StyleRule {
            id,
            selector: selector.to_string(),
            declarations,
        }));
        id
    }

    pub fn to_css(&self) -> String {
        let mut out = String::new();
        write_items(&self.items, 0, &mut out);
        out
    }
}

fn write_items(items: &[StyleItem], depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    for item in items {
        match item {
            StyleItem::Rule(rule) => {
                out.push_str(&format!("{pad}{} {{\n", rule.selector));
                for d in &rule.declarations {
                    out.push_str(&format!("{pad}  {}: {};\n", d.property, d.value));
                }
                out.push_str(&format!("{pad}}}\n"));
            }
            StyleItem::Block { prelude, items } => {
                out.push_str(&format!("{pad}{prelude} {{\n"));
                write_items(items, depth + 1, out);
                out.push_str(&format!("{pad}}}\n"));
            }
            StyleItem::Statement(text) => out.push_str(&format!("{pad}{text};\n")),
            StyleItem::Raw(text) => out.push_str(&format!("{pad}{text}\n")),
        }
    }
}

fn strip_comments(src: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.char_indices().peekable();
    let mut quote: Option<char> = None;
    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None if c == '/' && chars.peek().map(|&(_, n)| n) == Some('*') => {
                let end = src[i + 2..].find("*/").ok_or(ParseError::Unterminated {
                    what: "comment",
                    line: line_at(src, i),
                })?;
                let resume = i + 2 + end + 2;
                while chars.peek().is_some_and(|&(j, _)| j < resume) {
                    chars.next();
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }
    Ok(out)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    next_id: u32,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn line(&self) -> usize {
        line_at(self.src, self.pos)
    }

    /// Scan forward to the first top-level occurrence of one of `stops`,
    /// honouring strings, parentheses and brackets. Returns the byte offset.
    fn scan_to(&self, stops: &[char]) -> Option<usize> {
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut escaped = false;
        for (i, c) in self.src[self.pos..].char_indices() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '"' | '\'' => quote = Some(c),
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                _ if depth == 0 && stops.contains(&c) => return Some(self.pos + i),
                _ => {}
            }
        }
        None
    }

    fn parse_items(&mut self, nested: bool) -> Result<Vec<StyleItem>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(c) = self.src[self.pos..].chars().next() else {
                if nested {
                    return Err(ParseError::Unterminated {
                        what: "block",
                        line: self.line(),
                    });
                }
                return Ok(items);
            };
            match c {
                '}' if nested => {
                    self.pos += 1;
                    return Ok(items);
                }
                '}' => {
                    return Err(ParseError::Unexpected {
                        found: "'}'".into(),
                        expected: "a rule",
                        line: self.line(),
                    });
                }
                '@' => items.push(self.parse_at_rule()?),
                _ => items.push(self.parse_rule()?),
            }
        }
    }

    fn parse_at_rule(&mut self) -> Result<StyleItem, ParseError> {
        let start = self.pos;
        let line = self.line();
        let end = self.scan_to(&['{', ';', '}']).ok_or(ParseError::Unterminated {
            what: "at-rule",
            line,
        })?;
        let prelude = self.src[start..end].trim().to_string();
        let name: String = prelude[1..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match self.src[end..].chars().next() {
            Some(';') => {
                self.pos = end + 1;
                Ok(StyleItem::Statement(prelude))
            }
            Some('}') => {
                self.pos = end;
                Ok(StyleItem::Statement(prelude))
            }
            _ => {
                self.pos = end + 1;
                if NESTED_AT_RULES.contains(&name.as_str()) {
                    let items = self.parse_items(true)?;
                    Ok(StyleItem::Block { prelude, items })
                } else {
                    let body_end = self.matching_brace(line)?;
                    let raw = format!("{} {{{}}}", prelude, &self.src[self.pos..body_end]);
                    self.pos = body_end + 1;
                    Ok(StyleItem::Raw(raw))
                }
            }
        }
    }

    /// Offset of the `}` closing the block whose `{` was just consumed.
    fn matching_brace(&self, line: usize) -> Result<usize, ParseError> {
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        for (i, c) in self.src[self.pos..].char_indices() {
            if let Some(q) = quote {
                if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '"' | '\'' => quote = Some(c),
                '{' => depth += 1,
                '}' if depth == 0 => return Ok(self.pos + i),
                '}' => depth -= 1,
                _ => {}
            }
        }
        Err(ParseError::Unterminated {
            what: "block",
            line,
        })
    }

    fn parse_rule(&mut self) -> Result<StyleItem, ParseError> {
        let line = self.line();
        let open = self.scan_to(&['{', '}']).ok_or(ParseError::Unterminated {
            what: "rule",
            line,
        })?;
        if self.src[open..].starts_with('}') {
            return Err(ParseError::Unexpected {
                found: "'}'".into(),
                expected: "'{' after selector",
                line,
            });
        }
        let selector = normalize_whitespace(&self.src[self.pos..open]);
        self.pos = open + 1;
        let close = self.matching_brace(line)?;
        let body = &self.src[self.pos..close];
        let declarations = split_declarations(body);
        self.pos = close + 1;
        let id = RuleId(self.next_id);
        self.next_id += 1;
        Ok(StyleItem::Rule(StyleRule {
            id,
            selector,
            declarations,
        }))
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn split_declarations(body: &str) -> Vec<Declaration> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
        .into_iter()
        .filter_map(|part| {
            let (property, value) = part.split_once(':')?;
            let property = property.trim();
            if property.is_empty() {
                return None;
            }
            Some(Declaration {
                property: property.to_string(),
                value: value.trim().to_string(),
            })
        })
        .collect()
}
