//! Markup documents.
//!
//! A small, tolerant HTML tokenizer feeding an arena DOM. Nodes are addressed
//! by [`DomId`], which stays valid for the lifetime of the document: detaching
//! a node never reuses its slot. Reference edges anchor on these ids, and a
//! cloned document keeps the same ids, so anchors carry over to the copy.
//!
//! ## i18n directives
//!
//! Three forms carry a translation key:
//!
//! ```html
//! <i18n key="greeting">Hello</i18n>            <!-- element, replaced wholesale -->
//! <h1 data-i18n="title">Welcome</h1>          <!-- contents replaced -->
//! <img data-i18n-attr="alt: logo.alt" alt="">  <!-- attributes set -->
//! ```
//!
//! An empty key (`data-i18n=""`) is a null key: the directive exists but does
//! not make the document locale-sensitive.

use super::{ParseError, line_at};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, Option<String>)>,
    pub children: Vec<DomId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Document { children: Vec<DomId> },
    Element(Element),
    /// Raw text, serialised verbatim.
    Text(String),
    Comment(String),
    Doctype(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    node: DomNode,
    parent: Option<DomId>,
}

/// A parsed markup document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    entries: Vec<Entry>,
}

/// One translation directive found in a document.
#[derive(Debug, Clone, PartialEq)]
pub enum I18nDirective {
    /// `<i18n key="…">`: the element itself is replaced.
    Element { id: DomId, key: Option<String> },
    /// `data-i18n="…"`: the element's contents are replaced.
    Contents { id: DomId, key: Option<String> },
    /// One `attr:key` pair of `data-i18n-attr`.
    Attribute {
        id: DomId,
        attribute: String,
        key: Option<String>,
    },
}

impl I18nDirective {
    pub fn key(&self) -> Option<&str> {
        match self {
            I18nDirective::Element { key, .. }
            | I18nDirective::Contents { key, .. }
            | I18nDirective::Attribute { key, .. } => key.as_deref(),
        }
    }

    pub fn element(&self) -> DomId {
        match self {
            I18nDirective::Element { id, .. }
            | I18nDirective::Contents { id, .. }
            | I18nDirective::Attribute { id, .. } => *id,
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document.
    pub fn new() -> Self {
        Self {
            entries: vec![Entry {
                node: DomNode::Document {
                    children: Vec::new(),
                },
                parent: None,
            }],
        }
    }

    /// Parse a complete document.
    pub fn parse(src: &str) -> Result<Self, ParseError> {
        let mut doc = Document::new();
        let mut stack = vec![doc.root()];
        let mut tokenizer = Tokenizer { src, pos: 0 };

        while let Some(token) = tokenizer.next_token()? {
            let top = *stack.last().unwrap_or(&doc.root());
            match token {
                Token::Text(text) => {
                    doc.append(top, DomNode::Text(text));
                }
                Token::Comment(text) => {
                    doc.append(top, DomNode::Comment(text));
                }
                Token::Doctype(text) => {
                    doc.append(top, DomNode::Doctype(text));
                }
                Token::Start {
                    name,
                    attrs,
                    self_closing,
                    raw_text,
                } => {
                    let is_void = VOID_ELEMENTS.contains(&name.as_str());
                    let id = doc.append(
                        top,
                        DomNode::Element(Element {
                            name,
                            attrs,
                            children: Vec::new(),
                        }),
                    );
                    if let Some(text) = raw_text {
                        if !text.is_empty() {
                            doc.append(id, DomNode::Text(text));
                        }
                    } else if !is_void && !self_closing {
                        stack.push(id);
                    }
                }
                Token::End(name) => {
                    let matching = stack.iter().rposition(|&id| {
                        doc.element(id)
                            .is_some_and(|el| el.name.eq_ignore_ascii_case(&name))
                    });
                    if let Some(pos) = matching {
                        stack.truncate(pos);
                    }
                }
            }
        }
        Ok(doc)
    }

    /// Parse a fragment (e.g. a translated string containing markup).
    pub fn parse_fragment(src: &str) -> Result<Self, ParseError> {
        Self::parse(src)
    }

    pub fn root(&self) -> DomId {
        DomId(0)
    }

    pub fn get(&self, id: DomId) -> Option<&DomNode> {
        self.entries.get(id.0).map(|e| &e.node)
    }

    pub fn element(&self, id: DomId) -> Option<&Element> {
        match self.get(id)? {
            DomNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: DomId) -> Option<&mut Element> {
        match self.entries.get_mut(id.0).map(|e| &mut e.node)? {
            DomNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn parent(&self, id: DomId) -> Option<DomId> {
        self.entries.get(id.0).and_then(|e| e.parent)
    }

    pub fn children(&self, id: DomId) -> &[DomId] {
        match self.get(id) {
            Some(DomNode::Document { children }) => children,
            Some(DomNode::Element(el)) => &el.children,
            _ => &[],
        }
    }

    fn children_mut(&mut self, id: DomId) -> Option<&mut Vec<DomId>> {
        match &mut self.entries.get_mut(id.0)?.node {
            DomNode::Document { children } => Some(children),
            DomNode::Element(el) => Some(&mut el.children),
            _ => None,
        }
    }

    fn alloc(&mut self, node: DomNode) -> DomId {
        self.entries.push(Entry { node, parent: None });
        DomId(self.entries.len() - 1)
    }

    /// Append a new node as the last child of `parent`.
    pub fn append(&mut self, parent: DomId, node: DomNode) -> DomId {
        let id = self.alloc(node);
        self.attach(parent, None, id);
        id
    }

    fn attach(&mut self, parent: DomId, index: Option<usize>, child: DomId) {
        if let Some(children) = self.children_mut(parent) {
            match index {
                Some(i) if i <= children.len() => children.insert(i, child),
                _ => children.push(child),
            }
            self.entries[child.0].parent = Some(parent);
        }
    }

    /// Detach a node from its parent. The slot stays allocated.
    pub fn detach(&mut self, id: DomId) -> Option<usize> {
        let parent = self.parent(id)?;
        let children = self.children_mut(parent)?;
        let index = children.iter().position(|&c| c == id)?;
        children.remove(index);
        self.entries[id.0].parent = None;
        Some(index)
    }

    /// Whether the node is still reachable from the document root.
    pub fn is_attached(&self, id: DomId) -> bool {
        let mut current = id;
        loop {
            if current == self.root() {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// All attached nodes under `id` in document order, `id` excluded.
    pub fn descendants(&self, id: DomId) -> Vec<DomId> {
        let mut out = Vec::new();
        let mut stack: Vec<DomId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// All attached elements in document order.
    pub fn elements(&self) -> Vec<DomId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|&id| self.element(id).is_some())
            .collect()
    }

    /// Attached elements with the given (lower-case) name.
    pub fn elements_named(&self, name: &str) -> Vec<DomId> {
        self.elements()
            .into_iter()
            .filter(|&id| self.element(id).is_some_and(|el| el.name == name))
            .collect()
    }

    /// The first element child of the document.
    pub fn document_element(&self) -> Option<DomId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|&id| self.element(id).is_some())
    }

    pub fn get_attribute(&self, id: DomId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    pub fn has_attribute(&self, id: DomId, name: &str) -> bool {
        self.element(id)
            .is_some_and(|el| el.attrs.iter().any(|(n, _)| n == name))
    }

    pub fn set_attribute(&mut self, id: DomId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            match el.attrs.iter_mut().find(|(n, _)| n == name) {
                Some((_, v)) => *v = Some(value.to_string()),
                None => el.attrs.push((name.to_string(), Some(value.to_string()))),
            }
        }
    }

    pub fn remove_attribute(&mut self, id: DomId, name: &str) -> Option<String> {
        let el = self.element_mut(id)?;
        let pos = el.attrs.iter().position(|(n, _)| n == name)?;
        Some(el.attrs.remove(pos).1.unwrap_or_default())
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: DomId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|d| match self.get(d) {
                Some(DomNode::Text(t)) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all children of `id` with a single raw text node.
    pub fn set_text(&mut self, id: DomId, text: &str) {
        self.clear_children(id);
        if !text.is_empty() {
            self.append(id, DomNode::Text(text.to_string()));
        }
    }

    fn clear_children(&mut self, id: DomId) {
        for child in self.children(id).to_vec() {
            self.detach(child);
        }
    }

    /// Copy the top-level nodes of `fragment` into this document under
    /// `parent`, starting at `index`. Returns the ids of the copied roots.
    fn import(&mut self, fragment: &Document, parent: DomId, mut index: usize) -> Vec<DomId> {
        let mut roots = Vec::new();
        for &child in fragment.children(fragment.root()) {
            let copied = self.import_node(fragment, child);
            self.attach(parent, Some(index), copied);
            index += 1;
            roots.push(copied);
        }
        roots
    }

    fn import_node(&mut self, fragment: &Document, id: DomId) -> DomId {
        let node = match fragment.get(id) {
            Some(DomNode::Element(el)) => DomNode::Element(Element {
                name: el.name.clone(),
                attrs: el.attrs.clone(),
                children: Vec::new(),
            }),
            Some(other) => other.clone(),
            None => DomNode::Text(String::new()),
        };
        let copied = self.alloc(node);
        for &child in fragment.children(id) {
            let c = self.import_node(fragment, child);
            self.attach(copied, None, c);
        }
        copied
    }

    /// Replace the contents of `id` with a copy of `fragment`.
    pub fn replace_children_with(&mut self, id: DomId, fragment: &Document) {
        self.clear_children(id);
        self.import(fragment, id, 0);
    }

    /// Replace `id` itself with a copy of `fragment`.
    pub fn replace_with(&mut self, id: DomId, fragment: &Document) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(index) = self.detach(id) {
            self.import(fragment, parent, index);
        }
    }

    /// `lang` attribute values of every attached `html` element.
    pub fn lang_values(&self) -> Vec<String> {
        self.elements_named("html")
            .into_iter()
            .filter_map(|id| self.get_attribute(id, "lang").map(str::to_string))
            .collect()
    }

    /// Every i18n directive in document order.
    pub fn i18n_directives(&self) -> Vec<I18nDirective> {
        let non_empty = |v: &str| {
            let v = v.trim();
            (!v.is_empty()).then(|| v.to_string())
        };
        let mut out = Vec::new();
        for id in self.elements() {
            let Some(el) = self.element(id) else { continue };
            if el.name == "i18n" {
                out.push(I18nDirective::Element {
                    id,
                    key: self.get_attribute(id, "key").and_then(non_empty),
                });
                continue;
            }
            if let Some(key) = self.get_attribute(id, "data-i18n") {
                out.push(I18nDirective::Contents {
                    id,
                    key: non_empty(key),
                });
            }
            if let Some(spec) = self.get_attribute(id, "data-i18n-attr") {
                for pair in spec.split(',') {
                    let Some((attribute, key)) = pair.split_once(':') else {
                        continue;
                    };
                    out.push(I18nDirective::Attribute {
                        id,
                        attribute: attribute.trim().to_string(),
                        key: non_empty(key),
                    });
                }
            }
        }
        out
    }

    /// Serialise the document back to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for &child in self.children(self.root()) {
            self.write_node(child, &mut out);
        }
        out
    }

    /// Serialise only the contents of `id`.
    pub fn inner_html(&self, id: DomId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: DomId, out: &mut String) {
        match self.get(id) {
            Some(DomNode::Document { children }) => {
                for &c in children {
                    self.write_node(c, out);
                }
            }
            Some(DomNode::Element(el)) => {
                out.push('<');
                out.push_str(&el.name);
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    if let Some(v) = value {
                        out.push_str("=\"");
                        out.push_str(&escape_attribute(v));
                        out.push('"');
                    }
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&el.name.as_str()) {
                    return;
                }
                for &c in &el.children {
                    self.write_node(c, out);
                }
                out.push_str("</");
                out.push_str(&el.name);
                out.push('>');
            }
            Some(DomNode::Text(text)) => out.push_str(text),
            Some(DomNode::Comment(text)) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            Some(DomNode::Doctype(text)) => {
                out.push_str("<!");
                out.push_str(text);
                out.push('>');
            }
            None => {}
        }
    }
}

/// Escape text for use inside element content.
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

enum Token {
    Text(String),
    Comment(String),
    Doctype(String),
    Start {
        name: String,
        attrs: Vec<(String, Option<String>)>,
        self_closing: bool,
        raw_text: Option<String>,
    },
    End(String),
}

struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
}

impl Tokenizer<'_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn unterminated(&self, what: &'static str, start: usize) -> ParseError {
        ParseError::Unterminated {
            what,
            line: line_at(self.src, start),
        }
    }

    fn starts_tag(&self) -> bool {
        let rest = self.rest().as_bytes();
        rest.first() == Some(&b'<')
            && match rest.get(1) {
                Some(b'!') => true,
                Some(b'/') => rest.get(2).is_some_and(u8::is_ascii_alphabetic),
                Some(c) => c.is_ascii_alphabetic(),
                None => false,
            }
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        if self.pos >= self.src.len() {
            return Ok(None);
        }
        let start = self.pos;
        if !self.starts_tag() {
            self.bump();
            while self.pos < self.src.len() && !self.starts_tag() {
                self.bump();
            }
            return Ok(Some(Token::Text(self.src[start..self.pos].to_string())));
        }

        let rest = self.rest();
        if let Some(body) = rest.strip_prefix("<!--") {
            let end = body
                .find("-->")
                .ok_or_else(|| self.unterminated("comment", start))?;
            let text = body[..end].to_string();
            self.pos += 4 + end + 3;
            return Ok(Some(Token::Comment(text)));
        }
        if let Some(body) = rest.strip_prefix("<!") {
            let end = body
                .find('>')
                .ok_or_else(|| self.unterminated("doctype", start))?;
            let text = body[..end].to_string();
            self.pos += 2 + end + 1;
            return Ok(Some(Token::Doctype(text)));
        }
        if let Some(body) = rest.strip_prefix("</") {
            let end = body
                .find('>')
                .ok_or_else(|| self.unterminated("end tag", start))?;
            let name = body[..end].trim().to_ascii_lowercase();
            self.pos += 2 + end + 1;
            return Ok(Some(Token::End(name)));
        }

        self.bump();
        let name = self.read_name().to_ascii_lowercase();
        let mut attrs = Vec::new();
        let mut self_closing = false;
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.unterminated("start tag", start)),
                Some('>') => {
                    self.bump();
                    break;
                }
                Some('/') => {
                    self.bump();
                    if self.peek() == Some('>') {
                        self.bump();
                        self_closing = true;
                        break;
                    }
                }
                Some(_) => {
                    let attr_name = self.read_name().to_ascii_lowercase();
                    if attr_name.is_empty() {
                        self.bump();
                        continue;
                    }
                    self.skip_whitespace();
                    let value = if self.peek() == Some('=') {
                        self.bump();
                        self.skip_whitespace();
                        Some(decode_entities(&self.read_attribute_value(start)?))
                    } else {
                        None
                    };
                    attrs.push((attr_name, value));
                }
            }
        }

        let raw_text = if RAW_TEXT_ELEMENTS.contains(&name.as_str()) && !self_closing {
            let closing = format!("</{name}");
            let lower = self.rest().to_ascii_lowercase();
            let end = lower
                .find(&closing)
                .ok_or_else(|| self.unterminated("raw text element", start))?;
            let text = self.rest()[..end].to_string();
            self.pos += end;
            let close_end = self
                .rest()
                .find('>')
                .ok_or_else(|| self.unterminated("end tag", start))?;
            self.pos += close_end + 1;
            Some(text)
        } else {
            None
        };

        Ok(Some(Token::Start {
            name,
            attrs,
            self_closing,
            raw_text,
        }))
    }

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !matches!(c, '>' | '/' | '=' | '"' | '\''))
        {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn read_attribute_value(&mut self, tag_start: usize) -> Result<String, ParseError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let end = self
                    .rest()
                    .find(quote)
                    .ok_or_else(|| self.unterminated("attribute value", tag_start))?;
                let value = self.rest()[..end].to_string();
                self.pos += end + 1;
                Ok(value)
            }
            _ => {
                let start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| !c.is_whitespace() && c != '>')
                {
                    self.bump();
                }
                Ok(self.src[start..self.pos].to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<title data-i18n="title">Welcome</title>
<link rel="stylesheet" href="style.css">
<script>var x = "<b>";</script>
</head>
<body>
<!-- nav -->
<p>Hi <i18n key="greeting">Hello</i18n>!</p>
<img src="logo.png" data-i18n-attr="alt: logo.alt, title:">
</body>
</html>"#;

    #[test]
    fn parse_and_serialize_is_stable() {
        let doc = Document::parse(PAGE).unwrap();
        assert_eq!(doc.to_html(), PAGE);
    }

    #[test]
    fn document_element_is_html() {
        let doc = Document::parse(PAGE).unwrap();
        let html = doc.document_element().unwrap();
        assert_eq!(doc.element(html).unwrap().name, "html");
    }

    #[test]
    fn raw_text_elements_keep_markup_like_content() {
        let doc = Document::parse(PAGE).unwrap();
        let script = doc.elements_named("script")[0];
        assert_eq!(doc.text_content(script), r#"var x = "<b>";"#);
        assert!(doc.elements_named("b").is_empty());
    }

    #[test]
    fn void_elements_do_not_swallow_siblings() {
        let doc = Document::parse("<p><br>text<img src=a.png>after</p>").unwrap();
        let p = doc.elements_named("p")[0];
        assert_eq!(doc.children(p).len(), 4);
    }

    #[test]
    fn unclosed_elements_are_tolerated() {
        let doc = Document::parse("<div><span>one</div><p>two").unwrap();
        let div = doc.elements_named("div")[0];
        let p = doc.elements_named("p")[0];
        assert_eq!(doc.parent(p), Some(doc.root()));
        assert_eq!(doc.text_content(div), "one");
    }

    #[test]
    fn unterminated_comment_is_error() {
        let err = Document::parse("<p>ok</p>\n<!-- oops").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Unterminated {
                what: "comment",
                line: 2
            }
        ));
    }

    #[test]
    fn attributes_are_decoded_and_reencoded() {
        let doc = Document::parse(r#"<a title="a &quot;b&quot; &amp; c" hidden>x</a>"#).unwrap();
        let a = doc.elements_named("a")[0];
        assert_eq!(doc.get_attribute(a, "title"), Some(r#"a "b" & c"#));
        assert_eq!(doc.get_attribute(a, "hidden"), Some(""));
        assert_eq!(
            doc.to_html(),
            r#"<a title="a &quot;b&quot; &amp; c" hidden>x</a>"#
        );
    }

    #[test]
    fn unquoted_attribute_values() {
        let doc = Document::parse("<img src=logo.png alt=x>").unwrap();
        let img = doc.elements_named("img")[0];
        assert_eq!(doc.get_attribute(img, "src"), Some("logo.png"));
        assert_eq!(doc.get_attribute(img, "alt"), Some("x"));
    }

    #[test]
    fn i18n_directives_in_document_order() {
        let doc = Document::parse(PAGE).unwrap();
        let directives = doc.i18n_directives();
        let keys: Vec<Option<&str>> = directives.iter().map(|d| d.key()).collect();
        assert_eq!(
            keys,
            vec![Some("title"), Some("greeting"), Some("logo.alt"), None]
        );
    }

    #[test]
    fn empty_data_i18n_is_null_key() {
        let doc = Document::parse(r#"<p data-i18n="">x</p>"#).unwrap();
        let directives = doc.i18n_directives();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].key(), None);
    }

    #[test]
    fn replace_with_fragment_keeps_position() {
        let mut doc = Document::parse("<p>a<i18n key=k>b</i18n>c</p>").unwrap();
        let tag = doc.elements_named("i18n")[0];
        let fragment = Document::parse_fragment("<b>B</b>!").unwrap();
        doc.replace_with(tag, &fragment);
        assert_eq!(doc.to_html(), "<p>a<b>B</b>!c</p>");
        assert!(!doc.is_attached(tag));
    }

    #[test]
    fn replace_children_with_fragment() {
        let mut doc = Document::parse("<h1>Old <em>title</em></h1>").unwrap();
        let h1 = doc.elements_named("h1")[0];
        doc.replace_children_with(h1, &Document::parse_fragment("New").unwrap());
        assert_eq!(doc.to_html(), "<h1>New</h1>");
    }

    #[test]
    fn set_and_remove_attributes() {
        let mut doc = Document::parse("<html><body></body></html>").unwrap();
        let html = doc.document_element().unwrap();
        doc.set_attribute(html, "lang", "fr");
        assert_eq!(doc.lang_values(), vec!["fr".to_string()]);
        doc.set_attribute(html, "lang", "de");
        assert_eq!(doc.to_html(), r#"<html lang="de"><body></body></html>"#);
        assert_eq!(doc.remove_attribute(html, "lang").as_deref(), Some("de"));
        assert!(!doc.has_attribute(html, "lang"));
    }

    #[test]
    fn set_text_replaces_children() {
        let mut doc = Document::parse("<style>a{}</style>").unwrap();
        let style = doc.elements_named("style")[0];
        doc.set_text(style, "b{}");
        assert_eq!(doc.to_html(), "<style>b{}</style>");
    }

    #[test]
    fn stray_less_than_is_text() {
        let doc = Document::parse("<p>1 < 2</p>").unwrap();
        assert_eq!(doc.to_html(), "<p>1 < 2</p>");
    }

    #[test]
    fn escape_text_escapes_markup() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
    }
}
