//! Reference discovery: turns what a node's representation points at into
//! edges, creating placeholder nodes for targets that are not in the graph
//! yet and inline nodes for embedded content.

use super::href::{has_scheme, resolve_href};
use super::{Anchor, ContentGraph, ContentNode, GraphError, Locator, NodeId, RelationKind};
use crate::content::Content;
use crate::content::markup::Document;
use crate::content::script::Program;
use crate::content::style::{Stylesheet, extract_urls};

enum Target {
    Url(String),
    Inline(Content),
}

struct Reference {
    kind: RelationKind,
    anchor: Anchor,
    href: Option<String>,
    target: Target,
}

impl ContentGraph {
    /// Create edges for everything a loaded node references.
    pub fn populate(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.populate_with(id, &mut |_: &mut ContentGraph, _: NodeId| Ok::<(), GraphError>(()))
    }

    /// Like [`populate`](Self::populate), handing every inline node it
    /// creates to `on_inserted` before that node is populated in turn.
    /// A node that already has outgoing edges is left alone.
    pub fn populate_with<F, E>(&mut self, id: NodeId, on_inserted: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut ContentGraph, NodeId) -> Result<(), E>,
        E: From<GraphError>,
    {
        if !self.outgoing(id).is_empty() {
            return Ok(());
        }
        let base = self.base_url(id);
        let node = self.node(id).ok_or(GraphError::UnknownNode(id))?;
        let references = match &node.content {
            Some(content) => references(id, content, &base)?,
            None => return Ok(()),
        };

        for reference in references {
            match reference.target {
                Target::Url(url) => {
                    let to = match self.node_by_locator(&url) {
                        Some(existing) => existing,
                        None => self.add_node(ContentNode::placeholder(&url))?,
                    };
                    self.add_edge(id, to, reference.kind, reference.anchor, reference.href)?;
                }
                Target::Inline(content) => {
                    let child = self.add_node(ContentNode {
                        kind: content.kind(),
                        locator: Locator::Inline,
                        container: Some(id),
                        content: Some(content),
                        is_initial: false,
                    })?;
                    self.add_edge(id, child, reference.kind, reference.anchor, None)?;
                    on_inserted(self, child)?;
                    self.populate_with(child, on_inserted)?;
                }
            }
        }
        Ok(())
    }
}

fn references(container: NodeId, content: &Content, base: &str) -> Result<Vec<Reference>, GraphError> {
    let mut out = Vec::new();
    match content {
        Content::Markup(doc) => markup_references(container, doc, base, &mut out)?,
        Content::Style(sheet) => style_references(sheet, base, &mut out),
        Content::Script(program) => {
            if let Some(url) = &program.source_map_url {
                push_href(&mut out, RelationKind::SourceReference, Anchor::SourceMapComment, url, base);
            }
        }
        Content::Opaque(_) => {}
    }
    Ok(out)
}

/// Record a reference written as `href`. `data:` URLs become inline
/// content; other non-web schemes are not followed.
fn push_href(out: &mut Vec<Reference>, kind: RelationKind, anchor: Anchor, href: &str, base: &str) {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return;
    }
    if href.starts_with("data:") {
        out.push(Reference {
            kind,
            anchor,
            href: None,
            target: Target::Inline(Content::Opaque(href.as_bytes().to_vec())),
        });
        return;
    }
    let lower = href.to_ascii_lowercase();
    if has_scheme(href) && !(lower.starts_with("http:") || lower.starts_with("https:")) {
        return;
    }
    out.push(Reference {
        kind,
        anchor,
        href: Some(href.to_string()),
        target: Target::Url(resolve_href(base, href)),
    });
}

fn is_script_type(ty: Option<&str>) -> bool {
    match ty.map(|t| t.trim().to_ascii_lowercase()) {
        None => true,
        Some(t) => t.is_empty() || t.contains("javascript") || t == "module",
    }
}

fn markup_references(
    container: NodeId,
    doc: &Document,
    base: &str,
    out: &mut Vec<Reference>,
) -> Result<(), GraphError> {
    for el in doc.elements() {
        let Some(element) = doc.element(el) else {
            continue;
        };
        let attr = |name: &str| doc.get_attribute(el, name);
        let anchor = Anchor::Element(el);
        match element.name.as_str() {
            "script" => {
                let kind = if attr("id") == Some("bootstrapper") {
                    RelationKind::Bootstrap
                } else {
                    RelationKind::ScriptEmbed
                };
                if let Some(src) = attr("src") {
                    push_href(out, kind, anchor, src, base);
                } else if is_script_type(attr("type")) {
                    let program = Program::parse(&doc.text_content(el)).map_err(|source| {
                        GraphError::InlineParse {
                            container,
                            kind: "script",
                            source,
                        }
                    })?;
                    out.push(inline(kind, anchor, Content::Script(program)));
                }
            }
            "style" => {
                let sheet = Stylesheet::parse(&doc.text_content(el)).map_err(|source| {
                    GraphError::InlineParse {
                        container,
                        kind: "style",
                        source,
                    }
                })?;
                out.push(inline(RelationKind::StyleEmbed, anchor, Content::Style(sheet)));
            }
            "link" => {
                let is_stylesheet = attr("rel").is_some_and(|rel| {
                    rel.split_whitespace()
                        .any(|r| r.eq_ignore_ascii_case("stylesheet"))
                });
                if is_stylesheet && let Some(href) = attr("href") {
                    push_href(out, RelationKind::StyleEmbed, anchor, href, base);
                }
            }
            "img" => {
                if let Some(src) = attr("src") {
                    push_href(out, RelationKind::Image, anchor, src, base);
                }
            }
            "iframe" | "frame" => {
                if let Some(src) = attr("src") {
                    push_href(out, RelationKind::Frame, anchor, src, base);
                }
            }
            "a" => {
                if let Some(href) = attr("href") {
                    push_href(out, RelationKind::Navigation, anchor, href, base);
                }
            }
            "meta" => {
                let is_refresh = attr("http-equiv").is_some_and(|v| v.eq_ignore_ascii_case("refresh"));
                if is_refresh && let Some(target) = attr("content").and_then(refresh_target) {
                    push_href(out, RelationKind::Refresh, anchor, target, base);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// The URL part of a refresh directive: `5; url=/next.html`.
fn refresh_target(content: &str) -> Option<&str> {
    let lower = content.to_ascii_lowercase();
    let at = lower.find("url=")? + 4;
    let target = content[at..].trim().trim_matches(['\'', '"']);
    (!target.is_empty()).then_some(target)
}

fn inline(kind: RelationKind, anchor: Anchor, content: Content) -> Reference {
    Reference {
        kind,
        anchor,
        href: None,
        target: Target::Inline(content),
    }
}

fn style_references(sheet: &Stylesheet, base: &str, out: &mut Vec<Reference>) {
    for rule in sheet.rules() {
        for declaration in &rule.declarations {
            for url in extract_urls(&declaration.value) {
                push_href(out, RelationKind::StyleImage, Anchor::Rule(rule.id), &url, base);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_target_parses_variants() {
        assert_eq!(refresh_target("0; url=/next.html"), Some("/next.html"));
        assert_eq!(refresh_target("5;URL='x.html'"), Some("x.html"));
        assert_eq!(refresh_target("5"), None);
    }

    #[test]
    fn script_types() {
        assert!(is_script_type(None));
        assert!(is_script_type(Some("text/javascript")));
        assert!(is_script_type(Some("module")));
        assert!(!is_script_type(Some("text/template")));
        assert!(!is_script_type(Some("application/json")));
    }

    #[test]
    fn non_web_schemes_and_fragments_are_skipped() {
        let mut out = Vec::new();
        for href in ["mailto:a@b.c", "javascript:void(0)", "#top", "", "tel:123"] {
            push_href(&mut out, RelationKind::Navigation, Anchor::SourceMapComment, href, "/");
        }
        assert!(out.is_empty());
    }

    #[test]
    fn data_urls_become_inline() {
        let mut out = Vec::new();
        push_href(&mut out, RelationKind::Image, Anchor::SourceMapComment, "data:image/gif;base64,R0", "/");
        assert!(matches!(out[0].target, Target::Inline(Content::Opaque(_))));
        assert!(out[0].href.is_none());
    }

    #[test]
    fn meta_refresh_becomes_edge() {
        let mut graph = ContentGraph::new();
        let doc = Document::parse(r#"<meta http-equiv="refresh" content="0; url=other.html">"#).unwrap();
        let page = graph
            .add_node(ContentNode::loaded("/a/index.html", Content::Markup(doc)))
            .unwrap();
        graph.populate(page).unwrap();
        let edge = graph.edge(graph.outgoing(page)[0]).unwrap();
        assert_eq!(edge.kind, RelationKind::Refresh);
        assert_eq!(graph.node(edge.to).unwrap().url(), Some("/a/other.html"));
    }

    #[test]
    fn inline_script_parse_errors_name_the_container() {
        let mut graph = ContentGraph::new();
        let doc = Document::parse("<script>var s = `x`;</script>").unwrap();
        let page = graph
            .add_node(ContentNode::loaded("/index.html", Content::Markup(doc)))
            .unwrap();
        assert!(matches!(
            graph.populate(page),
            Err(GraphError::InlineParse { kind: "script", .. })
        ));
    }
}
