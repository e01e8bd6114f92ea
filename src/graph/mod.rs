//! In-memory content-dependency graph.
//!
//! Nodes are documents, stylesheets, scripts and opaque assets; edges are the
//! references between them. Everything is keyed by monotonic integer ids held
//! in ordered maps, so queries and traversals are deterministic: the same
//! site always produces the same visit order.
//!
//! ## Inline nodes
//!
//! Content embedded in another node (a `<script>` body, a `<style>` block, a
//! `data:` URL) is an *inline* node: it has no URL of its own and records the
//! node that embeds it in [`ContentNode::container`]. Edits to an inline node
//! are written back into its container whenever the container is serialized
//! or cloned, so the container's own representation is always the source of
//! truth for what gets emitted.
//!
//! ## Insertion callbacks
//!
//! [`ContentGraph::populate_with`] and [`ContentGraph::clone_node`] take the
//! callback to run on every node they insert as an explicit argument. The
//! callback sees each new node after it is added and before its own
//! references are scanned, so edits it makes (adding or removing references)
//! are what population picks up.

pub mod href;
mod populate;

use crate::content::markup::DomId;
use crate::content::style::{self, RuleId};
use crate::content::{Content, ContentKind, ParseError};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge#{}", self.0)
    }
}

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("unknown {0}")]
    UnknownNode(NodeId),
    #[error("unknown {0}")]
    UnknownEdge(EdgeId),
    #[error("{0} is not loaded")]
    NotLoaded(NodeId),
    #[error("locator already in use: {0}")]
    DuplicateLocator(String),
    #[error("{kind} reference {href:?} from {from} not found in its anchor")]
    MissingAnchor {
        from: NodeId,
        kind: RelationKind,
        href: String,
    },
    #[error("inline {kind} in {container}: {source}")]
    InlineParse {
        container: NodeId,
        kind: &'static str,
        source: ParseError,
    },
}

/// Where a node lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Site-absolute path (`/js/app.js`) or external URL.
    Url(String),
    /// Embedded in its container's representation.
    Inline,
}

impl Locator {
    pub fn url(&self) -> Option<&str> {
        match self {
            Locator::Url(url) => Some(url),
            Locator::Inline => None,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Url(url) => f.write_str(url),
            Locator::Inline => f.write_str("(inline)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentNode {
    pub kind: ContentKind,
    pub locator: Locator,
    /// The node whose representation embeds this one. Set for inline nodes.
    pub container: Option<NodeId>,
    /// `None` until loaded.
    pub content: Option<Content>,
    /// Entry point of the site (a page the user navigates to directly).
    pub is_initial: bool,
}

impl ContentNode {
    /// An unloaded placeholder at `url`, kind guessed from the extension.
    pub fn placeholder(url: &str) -> Self {
        Self {
            kind: ContentKind::from_extension(url),
            locator: Locator::Url(url.to_string()),
            container: None,
            content: None,
            is_initial: false,
        }
    }

    /// A loaded node at `url`.
    pub fn loaded(url: &str, content: Content) -> Self {
        Self {
            kind: content.kind(),
            locator: Locator::Url(url.to_string()),
            container: None,
            content: Some(content),
            is_initial: false,
        }
    }

    pub fn is_inline(&self) -> bool {
        self.locator == Locator::Inline
    }

    pub fn is_loaded(&self) -> bool {
        self.content.is_some()
    }

    pub fn url(&self) -> Option<&str> {
        self.locator.url()
    }
}

/// What a reference means to the node making it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// `<script src>` or an inline `<script>` body.
    ScriptEmbed,
    /// `<link rel=stylesheet>` or an inline `<style>` block.
    StyleEmbed,
    /// `<script id="bootstrapper">`: the loader that runs before anything else.
    Bootstrap,
    Image,
    Frame,
    /// `url(...)` inside a style rule.
    StyleImage,
    /// `<a href>`.
    Navigation,
    /// `<meta http-equiv="refresh">`.
    Refresh,
    /// `//# sourceMappingURL=`.
    SourceReference,
}

impl RelationKind {
    /// Whether the referenced node is part of the referencing node's
    /// rendered content. Links, redirects, source maps and the bootstrap
    /// loader are not.
    pub fn is_structural(self) -> bool {
        !matches!(
            self,
            RelationKind::Navigation
                | RelationKind::Refresh
                | RelationKind::SourceReference
                | RelationKind::Bootstrap
        )
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RelationKind::ScriptEmbed => "script",
            RelationKind::StyleEmbed => "stylesheet",
            RelationKind::Bootstrap => "bootstrap",
            RelationKind::Image => "image",
            RelationKind::Frame => "frame",
            RelationKind::StyleImage => "style image",
            RelationKind::Navigation => "navigation",
            RelationKind::Refresh => "refresh",
            RelationKind::SourceReference => "source map",
        };
        f.write_str(label)
    }
}

/// Where in the referencing node's representation a reference is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Element(DomId),
    Rule(RuleId),
    SourceMapComment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: RelationKind,
    pub anchor: Anchor,
    /// Reference text as written in `from`. `None` for inline targets.
    pub href: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// A node before anything it references.
    Pre,
    /// Everything a node references before the node.
    Post,
}

#[derive(Debug, Default)]
pub struct ContentGraph {
    nodes: BTreeMap<NodeId, ContentNode>,
    edges: BTreeMap<EdgeId, Edge>,
    outgoing: BTreeMap<NodeId, Vec<EdgeId>>,
    incoming: BTreeMap<NodeId, Vec<EdgeId>>,
    by_url: BTreeMap<String, NodeId>,
    next_node: u32,
    next_edge: u32,
}

impl ContentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Option<&ContentNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ContentNode> {
        self.nodes.get_mut(&id)
    }

    fn require(&self, id: NodeId) -> Result<&ContentNode, GraphError> {
        self.nodes.get(&id).ok_or(GraphError::UnknownNode(id))
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &ContentNode)> {
        self.nodes.iter().map(|(&id, node)| (id, node))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn find_nodes(&self, pred: impl Fn(NodeId, &ContentNode) -> bool) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(id, node)| pred(**id, node))
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn find_edges(&self, pred: impl Fn(&Edge) -> bool) -> Vec<EdgeId> {
        self.edges
            .iter()
            .filter(|(_, edge)| pred(edge))
            .map(|(&id, _)| id)
            .collect()
    }

    /// Edges leaving `id`, in creation order.
    pub fn outgoing(&self, id: NodeId) -> &[EdgeId] {
        self.outgoing.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Edges arriving at `id`, in the order they were attached.
    pub fn incoming(&self, id: NodeId) -> &[EdgeId] {
        self.incoming.get(&id).map_or(&[], Vec::as_slice)
    }

    pub fn node_by_locator(&self, url: &str) -> Option<NodeId> {
        self.by_url.get(url).copied()
    }

    /// The nearest node at or above `id` that has a URL.
    pub fn non_inline_ancestor(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(container) = self.nodes.get(&current).and_then(|n| n.container) {
            current = container;
        }
        current
    }

    /// URL references inside `id` resolve against.
    pub(crate) fn base_url(&self, id: NodeId) -> String {
        self.nodes
            .get(&self.non_inline_ancestor(id))
            .and_then(ContentNode::url)
            .unwrap_or("/")
            .to_string()
    }

    /// Inline nodes embedded directly in `id`.
    pub fn inline_children(&self, id: NodeId) -> Vec<NodeId> {
        self.outgoing(id)
            .iter()
            .filter_map(|e| self.edges.get(e))
            .map(|e| e.to)
            .filter(|to| self.nodes.get(to).is_some_and(|n| n.container == Some(id)))
            .collect()
    }

    /// Depth-first walk from `root` over edges accepted by `follow`. Each
    /// node is visited once, so cycles terminate.
    pub fn traverse(&self, root: NodeId, follow: impl Fn(&Edge) -> bool, order: Order) -> Vec<NodeId> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        self.visit(root, &follow, order, &mut seen, &mut out);
        out
    }

    fn visit(
        &self,
        id: NodeId,
        follow: &dyn Fn(&Edge) -> bool,
        order: Order,
        seen: &mut BTreeSet<NodeId>,
        out: &mut Vec<NodeId>,
    ) {
        if !self.nodes.contains_key(&id) || !seen.insert(id) {
            return;
        }
        if order == Order::Pre {
            out.push(id);
        }
        for edge_id in self.outgoing(id) {
            if let Some(edge) = self.edges.get(edge_id)
                && follow(edge)
            {
                self.visit(edge.to, follow, order, seen, out);
            }
        }
        if order == Order::Post {
            out.push(id);
        }
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    pub fn add_node(&mut self, node: ContentNode) -> Result<NodeId, GraphError> {
        if let Some(url) = node.url() {
            if self.by_url.contains_key(url) {
                return Err(GraphError::DuplicateLocator(url.to_string()));
            }
        }
        let id = NodeId(self.next_node);
        self.next_node += 1;
        if let Some(url) = node.url() {
            self.by_url.insert(url.to_string(), id);
        }
        self.nodes.insert(id, node);
        Ok(id)
    }

    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        kind: RelationKind,
        anchor: Anchor,
        href: Option<String>,
    ) -> Result<EdgeId, GraphError> {
        self.require(from)?;
        self.require(to)?;
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.edges.insert(
            id,
            Edge {
                from,
                to,
                kind,
                anchor,
                href,
            },
        );
        self.outgoing.entry(from).or_default().push(id);
        self.incoming.entry(to).or_default().push(id);
        Ok(id)
    }

    /// Drop an edge from the bookkeeping. The reference text stays in the
    /// source representation.
    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(&id)?;
        if let Some(list) = self.outgoing.get_mut(&edge.from) {
            list.retain(|e| *e != id);
        }
        if let Some(list) = self.incoming.get_mut(&edge.to) {
            list.retain(|e| *e != id);
        }
        Some(edge)
    }

    /// Remove a node, every edge touching it and, recursively, the inline
    /// nodes it embeds.
    pub fn remove_node(&mut self, id: NodeId) -> Result<ContentNode, GraphError> {
        self.require(id)?;
        for child in self.inline_children(id) {
            self.remove_node(child)?;
        }
        let incident: Vec<EdgeId> = self
            .outgoing(id)
            .iter()
            .chain(self.incoming(id))
            .copied()
            .collect();
        for edge in incident {
            self.remove_edge(edge);
        }
        self.outgoing.remove(&id);
        self.incoming.remove(&id);
        let node = self.nodes.remove(&id).ok_or(GraphError::UnknownNode(id))?;
        if let Some(url) = node.url() {
            self.by_url.remove(url);
        }
        Ok(node)
    }

    /// Move a node to a new URL and refresh every reference to it, and every
    /// relative reference made from it, so they still resolve.
    pub fn set_locator(&mut self, id: NodeId, url: &str) -> Result<(), GraphError> {
        let node = self.require(id)?;
        if node.url() == Some(url) {
            return Ok(());
        }
        if self.by_url.contains_key(url) {
            return Err(GraphError::DuplicateLocator(url.to_string()));
        }
        let node = self.nodes.get_mut(&id).ok_or(GraphError::UnknownNode(id))?;
        if let Some(old) = node.url() {
            self.by_url.remove(old);
        }
        node.locator = Locator::Url(url.to_string());
        self.by_url.insert(url.to_string(), id);

        let affected = self.find_edges(|e| {
            e.href.is_some() && (e.to == id || self.non_inline_ancestor(e.from) == id)
        });
        for edge in affected {
            let to = self.edges[&edge].to;
            self.repoint_edge(edge, to)?;
        }
        Ok(())
    }

    /// Point `edge_id` at `target`, rewriting the reference text inside the
    /// source node's representation.
    pub fn repoint_edge(&mut self, edge_id: EdgeId, target: NodeId) -> Result<(), GraphError> {
        let edge = self
            .edges
            .get(&edge_id)
            .cloned()
            .ok_or(GraphError::UnknownEdge(edge_id))?;
        let target_url = self.require(target)?.url().map(str::to_string);

        let new_href = match (&edge.href, &target_url) {
            (Some(old), Some(url)) => {
                let base = self.base_url(edge.from);
                let new = href::rewrite_href(old, &base, url);
                if new != *old {
                    self.rewrite_anchor(&edge, old, &new)?;
                }
                Some(new)
            }
            _ => edge.href.clone(),
        };

        if edge.to != target {
            if let Some(list) = self.incoming.get_mut(&edge.to) {
                list.retain(|e| *e != edge_id);
            }
            self.incoming.entry(target).or_default().push(edge_id);
        }
        if let Some(stored) = self.edges.get_mut(&edge_id) {
            stored.to = target;
            stored.href = new_href;
        }
        Ok(())
    }

    fn rewrite_anchor(&mut self, edge: &Edge, old: &str, new: &str) -> Result<(), GraphError> {
        let missing = || GraphError::MissingAnchor {
            from: edge.from,
            kind: edge.kind,
            href: old.to_string(),
        };
        let content = self
            .nodes
            .get_mut(&edge.from)
            .and_then(|n| n.content.as_mut())
            .ok_or_else(missing)?;
        let rewritten = match (content, edge.anchor) {
            (Content::Markup(doc), Anchor::Element(el)) => {
                let attr = ["src", "href", "content"]
                    .into_iter()
                    .find(|a| doc.get_attribute(el, a).is_some_and(|v| v.contains(old)));
                match attr {
                    Some(attr) => {
                        let value = doc.get_attribute(el, attr).unwrap_or_default().replacen(old, new, 1);
                        doc.set_attribute(el, attr, &value);
                        true
                    }
                    None => false,
                }
            }
            (Content::Style(sheet), Anchor::Rule(rule_id)) => match sheet.rule_mut(rule_id) {
                Some(rule) => rule.declarations.iter_mut().any(|decl| {
                    match style::replace_url(&decl.value, old, new) {
                        Some(value) => {
                            decl.value = value;
                            true
                        }
                        None => false,
                    }
                }),
                None => false,
            },
            (Content::Script(program), Anchor::SourceMapComment) => {
                match &mut program.source_map_url {
                    Some(url) if url == old => {
                        *url = new.to_string();
                        true
                    }
                    _ => false,
                }
            }
            _ => false,
        };
        if rewritten { Ok(()) } else { Err(missing()) }
    }

    /// Write every loaded inline descendant of `id` back into its anchor.
    pub fn sync_inline(&mut self, id: NodeId) -> Result<(), GraphError> {
        let embeds: Vec<Edge> = self
            .outgoing(id)
            .iter()
            .filter_map(|e| self.edges.get(e))
            .filter(|e| self.nodes.get(&e.to).is_some_and(|n| n.container == Some(id)))
            .cloned()
            .collect();
        for edge in embeds {
            self.sync_inline(edge.to)?;
            let text = match self.nodes.get(&edge.to).and_then(|n| n.content.as_ref()) {
                Some(Content::Script(program)) => program.to_js(),
                Some(Content::Style(sheet)) => sheet.to_css(),
                _ => continue,
            };
            if let (Some(Content::Markup(doc)), Anchor::Element(el)) = (
                self.nodes.get_mut(&id).and_then(|n| n.content.as_mut()),
                edge.anchor,
            ) {
                doc.set_text(el, &text);
            }
        }
        Ok(())
    }

    /// Print a node's representation, inline descendants included.
    pub fn serialize(&mut self, id: NodeId) -> Result<Vec<u8>, GraphError> {
        self.sync_inline(id)?;
        self.require(id)?
            .content
            .as_ref()
            .map(Content::serialize)
            .ok_or(GraphError::NotLoaded(id))
    }

    /// Deep-copy a loaded node to `url`.
    ///
    /// The copy is inserted, handed to `on_inserted`, then populated (inline
    /// children are recreated from the copied representation and handed to
    /// `on_inserted` as well). Finally each edge in `repoint` is moved to
    /// the copy.
    ///
    /// An unloaded placeholder already at `url` (a link to a page that did
    /// not exist yet) becomes the copy: it keeps its id, so references to it
    /// resolve to the copy without being rewritten.
    pub fn clone_node<F, E>(
        &mut self,
        id: NodeId,
        url: &str,
        repoint: &[EdgeId],
        on_inserted: &mut F,
    ) -> Result<NodeId, E>
    where
        F: FnMut(&mut ContentGraph, NodeId) -> Result<(), E>,
        E: From<GraphError>,
    {
        self.sync_inline(id)?;
        let source = self.require(id)?;
        let content = source.content.clone().ok_or(GraphError::NotLoaded(id))?;
        let copy = ContentNode {
            kind: source.kind,
            locator: Locator::Url(url.to_string()),
            container: None,
            content: Some(content),
            is_initial: source.is_initial,
        };
        let placeholder = self
            .node_by_locator(url)
            .filter(|p| self.nodes.get(p).is_some_and(|n| !n.is_loaded()));
        let new_id = match placeholder {
            Some(existing) => {
                self.nodes.insert(existing, copy);
                existing
            }
            None => self.add_node(copy)?,
        };
        on_inserted(self, new_id)?;
        self.populate_with(new_id, on_inserted)?;
        for &edge in repoint {
            self.repoint_edge(edge, new_id)?;
        }
        Ok(new_id)
    }
}
