//! Shared test utilities for the sitegraph test suite.
//!
//! Graph builders that insert loaded, parsed nodes without populating them,
//! lookups that panic with a useful message, and a fixture site on disk.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut graph = ContentGraph::new();
//! let page = add_markup(&mut graph, "/index.html", r#"<script src="app.js"></script>"#);
//! add_script(&mut graph, "/app.js", "alert(TR('greeting'));");
//! graph.populate(page).unwrap();
//!
//! let app = find_node(&graph, "/app.js");
//! assert_eq!(serialized(&mut graph, app), "alert(TR(\"greeting\"));\n");
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::content::Content;
use crate::content::markup::Document;
use crate::content::script::Program;
use crate::content::style::Stylesheet;
use crate::graph::{ContentGraph, ContentNode, NodeId};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Graph builders: loaded and parsed, not populated
// =========================================================================

fn add_loaded(graph: &mut ContentGraph, url: &str, content: Content) -> NodeId {
    graph
        .add_node(ContentNode::loaded(url, content))
        .unwrap_or_else(|e| panic!("cannot add {url}: {e}"))
}

pub fn add_markup(graph: &mut ContentGraph, url: &str, html: &str) -> NodeId {
    let doc = Document::parse(html).unwrap_or_else(|e| panic!("{url}: {e}"));
    add_loaded(graph, url, Content::Markup(doc))
}

pub fn add_script(graph: &mut ContentGraph, url: &str, js: &str) -> NodeId {
    let program = Program::parse(js).unwrap_or_else(|e| panic!("{url}: {e}"));
    add_loaded(graph, url, Content::Script(program))
}

pub fn add_style(graph: &mut ContentGraph, url: &str, css: &str) -> NodeId {
    let sheet = Stylesheet::parse(css).unwrap_or_else(|e| panic!("{url}: {e}"));
    add_loaded(graph, url, Content::Style(sheet))
}

// =========================================================================
// Lookups: panic with a clear message on miss
// =========================================================================

/// The node at `url`. Panics if there is none.
pub fn find_node(graph: &ContentGraph, url: &str) -> NodeId {
    graph.node_by_locator(url).unwrap_or_else(|| {
        let urls: Vec<String> = graph
            .nodes()
            .filter_map(|(_, n)| n.url().map(str::to_string))
            .collect();
        panic!("no node at '{url}'. Available: {urls:?}")
    })
}

/// URL of `id`, or `"(inline)"`.
pub fn url_of(graph: &ContentGraph, id: NodeId) -> String {
    graph
        .node(id)
        .unwrap_or_else(|| panic!("{id} not in graph"))
        .locator
        .to_string()
}

/// Serialized content of `id` as text.
pub fn serialized(graph: &mut ContentGraph, id: NodeId) -> String {
    let bytes = graph.serialize(id).unwrap_or_else(|e| panic!("{id}: {e}"));
    String::from_utf8(bytes).unwrap()
}

/// Sorted URLs of every non-inline node.
pub fn all_urls(graph: &ContentGraph) -> Vec<String> {
    let mut urls: Vec<String> = graph
        .nodes()
        .filter_map(|(_, n)| n.url().map(str::to_string))
        .collect();
    urls.sort();
    urls
}
