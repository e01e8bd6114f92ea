//! Site scanning and graph loading.
//!
//! Stage 1 of the build pipeline. Walks the site directory, loads every file
//! into the content graph and links the nodes by their references.
//!
//! ## Directory Structure
//!
//! ```text
//! site/
//! ├── sitegraph.toml        # Configuration (optional)
//! ├── strings.i18n          # Translation catalog (any number of *.i18n files)
//! ├── index.html            # Top-level pages are entry points by default
//! ├── about.html
//! ├── css/site.css
//! ├── js/app.js
//! └── images/logo.png       # Anything else is carried as opaque bytes
//! ```
//!
//! ## Locators
//!
//! Every file becomes a node whose locator is its site-relative path with a
//! leading `/` (`css/site.css` → `/css/site.css`). Markup, style and script
//! files are parsed; a file that fails to parse aborts the scan. Hidden files
//! and the configuration file are skipped, and `*.i18n` files are merged into
//! the catalog (in path order) instead of becoming nodes.

use crate::config::{self, CONFIG_FILE, SiteConfig};
use crate::content::{Content, ContentKind, ParseError};
use crate::graph::{ContentGraph, ContentNode, GraphError, NodeId};
use crate::i18n::{Catalog, CatalogError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Extension of translation catalog files.
pub const CATALOG_EXTENSION: &str = "i18n";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: ParseError },
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("Entry point not found: {0}")]
    MissingEntryPoint(String),
}

/// Everything the later stages need.
#[derive(Debug)]
pub struct ScannedSite {
    pub graph: ContentGraph,
    pub catalog: Catalog,
    pub config: SiteConfig,
    /// Entry-point pages, in locator order.
    pub roots: Vec<NodeId>,
}

/// Locator for a file at `relative` inside the site.
fn locator_for(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("/{}", parts.join("/"))
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

pub fn scan(root: &Path) -> Result<ScannedSite, ScanError> {
    let config = config::load_config(root)?;
    let mut graph = ContentGraph::new();
    let mut catalog = Catalog::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if relative == Path::new(CONFIG_FILE) {
            continue;
        }
        if path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(CATALOG_EXTENSION))
        {
            catalog.merge(Catalog::load_file(path)?);
            continue;
        }

        let url = locator_for(relative);
        let kind = ContentKind::from_extension(&url);
        let bytes = fs::read(path)?;
        let content = Content::parse(kind, &bytes).map_err(|source| ScanError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(locator = %url, kind = kind.label(), "loaded");
        graph.add_node(ContentNode::loaded(&url, content))?;
    }

    let roots = mark_entry_points(&mut graph, &config)?;

    let loaded = graph.find_nodes(|_, n| n.is_loaded() && !n.is_inline());
    for id in loaded {
        graph.populate(id)?;
    }

    Ok(ScannedSite {
        graph,
        catalog,
        config,
        roots,
    })
}

fn is_top_level_page(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    url.rfind('/') == Some(0) && (lower.ends_with(".html") || lower.ends_with(".htm"))
}

/// Flag the configured entry points, or every top-level page when none are
/// configured.
fn mark_entry_points(graph: &mut ContentGraph, config: &SiteConfig) -> Result<Vec<NodeId>, ScanError> {
    let roots = if config.build.entry_points.is_empty() {
        graph.find_nodes(|_, n| n.url().is_some_and(is_top_level_page))
    } else {
        config
            .build
            .entry_points
            .iter()
            .map(|entry| {
                let url = format!("/{}", entry.trim().trim_start_matches('/'));
                graph
                    .node_by_locator(&url)
                    .ok_or(ScanError::MissingEntryPoint(entry.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    for &id in &roots {
        if let Some(node) = graph.node_mut(id) {
            node.is_initial = true;
        }
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    #[test]
    fn scan_loads_every_file_as_a_node() {
        let tmp = setup_fixtures();
        let site = scan(tmp.path()).unwrap();

        let urls = all_urls(&site.graph);
        for expected in [
            "/about.html",
            "/css/site.css",
            "/images/fr-flag.png",
            "/images/logo.png",
            "/index.html",
            "/js/app.js",
            "/js/boot.js",
            "/js/vendor.js",
        ] {
            assert!(urls.contains(&expected.to_string()), "{expected} in {urls:?}");
        }
        assert!(!urls.iter().any(|u| u.ends_with(".i18n") || u.ends_with(".toml")));
    }

    #[test]
    fn scan_reads_config_and_catalog() {
        let tmp = setup_fixtures();
        let site = scan(tmp.path()).unwrap();
        assert_eq!(site.config.i18n.locales, vec!["en", "fr"]);
        assert!(site.catalog.get("greeting", "fr").is_some());
    }

    #[test]
    fn top_level_pages_are_entry_points() {
        let tmp = setup_fixtures();
        let site = scan(tmp.path()).unwrap();
        let roots: Vec<String> = site.roots.iter().map(|&id| url_of(&site.graph, id)).collect();
        assert_eq!(roots, vec!["/about.html", "/index.html"]);
        assert!(site.graph.node(site.roots[0]).unwrap().is_initial);
        let app = find_node(&site.graph, "/js/app.js");
        assert!(!site.graph.node(app).unwrap().is_initial);
    }

    #[test]
    fn configured_entry_points_override_default() {
        let tmp = setup_fixtures();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            "[build]\nentry_points = [\"index.html\"]\n",
        )
        .unwrap();
        let site = scan(tmp.path()).unwrap();
        assert_eq!(site.roots.len(), 1);
        assert_eq!(url_of(&site.graph, site.roots[0]), "/index.html");
    }

    #[test]
    fn missing_entry_point_is_an_error() {
        let tmp = setup_fixtures();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            "[build]\nentry_points = [\"nope.html\"]\n",
        )
        .unwrap();
        assert!(matches!(
            scan(tmp.path()),
            Err(ScanError::MissingEntryPoint(e)) if e == "nope.html"
        ));
    }

    #[test]
    fn scan_populates_references() {
        let tmp = setup_fixtures();
        let site = scan(tmp.path()).unwrap();
        let index = find_node(&site.graph, "/index.html");
        let app = find_node(&site.graph, "/js/app.js");
        assert!(
            site.graph
                .outgoing(index)
                .iter()
                .any(|e| site.graph.edge(*e).unwrap().to == app)
        );
        assert!(!site.graph.incoming(find_node(&site.graph, "/images/fr-flag.png")).is_empty());
    }

    #[test]
    fn hidden_files_are_skipped() {
        let tmp = setup_fixtures();
        fs::write(tmp.path().join(".DS_Store"), "junk").unwrap();
        let site = scan(tmp.path()).unwrap();
        assert!(site.graph.node_by_locator("/.DS_Store").is_none());
    }

    #[test]
    fn unparseable_script_fails_the_scan() {
        let tmp = setup_fixtures();
        fs::write(tmp.path().join("js/broken.js"), "var = ;").unwrap();
        let err = scan(tmp.path()).unwrap_err();
        assert!(matches!(err, ScanError::Parse { .. }));
        assert!(err.to_string().contains("broken.js"));
    }

    #[test]
    fn locator_uses_forward_slashes() {
        assert_eq!(locator_for(Path::new("css/site.css")), "/css/site.css");
        assert_eq!(locator_for(Path::new("index.html")), "/index.html");
    }
}
