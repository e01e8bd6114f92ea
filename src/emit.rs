//! Site output.
//!
//! Final stage of the build pipeline. Every loaded node with a URL is
//! serialized (inline edits included) and written under the output directory
//! at its locator. Placeholders for references that never resolved to a file
//! are skipped.
//!
//! ## Build manifest
//!
//! Optionally writes `build-manifest.json` next to the output:
//!
//! ```json
//! {
//!   "version": 1,
//!   "files": {
//!     "/index.fr.html": "5f2b…",
//!     "/js/app.fr.js": "a91c…"
//!   }
//! }
//! ```
//!
//! Hashes are SHA-256 of the written bytes, so deploy tooling can diff two
//! builds without reading the files.

use crate::graph::{ContentGraph, GraphError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the build manifest within the output directory.
pub const MANIFEST_FILENAME: &str = "build-manifest.json";

/// Version of the manifest format.
const MANIFEST_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("Locator escapes the output directory: {0}")]
    UnsafeLocator(String),
}

/// Locator → SHA-256 of every written file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub version: u32,
    pub files: BTreeMap<String, String>,
}

impl BuildManifest {
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION,
            files: BTreeMap::new(),
        }
    }

    pub fn load(output_dir: &Path) -> Result<Self, EmitError> {
        let content = fs::read_to_string(output_dir.join(MANIFEST_FILENAME))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, output_dir: &Path) -> Result<PathBuf, EmitError> {
        let path = output_dir.join(MANIFEST_FILENAME);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}

impl Default for BuildManifest {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 of `bytes` as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// What [`write_site`] produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmitSummary {
    pub files_written: usize,
    pub bytes_written: u64,
    pub manifest: Option<PathBuf>,
}

/// Output path for `url` under `output_dir`. Rejects locators that would
/// leave it.
fn output_path(output_dir: &Path, url: &str) -> Result<PathBuf, EmitError> {
    let relative = Path::new(url.trim_start_matches('/'));
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !safe || relative.as_os_str().is_empty() {
        return Err(EmitError::UnsafeLocator(url.to_string()));
    }
    Ok(output_dir.join(relative))
}

pub fn write_site(graph: &mut ContentGraph, output_dir: &Path, with_manifest: bool) -> Result<EmitSummary, EmitError> {
    let mut targets: Vec<_> = graph
        .nodes()
        .filter(|(_, n)| n.is_loaded())
        .filter_map(|(id, n)| n.url().map(|url| (id, url.to_string())))
        .collect();
    targets.sort_by(|a, b| a.1.cmp(&b.1));

    fs::create_dir_all(output_dir)?;
    let mut manifest = BuildManifest::new();
    let mut summary = EmitSummary::default();
    for (id, url) in targets {
        let path = output_path(output_dir, &url)?;
        let bytes = graph.serialize(id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &bytes)?;
        debug!(locator = %url, bytes = bytes.len(), "wrote");
        summary.files_written += 1;
        summary.bytes_written += bytes.len() as u64;
        manifest.files.insert(url, hash_bytes(&bytes));
    }

    if with_manifest {
        summary.manifest = Some(manifest.save(output_dir)?);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ContentNode;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    #[test]
    fn writes_loaded_nodes_at_their_locators() {
        let tmp = TempDir::new().unwrap();
        let mut graph = ContentGraph::new();
        let page = add_markup(&mut graph, "/index.html", r#"<script src="js/app.js"></script><img src="missing.png">"#);
        add_script(&mut graph, "/js/app.js", "go();");
        graph.populate(page).unwrap();

        let summary = write_site(&mut graph, tmp.path(), false).unwrap();

        assert_eq!(summary.files_written, 2);
        assert_eq!(fs::read_to_string(tmp.path().join("js/app.js")).unwrap(), "go();\n");
        assert!(tmp.path().join("index.html").exists());
        assert!(!tmp.path().join("missing.png").exists(), "placeholder");
        assert!(!tmp.path().join(MANIFEST_FILENAME).exists());
    }

    #[test]
    fn inline_edits_are_written_into_container() {
        let tmp = TempDir::new().unwrap();
        let mut graph = ContentGraph::new();
        let page = add_markup(&mut graph, "/index.html", "<script>var a = 1</script>");
        graph.populate(page).unwrap();

        write_site(&mut graph, tmp.path(), false).unwrap();

        assert_eq!(
            fs::read_to_string(tmp.path().join("index.html")).unwrap(),
            "<script>var a = 1;\n</script>"
        );
    }

    #[test]
    fn manifest_hashes_written_bytes() {
        let tmp = TempDir::new().unwrap();
        let mut graph = ContentGraph::new();
        graph
            .add_node(ContentNode::loaded(
                "/a.txt",
                crate::content::Content::Opaque(b"hello".to_vec()),
            ))
            .unwrap();

        let summary = write_site(&mut graph, tmp.path(), true).unwrap();

        assert_eq!(summary.manifest, Some(tmp.path().join(MANIFEST_FILENAME)));
        let manifest = BuildManifest::load(tmp.path()).unwrap();
        assert_eq!(manifest.version, 1);
        assert_eq!(
            manifest.files["/a.txt"],
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn rejects_escaping_locators() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            output_path(tmp.path(), "/../etc/passwd"),
            Err(EmitError::UnsafeLocator(_))
        ));
        assert!(output_path(tmp.path(), "/css/site.css").is_ok());
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_bytes(b"x"), hash_bytes(b"x"));
        assert_ne!(hash_bytes(b"x"), hash_bytes(b"y"));
    }
}
