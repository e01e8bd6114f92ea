//! Build pipeline.
//!
//! ```text
//! 1. Scan     site/   →  content graph + catalog + config
//! 2. FanOut   graph   →  graph with per-locale pages     (only with [i18n] locales)
//! 3. Emit     graph   →  out/ + build-manifest.json
//! ```
//!
//! Stages run in order and the first failure aborts the rest.

use crate::closure::{LocalizableClosure, build_closure};
use crate::emit::{self, EmitError, EmitSummary};
use crate::fanout::{self, FanOutError, FanOutReport, RootSelector};
use crate::graph::ContentGraph;
use crate::scan::{self, ScanError, ScannedSite};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("locale fan-out failed: {0}")]
    FanOut(#[from] FanOutError),
    #[error("emit failed: {0}")]
    Emit(#[from] EmitError),
}

/// Outcome of a full build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    /// Locators of the entry points the scan found.
    pub roots: Vec<String>,
    /// Nodes in the graph after scanning.
    pub scanned_nodes: usize,
    /// `None` when no locales are configured.
    pub fan_out: Option<FanOutReport>,
    pub emit: EmitSummary,
}

/// One entry point's localizable closure, as locators.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosureSummary {
    pub root: String,
    /// Non-inline members, root first.
    pub pre_order: Vec<String>,
    /// Inline members included.
    pub member_count: usize,
}

/// Result of `check`: what a build would localize, without writing anything.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub scanned_nodes: usize,
    pub locales: Vec<String>,
    pub closures: Vec<ClosureSummary>,
}

fn root_locators(site: &ScannedSite) -> Vec<String> {
    site.roots
        .iter()
        .filter_map(|id| site.graph.node(*id).and_then(|n| n.url()).map(str::to_string))
        .collect()
}

fn summarize(graph: &ContentGraph, closure: &LocalizableClosure) -> ClosureSummary {
    let url = |id| {
        graph
            .node(id)
            .map(|n| n.locator.to_string())
            .unwrap_or_default()
    };
    ClosureSummary {
        root: url(closure.root),
        pre_order: closure.pre_order.iter().map(|&id| url(id)).collect(),
        member_count: closure.members.len(),
    }
}

/// Scan `source` and report each entry point's localizable closure.
pub fn check(source: &Path) -> Result<CheckReport, PipelineError> {
    let site = scan::scan(source)?;
    let closures = site
        .roots
        .iter()
        .map(|&root| summarize(&site.graph, &build_closure(&site.graph, root)))
        .collect();
    Ok(CheckReport {
        scanned_nodes: site.graph.node_count(),
        locales: site.config.i18n.locales.clone(),
        closures,
    })
}

/// Run Scan → FanOut → Emit from `source` into `output`.
pub fn build(source: &Path, output: &Path) -> Result<BuildReport, PipelineError> {
    info!(source = %source.display(), "stage 1: scan");
    let mut site = scan::scan(source)?;
    let roots = root_locators(&site);
    let scanned_nodes = site.graph.node_count();

    let fan_out = if site.config.fan_out_enabled() {
        info!(locales = ?site.config.i18n.locales, "stage 2: locale fan-out");
        Some(fanout::fan_out_locales(
            &mut site.graph,
            &site.catalog,
            &RootSelector::Initial,
            &site.config.fan_out_options(),
        )?)
    } else {
        info!("stage 2: locale fan-out skipped, no locales configured");
        None
    };

    info!(output = %output.display(), "stage 3: emit");
    let emit = emit::write_site(&mut site.graph, output, site.config.build.manifest)?;

    Ok(BuildReport {
        roots,
        scanned_nodes,
        fan_out,
        emit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_FILE;
    use crate::emit::{BuildManifest, MANIFEST_FILENAME};
    use crate::test_helpers::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn build_writes_localized_site() {
        let site = setup_fixtures();
        let out = TempDir::new().unwrap();

        let report = build(site.path(), out.path()).unwrap();

        let fan_out = report.fan_out.unwrap();
        assert_eq!(
            fan_out.clones_for("fr").collect::<Vec<_>>(),
            vec!["/index.fr.html", "/css/site.fr.css", "/js/app.fr.js"]
        );
        assert_eq!(fan_out.skipped_roots, vec!["/about.html"]);

        for path in ["index.en.html", "index.fr.html", "js/app.en.js", "css/site.fr.css", "about.html", "js/boot.js"] {
            assert!(out.path().join(path).exists(), "{path}");
        }
        for path in ["index.html", "js/app.js", "css/site.css"] {
            assert!(!out.path().join(path).exists(), "{path} should be gone");
        }

        let index_fr = fs::read_to_string(out.path().join("index.fr.html")).unwrap();
        assert!(index_fr.contains(r#"<html lang="fr">"#));
        assert!(index_fr.contains("<h1>Bienvenue</h1>"));
        assert!(index_fr.contains(r#"alt="Logo de la société""#));
        assert!(index_fr.contains(r#"href="css/site.fr.css""#));
        assert!(index_fr.contains(r#"src="js/app.fr.js""#));
        assert!(index_fr.contains(r#"src="js/boot.js""#), "bootstrapper is shared");
        assert!(index_fr.contains(r#"window.locale = "fr";"#));

        let app_en = fs::read_to_string(out.path().join("js/app.en.js")).unwrap();
        assert!(app_en.contains(r#"var greeting = "Hello";"#));

        let css_fr = fs::read_to_string(out.path().join("css/site.fr.css")).unwrap();
        assert!(css_fr.contains(".banner {\n  background: url(../images/fr-flag.png);"));
        let css_en = fs::read_to_string(out.path().join("css/site.en.css")).unwrap();
        assert!(!css_en.contains("fr-flag"));
    }

    #[test]
    fn build_writes_manifest_for_every_file() {
        let site = setup_fixtures();
        let out = TempDir::new().unwrap();
        let report = build(site.path(), out.path()).unwrap();

        let manifest = BuildManifest::load(out.path()).unwrap();
        assert_eq!(manifest.files.len(), report.emit.files_written);
        assert!(manifest.files.contains_key("/index.fr.html"));
        assert!(out.path().join(MANIFEST_FILENAME).exists());
    }

    #[test]
    fn build_without_locales_copies_site() {
        let site = setup_fixtures();
        fs::write(site.path().join(CONFIG_FILE), "[build]\nmanifest = false\n").unwrap();
        let out = TempDir::new().unwrap();

        let report = build(site.path(), out.path()).unwrap();

        assert!(report.fan_out.is_none());
        assert!(out.path().join("index.html").exists());
        assert!(!out.path().join("index.fr.html").exists());
        assert!(!out.path().join(MANIFEST_FILENAME).exists());
    }

    #[test]
    fn scan_failure_aborts_before_output() {
        let site = setup_fixtures();
        fs::write(site.path().join(CONFIG_FILE), "[i18n]\nlocales = [\"??\"]\n").unwrap();
        let out = TempDir::new().unwrap();
        let target = out.path().join("dist");

        let err = build(site.path(), &target).unwrap_err();

        assert!(matches!(err, PipelineError::Scan(_)));
        assert!(!target.exists());
    }

    #[test]
    fn check_reports_closures() {
        let site = setup_fixtures();
        let report = check(site.path()).unwrap();
        assert_eq!(report.locales, vec!["en", "fr"]);

        let index = report
            .closures
            .iter()
            .find(|c| c.root == "/index.html")
            .unwrap();
        assert_eq!(index.pre_order, vec!["/index.html", "/css/site.css", "/js/app.js"]);
        assert!(index.member_count > index.pre_order.len(), "inline script counted");

        let about = report.closures.iter().find(|c| c.root == "/about.html").unwrap();
        assert!(about.pre_order.is_empty());
    }
}
