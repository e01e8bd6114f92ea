//! Locale fan-out.
//!
//! For every root page, the localizable closure is replicated once per
//! configured locale. Locales are processed one after another; within a pass
//! the closure's non-inline members are visited root first:
//!
//! 1. The member's locale variant locator is computed (`page.html` →
//!    `page.fr.html`).
//! 2. If a loaded node already lives there, references from this pass's
//!    localized nodes are moved onto it and nothing is copied.
//! 3. Otherwise the member is copied to that locator, taking over the
//!    placeholder a link to the variant may have left there. The pass's
//!    [`LocalizationContext`] rewrites the copy, and every inline node the
//!    copy embeds, before the copy's references are scanned.
//! 4. References from this pass's localized nodes are moved onto the copy.
//!
//! After all locales, originals nothing references any more are collected,
//! the root always among them.

use crate::closure::{LocalizableClosure, build_closure};
use crate::content::ContentKind;
use crate::graph::href::localized_locator;
use crate::graph::{ContentGraph, ContentNode, EdgeId, GraphError, NodeId};
use crate::i18n::Catalog;
use crate::locale::{LocaleError, LocaleRegistry};
use crate::rewrite::{LocalizationContext, LocalizeWarning};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum FanOutError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("{0}")]
    Locale(#[from] LocaleError),
    #[error("root {0} is not in the graph")]
    MissingRoot(String),
    #[error("structural inconsistency while localizing {locator} for {locale}: {source}")]
    StructuralInconsistency {
        locale: String,
        locator: String,
        source: GraphError,
    },
}

/// Which pages to fan out.
#[derive(Debug, Clone, PartialEq)]
pub enum RootSelector {
    /// Every loaded markup node marked as an entry point.
    Initial,
    /// The nodes at these locators.
    Locators(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanOutOptions {
    pub locales: Vec<String>,
    pub default_locale: Option<String>,
    /// Value substituted for `LOCALECOOKIENAME`. Left alone when unset.
    pub cookie_name: Option<String>,
}

/// What a fan-out changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanOutReport {
    /// `(locale, locator)` of every node copied.
    pub clones: Vec<(String, String)>,
    /// `(locale, locator)` of pre-existing variants that were linked to.
    pub reused: Vec<(String, String)>,
    /// Locators of originals removed afterwards.
    pub removed: Vec<String>,
    /// Roots with nothing to localize.
    pub skipped_roots: Vec<String>,
    pub warnings: Vec<LocalizeWarning>,
}

impl FanOutReport {
    pub fn clones_for(&self, locale: &str) -> impl Iterator<Item = &str> {
        self.clones
            .iter()
            .filter(move |(l, _)| l == locale)
            .map(|(_, url)| url.as_str())
    }
}

fn locator_of(graph: &ContentGraph, id: NodeId) -> String {
    graph
        .node(id)
        .map(|n| n.locator.to_string())
        .unwrap_or_else(|| id.to_string())
}

/// Edges into `target` made from a node localized in this pass.
fn edges_from_localized(graph: &ContentGraph, target: NodeId, ctx: &LocalizationContext<'_>) -> Vec<EdgeId> {
    graph
        .incoming(target)
        .iter()
        .copied()
        .filter(|e| {
            graph
                .edge(*e)
                .is_some_and(|edge| ctx.is_localized(graph.non_inline_ancestor(edge.from)))
        })
        .collect()
}

fn structural(locale: &str, locator: &str) -> impl FnOnce(GraphError) -> FanOutError {
    let locale = locale.to_string();
    let locator = locator.to_string();
    move |source| match source {
        GraphError::MissingAnchor { .. } | GraphError::UnknownEdge(_) => {
            FanOutError::StructuralInconsistency {
                locale,
                locator,
                source,
            }
        }
        other => FanOutError::Graph(other),
    }
}

/// Replicate `closure` for every locale in `registry`. Originals are left in
/// place; see [`collect_orphans`].
pub fn fan_out(
    graph: &mut ContentGraph,
    closure: &LocalizableClosure,
    registry: &LocaleRegistry,
    catalog: &Catalog,
    cookie_name: Option<&str>,
    report: &mut FanOutReport,
) -> Result<(), FanOutError> {
    for locale in registry.locales() {
        let mut ctx = LocalizationContext::new(catalog, registry, locale, cookie_name);
        info!(locale = %locale, root = %locator_of(graph, closure.root), "localizing");

        for &original in &closure.pre_order {
            let Some(url) = graph.node(original).and_then(|n| n.url()).map(str::to_string) else {
                continue;
            };
            let target = localized_locator(&url, locale);

            let existing = graph
                .node_by_locator(&target)
                .filter(|&id| graph.node(id).is_some_and(ContentNode::is_loaded));
            if let Some(existing) = existing {
                let repoint = edges_from_localized(graph, original, &ctx);
                for edge in repoint {
                    graph
                        .repoint_edge(edge, existing)
                        .map_err(structural(locale, &target))?;
                }
                debug!(locale = %locale, locator = %target, "reusing existing variant");
                ctx.reused.push(existing);
                let is_markup = graph
                    .node(existing)
                    .and_then(|n| n.content.as_ref())
                    .is_some_and(|c| c.kind() == ContentKind::Markup);
                if is_markup && ctx.primary_document.is_none() {
                    ctx.primary_document = Some(existing);
                }
                report.reused.push((locale.clone(), target));
                continue;
            }

            let repoint = edges_from_localized(graph, original, &ctx);
            let copy = graph
                .clone_node(original, &target, &repoint, &mut |g: &mut ContentGraph, id| {
                    ctx.localize_node(g, id)
                })
                .map_err(structural(locale, &target))?;
            debug!(locale = %locale, from = %url, to = %target, "cloned");
            ctx.replicas.push(copy);
            report.clones.push((locale.clone(), target));
        }

        report.warnings.append(&mut ctx.warnings);
    }
    Ok(())
}

/// Remove the root and every other non-inline closure member that no longer
/// has an incoming edge. Removing one can orphan another, so this repeats
/// until nothing changes.
pub fn collect_orphans(graph: &mut ContentGraph, closure: &LocalizableClosure) -> Result<Vec<String>, GraphError> {
    let mut removed = Vec::new();
    if graph.contains(closure.root) {
        removed.push(locator_of(graph, closure.root));
        graph.remove_node(closure.root)?;
    }
    loop {
        let orphans: Vec<NodeId> = closure
            .pre_order
            .iter()
            .copied()
            .filter(|&id| graph.node(id).is_some_and(|n| !n.is_inline()))
            .filter(|&id| graph.incoming(id).is_empty())
            .collect();
        if orphans.is_empty() {
            break;
        }
        for id in orphans {
            debug!(locator = %locator_of(graph, id), "removing orphan");
            removed.push(locator_of(graph, id));
            graph.remove_node(id)?;
        }
    }
    Ok(removed)
}

fn select_roots(
    graph: &ContentGraph,
    selector: &RootSelector,
    registry: &LocaleRegistry,
) -> Result<Vec<NodeId>, FanOutError> {
    let roots = match selector {
        RootSelector::Initial => graph.find_nodes(|_, n| {
            n.is_initial
                && !n.is_inline()
                && n.content.as_ref().is_some_and(|c| c.kind() == ContentKind::Markup)
        }),
        RootSelector::Locators(urls) => urls
            .iter()
            .map(|url| {
                graph
                    .node_by_locator(url)
                    .ok_or_else(|| FanOutError::MissingRoot(url.clone()))
            })
            .collect::<Result<_, _>>()?,
    };

    // A root that is already some other root's locale variant is not a page
    // of its own.
    let urls: BTreeSet<String> = roots
        .iter()
        .filter_map(|id| graph.node(*id).and_then(|n| n.url()).map(str::to_string))
        .collect();
    let variants: BTreeSet<String> = urls
        .iter()
        .flat_map(|url| {
            registry
                .locales()
                .iter()
                .map(move |locale| localized_locator(url, locale))
        })
        .collect();
    Ok(roots
        .into_iter()
        .filter(|id| {
            graph
                .node(*id)
                .and_then(|n| n.url())
                .is_none_or(|url| !variants.contains(url))
        })
        .collect())
}

/// Fan out every selected root and collect the originals left behind.
pub fn fan_out_locales(
    graph: &mut ContentGraph,
    catalog: &Catalog,
    selector: &RootSelector,
    options: &FanOutOptions,
) -> Result<FanOutReport, FanOutError> {
    let registry = LocaleRegistry::new(&options.locales, options.default_locale.as_deref())?;
    let mut report = FanOutReport::default();
    if registry.is_empty() {
        return Ok(report);
    }

    for root in select_roots(graph, selector, &registry)? {
        if !graph.contains(root) {
            continue;
        }
        let closure = build_closure(graph, root);
        if closure.pre_order.is_empty() {
            report.skipped_roots.push(locator_of(graph, root));
            continue;
        }
        fan_out(
            graph,
            &closure,
            &registry,
            catalog,
            options.cookie_name.as_deref(),
            &mut report,
        )?;
        report.removed.extend(collect_orphans(graph, &closure)?);
    }

    info!(
        clones = report.clones.len(),
        reused = report.reused.len(),
        removed = report.removed.len(),
        warnings = report.warnings.len(),
        "fan-out complete"
    );
    Ok(report)
}
