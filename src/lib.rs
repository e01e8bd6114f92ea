//! # sitegraph
//!
//! A build-time pipeline over a static site's content-dependency graph. Pages,
//! stylesheets and scripts are parsed into nodes, linked by the references
//! they make to each other, and then fanned out once per configured locale:
//! every page and every asset whose content depends on the locale is copied
//! and rewritten, everything else stays shared.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Scan     site/   →  content graph     (files → parsed nodes + reference edges)
//! 2. FanOut   graph   →  localized graph   (per-locale copies, originals collected)
//! 3. Emit     graph   →  dist/             (serialized files + build-manifest.json)
//! ```
//!
//! Fan-out only runs when `[i18n] locales` is set in `sitegraph.toml`.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Stage 1: walks the site directory, parses files and links them into a graph |
//! | [`fanout`] | Stage 2: replicates each entry point's localizable closure per locale, collects orphans |
//! | [`emit`] | Stage 3: writes every loaded node and the build manifest |
//! | [`pipeline`] | Runs the stages in order; `check` reports closures without writing |
//! | [`graph`] | In-memory node/edge arena: traversal, population, cloning, repointing |
//! | [`content`] | Markup, style and script representations with their parsers and printers |
//! | [`classify`] | Decides whether a single node's own content is locale-sensitive |
//! | [`closure`] | Transitive localizable closure of a root, in root-first order |
//! | [`rewrite`] | Per-locale rewriting of scripts, markup and style rules |
//! | [`locale`] | Locale id normalization, registry and fallback chains |
//! | [`i18n`] | Translation catalog (`*.i18n` files) and per-locale lookup |
//! | [`config`] | `sitegraph.toml` loading, stock defaults, validation |
//! | [`output`] | CLI output formatting of pipeline reports |
//!
//! # Design Decisions
//!
//! ## Locale Variants by Locator
//!
//! A locale copy of `/css/site.css` lives at `/css/site.fr.css`. Fan-out
//! checks that locator before copying, so a hand-written `page.fr.html` wins
//! over a generated one and a second run reuses the first run's output instead
//! of duplicating it.
//!
//! ## Explicit Insertion Callback
//!
//! The per-locale rewrite is handed to [`graph::ContentGraph::clone_node`] as a
//! closure for the duration of one copy. There is no listener registry to
//! forget to clean up, and one locale's context can never rewrite another
//! locale's nodes.
//!
//! ## Style Rules Compiled Against the Page
//!
//! A rule like `html[lang|="fr"] .banner` is resolved per locale by asking
//! the already-localized page which `lang` values it carries. Matching
//! selectors lose the condition; a rule with no matching selector is deleted
//! together with inline resources only it referenced.

pub mod classify;
pub mod closure;
pub mod config;
pub mod content;
pub mod emit;
pub mod fanout;
pub mod graph;
pub mod i18n;
pub mod locale;
pub mod output;
pub mod pipeline;
pub mod rewrite;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_helpers;
