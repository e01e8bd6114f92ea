//! Localizability classification.
//!
//! Decides, per content kind, whether a single node's own content differs
//! between locales. Classification never mutates and never looks past the
//! node itself; propagation through references is the closure builder's job.
//!
//! | Kind | Locale-sensitive when |
//! |------|-----------------------|
//! | Script | reads a locale global or calls `TR`/`TRPAT`, and is not only loaded by the bootstrapper |
//! | Markup | has an i18n directive with a key |
//! | Style | has a rule conditional on `html[lang…]` |
//! | Other | never |

use crate::content::Content;
use crate::content::script::{Expr, is_assignment_target};
use crate::content::style::Stylesheet;
use crate::graph::{ContentGraph, NodeId, RelationKind};
use regex::Regex;
use std::sync::LazyLock;

/// Script globals whose value depends on the locale being built.
pub const LOCALE_GLOBALS: &[&str] = &[
    "LOCALEID",
    "SUPPORTEDLOCALEIDS",
    "DEFAULTLOCALEID",
    "LOCALECOOKIENAME",
];

/// Translation call: `TR("key")` or `TR("key", fallback)`.
pub const TRANSLATE_FN: &str = "TR";
/// Pattern translation call: `TRPAT("key")` yields a formatting function.
pub const TRANSLATE_PATTERN_FN: &str = "TRPAT";

/// An `html[lang…]` condition at the start of a selector or of one of its
/// comma-separated fragments.
pub(crate) static LANG_SELECTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|,)\s*html\[\s*lang\s*(?:=|\|=|~=)\s*(?:"[^"]*"|'[^']*'|[^\]\s'"]*)\s*\]"#)
        .expect("static regex")
});

pub fn is_translation_call(expr: &Expr) -> bool {
    matches!(
        expr.called_name(),
        Some(TRANSLATE_FN | TRANSLATE_PATTERN_FN)
    )
}

/// Whether any rule in `sheet` is conditional on the document language.
pub fn has_lang_conditional_rule(sheet: &Stylesheet) -> bool {
    sheet
        .rules()
        .iter()
        .any(|rule| LANG_SELECTOR.is_match(&rule.selector))
}

/// Whether `id` only arrives through the bootstrapper (and so runs before
/// any locale is known). A node nothing references is not bootstrap-only.
pub fn is_bootstrap_only(graph: &ContentGraph, id: NodeId) -> bool {
    let incoming = graph.incoming(id);
    !incoming.is_empty()
        && incoming
            .iter()
            .filter_map(|e| graph.edge(*e))
            .all(|e| e.kind == RelationKind::Bootstrap)
}

/// Whether the node's own content needs a per-locale copy.
pub fn needs_localization(graph: &ContentGraph, id: NodeId) -> bool {
    let Some(content) = graph.node(id).and_then(|n| n.content.as_ref()) else {
        return false;
    };
    match content {
        Content::Script(program) => {
            if graph.incoming(id).is_empty() || is_bootstrap_only(graph, id) {
                return false;
            }
            program.any_expr(&mut |expr, slots| match expr {
                Expr::Ident(name) => {
                    LOCALE_GLOBALS.contains(&name.as_str()) && !is_assignment_target(slots)
                }
                call => is_translation_call(call),
            })
        }
        Content::Markup(doc) => doc.i18n_directives().iter().any(|d| d.key().is_some()),
        Content::Style(sheet) => has_lang_conditional_rule(sheet),
        Content::Opaque(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    fn classify_script(src: &str) -> bool {
        let mut graph = ContentGraph::new();
        let page = add_markup(&mut graph, "/index.html", r#"<script src="app.js"></script>"#);
        let script = add_script(&mut graph, "/app.js", src);
        graph.populate(page).unwrap();
        needs_localization(&graph, script)
    }

    #[test]
    fn script_reading_locale_global() {
        assert!(classify_script("var l = LOCALEID;"));
        assert!(classify_script("setup(SUPPORTEDLOCALEIDS, DEFAULTLOCALEID);"));
        assert!(classify_script("document.cookie = LOCALECOOKIENAME + '=x';"));
    }

    #[test]
    fn script_assigning_locale_global_is_not_sensitive() {
        assert!(!classify_script("LOCALEID = 'en';"));
        assert!(!classify_script("LOCALEID.x = 1;"));
        assert!(!classify_script("var LOCALEID = 'en';"));
    }

    #[test]
    fn script_calling_translation() {
        assert!(classify_script("alert(TR('greeting'));"));
        assert!(classify_script("var f = function () { return TRPAT('n'); };"));
        assert!(!classify_script("alert(window.TR('greeting'));"));
        assert!(!classify_script("alert('plain');"));
    }

    #[test]
    fn bootstrap_only_script_is_excluded() {
        let mut graph = ContentGraph::new();
        let page = add_markup(
            &mut graph,
            "/index.html",
            r#"<script id="bootstrapper" src="boot.js"></script>"#,
        );
        let boot = add_script(&mut graph, "/boot.js", "var l = LOCALEID;");
        graph.populate(page).unwrap();
        assert!(is_bootstrap_only(&graph, boot));
        assert!(!needs_localization(&graph, boot));
    }

    #[test]
    fn unreferenced_script_is_not_sensitive() {
        let mut graph = ContentGraph::new();
        let script = add_script(&mut graph, "/app.js", "TR('x');");
        assert!(!needs_localization(&graph, script));
    }

    #[test]
    fn markup_with_keyed_directive() {
        let mut graph = ContentGraph::new();
        let keyed = add_markup(&mut graph, "/a.html", r#"<h1 data-i18n="title">T</h1>"#);
        let empty = add_markup(&mut graph, "/b.html", r#"<h1 data-i18n="">T</h1>"#);
        let plain = add_markup(&mut graph, "/c.html", "<h1>T</h1>");
        assert!(needs_localization(&graph, keyed));
        assert!(!needs_localization(&graph, empty));
        assert!(!needs_localization(&graph, plain));
    }

    #[test]
    fn style_lang_selector_variants() {
        for css in [
            r#"html[lang="fr"] .x { color: red }"#,
            "html[lang|=fr] .x { color: red }",
            "HTML[ lang ~= 'fr' ] .x { color: red }",
            r#".a, html[lang="da"] .b { color: red }"#,
            "@media print { html[lang=en] p { color: red } }",
        ] {
            let sheet = Stylesheet::parse(css).unwrap();
            assert!(has_lang_conditional_rule(&sheet), "{css}");
        }
    }

    #[test]
    fn style_without_lang_condition() {
        for css in [
            ".x { color: red }",
            "body[lang=fr] .x { color: red }",
            ".a html[lang=fr] { color: red }",
            "html[data-lang=fr] { color: red }",
        ] {
            let sheet = Stylesheet::parse(css).unwrap();
            assert!(!has_lang_conditional_rule(&sheet), "{css}");
        }
    }

    #[test]
    fn opaque_and_unloaded_are_never_sensitive() {
        let mut graph = ContentGraph::new();
        let page = add_markup(&mut graph, "/index.html", r#"<img src="a.png">"#);
        graph.populate(page).unwrap();
        let image = graph.node_by_locator("/a.png").unwrap();
        assert!(!needs_localization(&graph, image));
    }
}
