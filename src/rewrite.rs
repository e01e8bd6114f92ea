//! Per-locale rewriting.
//!
//! A [`LocalizationContext`] is built once per locale pass and handed to the
//! graph as the insertion callback, so every node copied during the pass is
//! rewritten before its references are scanned. Each content kind has its own
//! strategy:
//!
//! - **Script**: `TR("key")` becomes the translated literal, `TRPAT("key")` a
//!   formatting function, and reads of the locale globals become literals.
//! - **Markup**: i18n directives are replaced by their translations and the
//!   document element's `lang` is set.
//! - **Style**: rules conditional on `html[lang…]` are compiled against the
//!   pass's primary document: matching fragments lose the condition,
//!   non-matching ones are dropped, and a rule with nothing left is deleted.
//!
//! A key with no translation anywhere along the fallback chain leaves the
//! original token in place and is recorded as a [`LocalizeWarning`].

use crate::classify::{LANG_SELECTOR, TRANSLATE_FN, TRANSLATE_PATTERN_FN, is_bootstrap_only};
use crate::content::{Content, ContentKind};
use crate::content::markup::{Document, DomNode, I18nDirective, escape_text};
use crate::content::script::{Expr, Function, Slot, Stmt, is_assignment_target};
use crate::content::style::RuleId;
use crate::graph::{Anchor, ContentGraph, GraphError, NodeId};
use crate::i18n::{Catalog, Resolution, TranslationLookup};
use crate::locale::LocaleRegistry;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// One `html[lang…]` fragment: operator, quoted or bare value, remainder.
static LANG_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^\s*html\[\s*lang\s*(=|\|=|~=)\s*(?:"([^"]*)"|'([^']*)'|([^\]\s'"]*))\s*\](.*)$"#,
    )
    .expect("static regex")
});

static LANG_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*html\[\s*lang\b").expect("static regex"));

/// Something the pass could not do but recovered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalizeWarning {
    UnresolvedTranslation {
        locale: String,
        key: String,
        node: String,
    },
    MalformedSelector {
        locale: String,
        selector: String,
        node: String,
    },
}

impl fmt::Display for LocalizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalizeWarning::UnresolvedTranslation { locale, key, node } => {
                write!(f, "[{locale}] no translation for {key:?} in {node}")
            }
            LocalizeWarning::MalformedSelector {
                locale,
                selector,
                node,
            } => write!(f, "[{locale}] kept malformed selector {selector:?} in {node}"),
        }
    }
}

/// State for one locale pass.
pub struct LocalizationContext<'a> {
    locale: String,
    lookup: TranslationLookup<'a>,
    globals: BTreeMap<&'static str, Value>,
    /// Copies made in this pass, in creation order.
    pub replicas: Vec<NodeId>,
    /// Pre-existing locale variants this pass linked to instead of copying.
    pub reused: Vec<NodeId>,
    /// First markup localized in this pass; style rules are compiled
    /// against its `lang` values.
    pub primary_document: Option<NodeId>,
    pub warnings: Vec<LocalizeWarning>,
}

impl<'a> LocalizationContext<'a> {
    pub fn new(
        catalog: &'a Catalog,
        registry: &LocaleRegistry,
        locale: &str,
        cookie_name: Option<&str>,
    ) -> Self {
        let mut globals = BTreeMap::new();
        globals.insert("LOCALEID", Value::from(locale));
        globals.insert(
            "SUPPORTEDLOCALEIDS",
            Value::from(registry.locales().to_vec()),
        );
        globals.insert("DEFAULTLOCALEID", Value::from(registry.default_locale()));
        if let Some(cookie) = cookie_name {
            globals.insert("LOCALECOOKIENAME", Value::from(cookie));
        }
        Self {
            locale: locale.to_string(),
            lookup: TranslationLookup::new(catalog, registry, locale),
            globals,
            replicas: Vec::new(),
            reused: Vec::new(),
            primary_document: None,
            warnings: Vec::new(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Whether `id` was produced or adopted by this pass.
    pub fn is_localized(&self, id: NodeId) -> bool {
        self.replicas.contains(&id) || self.reused.contains(&id)
    }

    /// Rewrite a freshly inserted node for this pass's locale.
    pub fn localize_node(&mut self, graph: &mut ContentGraph, id: NodeId) -> Result<(), GraphError> {
        let Some(node) = graph.node(id) else {
            return Err(GraphError::UnknownNode(id));
        };
        let is_inline = node.is_inline();
        match node.content.as_ref().map(Content::kind) {
            Some(ContentKind::Script) => self.localize_script(graph, id),
            Some(ContentKind::Markup) => {
                self.localize_markup(graph, id)?;
                if self.primary_document.is_none() && !is_inline {
                    self.primary_document = Some(id);
                }
                Ok(())
            }
            Some(ContentKind::Style) => self.localize_style(graph, id),
            Some(ContentKind::Other) | None => Ok(()),
        }
    }

    fn describe(graph: &ContentGraph, id: NodeId) -> String {
        let owner = graph.non_inline_ancestor(id);
        let url = graph
            .node(owner)
            .map(|n| n.locator.to_string())
            .unwrap_or_default();
        if owner == id { url } else { format!("{url} (inline)") }
    }

    fn unresolved(&mut self, key: &str, node: &str) {
        warn!(locale = %self.locale, key, node, "no translation");
        self.warnings.push(LocalizeWarning::UnresolvedTranslation {
            locale: self.locale.clone(),
            key: key.to_string(),
            node: node.to_string(),
        });
    }

    // ------------------------------------------------------------------
    // Script
    // ------------------------------------------------------------------

    fn localize_script(&mut self, graph: &mut ContentGraph, id: NodeId) -> Result<(), GraphError> {
        if is_bootstrap_only(graph, id) {
            return Ok(());
        }
        let description = Self::describe(graph, id);
        let Some(Content::Script(program)) = graph.node_mut(id).and_then(|n| n.content.as_mut())
        else {
            return Ok(());
        };

        let lookup = &self.lookup;
        let globals = &self.globals;
        let mut missing = Vec::new();
        let replaced = program.replace_exprs(&mut |expr, slots| {
            localize_expr(expr, slots, lookup, globals, &mut missing)
        });
        debug!(node = %description, replaced, "localized script");
        for key in missing {
            self.unresolved(&key, &description);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Markup
    // ------------------------------------------------------------------

    fn localize_markup(&mut self, graph: &mut ContentGraph, id: NodeId) -> Result<(), GraphError> {
        let description = Self::describe(graph, id);
        let Some(Content::Markup(doc)) = graph.node_mut(id).and_then(|n| n.content.as_mut()) else {
            return Ok(());
        };

        let mut missing = Vec::new();
        let mut unresolved_attrs = Vec::new();
        let mut attr_elements = Vec::new();
        for directive in doc.i18n_directives() {
            let Some(key) = directive.key().map(str::to_string) else {
                continue;
            };
            let value = match self.lookup.resolve(&key) {
                Resolution::Missing => {
                    missing.push(key);
                    if let I18nDirective::Attribute { id, .. } = directive {
                        unresolved_attrs.push(id);
                    }
                    continue;
                }
                resolved => resolved.value().cloned().unwrap_or(Value::Null),
            };
            match directive {
                I18nDirective::Element { id: el, .. } => {
                    doc.replace_with(el, &markup_fragment(&value));
                }
                I18nDirective::Contents { id: el, .. } => {
                    doc.replace_children_with(el, &markup_fragment(&value));
                    doc.remove_attribute(el, "data-i18n");
                }
                I18nDirective::Attribute {
                    id: el, attribute, ..
                } => {
                    doc.set_attribute(el, &attribute, &plain_text(&value));
                    attr_elements.push(el);
                }
            }
        }
        for el in attr_elements {
            if !unresolved_attrs.contains(&el) {
                doc.remove_attribute(el, "data-i18n-attr");
            }
        }
        if let Some(root) = doc.document_element() {
            doc.set_attribute(root, "lang", &self.locale);
        }
        debug!(node = %description, locale = %self.locale, "localized markup");
        for key in missing {
            self.unresolved(&key, &description);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Style
    // ------------------------------------------------------------------

    /// `lang` values the pass's primary document carries. Without a primary
    /// document the locale itself stands in.
    fn lang_oracle(&self, graph: &ContentGraph) -> Vec<String> {
        match self
            .primary_document
            .and_then(|p| graph.node(p))
            .and_then(|n| n.content.as_ref())
        {
            Some(Content::Markup(doc)) => doc.lang_values(),
            _ => vec![self.locale.clone()],
        }
    }

    fn localize_style(&mut self, graph: &mut ContentGraph, id: NodeId) -> Result<(), GraphError> {
        let oracle = self.lang_oracle(graph);
        let description = Self::describe(graph, id);
        let Some(Content::Style(sheet)) = graph.node_mut(id).and_then(|n| n.content.as_mut()) else {
            return Ok(());
        };

        let mut deleted: Vec<RuleId> = Vec::new();
        let mut malformed = Vec::new();
        let rule_ids: Vec<RuleId> = sheet.rules().iter().map(|r| r.id).collect();
        for rule_id in rule_ids.into_iter().rev() {
            let Some(rule) = sheet.rule_mut(rule_id) else {
                continue;
            };
            if !LANG_SELECTOR.is_match(&rule.selector) {
                continue;
            }
            let compiled = compile_selector(&rule.selector, &oracle);
            malformed.extend(compiled.malformed);
            match compiled.selector {
                Some(selector) => rule.selector = selector,
                None => {
                    sheet.remove_rule(rule_id);
                    deleted.push(rule_id);
                }
            }
        }

        for rule_id in &deleted {
            let anchored: Vec<_> = graph
                .outgoing(id)
                .iter()
                .copied()
                .filter(|e| {
                    graph
                        .edge(*e)
                        .is_some_and(|edge| edge.anchor == Anchor::Rule(*rule_id))
                })
                .collect();
            for edge_id in anchored {
                if let Some(edge) = graph.remove_edge(edge_id)
                    && graph.node(edge.to).is_some_and(|n| n.container == Some(id))
                {
                    graph.remove_node(edge.to)?;
                }
            }
        }
        debug!(node = %description, deleted = deleted.len(), "compiled style");
        for selector in malformed {
            warn!(locale = %self.locale, selector = %selector, node = %description, "malformed lang selector");
            self.warnings.push(LocalizeWarning::MalformedSelector {
                locale: self.locale.clone(),
                selector,
                node: description.clone(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Script helpers
// ============================================================================

fn localize_expr(
    expr: &Expr,
    slots: &[Slot],
    lookup: &TranslationLookup<'_>,
    globals: &BTreeMap<&'static str, Value>,
    missing: &mut Vec<String>,
) -> Option<Expr> {
    match expr {
        Expr::Call { args, .. } => {
            let name = expr.called_name()?;
            if name != TRANSLATE_FN && name != TRANSLATE_PATTERN_FN {
                return None;
            }
            let Some(Expr::Str(key)) = args.first() else {
                return None;
            };
            match lookup.resolve(key).value() {
                Some(value) if name == TRANSLATE_PATTERN_FN => Some(pattern_function(value)),
                Some(value) => Some(Expr::from_json(value)),
                None => {
                    missing.push(key.clone());
                    None
                }
            }
        }
        Expr::Ident(name) if !is_assignment_target(slots) => {
            globals.get(name.as_str()).map(Expr::from_json)
        }
        _ => None,
    }
}

/// `"Hi {0}, {1} new"` becomes `function (a0, a1) { return "Hi " + a0 + ", " + a1 + " new"; }`.
fn pattern_function(value: &Value) -> Expr {
    let Value::String(pattern) = value else {
        return Expr::Function(Box::new(Function {
            name: None,
            params: Vec::new(),
            body: vec![Stmt::Return(Some(Expr::from_json(value)))],
        }));
    };

    let mut parts: Vec<Expr> = Vec::new();
    let mut literal = String::new();
    let mut arity = 0;
    let mut rest = pattern.as_str();
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let digits = after.chars().take_while(char::is_ascii_digit).count();
        let index = after[..digits].parse::<usize>().ok();
        match index {
            Some(index) if after[digits..].starts_with('}') => {
                literal.push_str(&rest[..open]);
                parts.push(Expr::Str(std::mem::take(&mut literal)));
                parts.push(Expr::Ident(format!("a{index}")));
                arity = arity.max(index + 1);
                rest = &after[digits + 1..];
            }
            _ => {
                literal.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }
    literal.push_str(rest);
    parts.push(Expr::Str(literal));

    // Drop empty literals, keeping the first so `+` stays string
    // concatenation.
    let mut parts = parts
        .into_iter()
        .enumerate()
        .filter(|(i, part)| *i == 0 || !matches!(part, Expr::Str(s) if s.is_empty()))
        .map(|(_, part)| part);
    let first = parts.next().unwrap_or(Expr::Str(String::new()));
    let body = parts.fold(first, |left, right| Expr::Binary {
        op: "+".into(),
        left: Box::new(left),
        right: Box::new(right),
    });

    Expr::Function(Box::new(Function {
        name: None,
        params: (0..arity).map(|i| format!("a{i}")).collect(),
        body: vec![Stmt::Return(Some(body))],
    }))
}

// ============================================================================
// Markup helpers
// ============================================================================

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Translated strings may carry markup; anything else is shown as text.
fn markup_fragment(value: &Value) -> Document {
    if let Value::String(s) = value
        && let Ok(fragment) = Document::parse_fragment(s)
    {
        return fragment;
    }
    let mut fragment = Document::new();
    let root = fragment.root();
    fragment.append(root, DomNode::Text(escape_text(&plain_text(value))));
    fragment
}

// ============================================================================
// Style helpers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LangOperator {
    /// `=`
    Equals,
    /// `|=`: equal, or a prefix followed by `-`.
    DashMatch,
    /// `~=`: one of the whitespace-separated words.
    Includes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangCondition {
    pub op: LangOperator,
    pub value: String,
}

impl LangCondition {
    pub fn matches(&self, lang: &str) -> bool {
        let lang = lang.to_ascii_lowercase();
        let value = self.value.to_ascii_lowercase();
        match self.op {
            LangOperator::Equals => lang == value,
            LangOperator::DashMatch => {
                lang == value || lang.strip_prefix(&value).is_some_and(|r| r.starts_with('-'))
            }
            LangOperator::Includes => {
                !value.is_empty()
                    && !value.contains(char::is_whitespace)
                    && lang.split_whitespace().any(|w| w == value)
            }
        }
    }
}

/// Parse a selector fragment starting with an `html[lang…]` condition into
/// the condition and what follows it.
pub fn parse_lang_fragment(fragment: &str) -> Option<(LangCondition, &str)> {
    let caps = LANG_FRAGMENT.captures(fragment)?;
    let op = match &caps[1] {
        "=" => LangOperator::Equals,
        "|=" => LangOperator::DashMatch,
        _ => LangOperator::Includes,
    };
    let value = caps
        .get(2)
        .or_else(|| caps.get(3))
        .or_else(|| caps.get(4))
        .map_or("", |m| m.as_str())
        .to_string();
    let rest = caps.get(5).map_or("", |m| m.as_str());
    Some((LangCondition { op, value }, rest))
}

/// Split at commas outside brackets, parentheses and quotes. `None` when the
/// selector is unbalanced.
fn split_selector(selector: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' | '(' => depth += 1,
                ']' | ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return None;
                    }
                }
                ',' if depth == 0 => {
                    parts.push(selector[start..i].trim());
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    if depth != 0 || quote.is_some() {
        return None;
    }
    parts.push(selector[start..].trim());
    Some(parts)
}

/// Drop the language condition from a matching fragment. A descendant
/// combinator after it goes too (`html[lang=fr] .x` → `.x`); otherwise the
/// plain `html` stays (`html[lang=fr] > body` → `html > body`).
fn generalize(rest: &str) -> String {
    let trimmed = rest.trim_start();
    let descendant = trimmed.len() < rest.len()
        && !trimmed.is_empty()
        && !trimmed.starts_with(['>', '+', '~']);
    if descendant {
        trimmed.trim_end().to_string()
    } else {
        format!("html{}", rest.trim_end())
    }
}

struct CompiledSelector {
    /// `None` when no fragment survives.
    selector: Option<String>,
    malformed: Vec<String>,
}

fn compile_selector(selector: &str, oracle: &[String]) -> CompiledSelector {
    let Some(fragments) = split_selector(selector) else {
        return CompiledSelector {
            selector: Some(selector.to_string()),
            malformed: vec![selector.to_string()],
        };
    };
    let mut kept = Vec::new();
    let mut malformed = Vec::new();
    for fragment in fragments {
        if !LANG_PREFIX.is_match(fragment) {
            kept.push(fragment.to_string());
            continue;
        }
        match parse_lang_fragment(fragment) {
            Some((condition, rest)) => {
                if oracle.iter().any(|lang| condition.matches(lang)) {
                    kept.push(generalize(rest));
                }
            }
            None => {
                kept.push(fragment.to_string());
                malformed.push(fragment.to_string());
            }
        }
    }
    CompiledSelector {
        selector: (!kept.is_empty()).then(|| kept.join(", ")),
        malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::script::print_expr;
    use crate::test_helpers::*;
    use serde_json::json;

    fn catalog() -> Catalog {
        Catalog::from_json_str(
            r#"{
                "greeting": {"en": "Hello", "fr": "Bonjour"},
                "title": {"en": "<b>Home</b>", "fr": "<b>Accueil</b>"},
                "alt": {"en": "Logo", "fr": "Logo FR"},
                "count": {"en": "{0} of {1}", "fr": "{0} sur {1}"},
                "list": {"en": [1, 2]}
            }"#,
            "test",
        )
        .unwrap()
    }

    fn registry() -> LocaleRegistry {
        LocaleRegistry::new(&["en", "fr"], Some("en")).unwrap()
    }

    fn oracle(langs: &[&str]) -> Vec<String> {
        langs.iter().map(|s| s.to_string()).collect()
    }

    // =========================================================================
    // Script
    // =========================================================================

    #[test]
    fn script_translation_and_globals() {
        let catalog = catalog();
        let registry = registry();
        let mut ctx = LocalizationContext::new(&catalog, &registry, "fr", Some("lang"));
        let mut graph = ContentGraph::new();
        let page = add_markup(&mut graph, "/index.html", r#"<script src="app.js"></script>"#);
        let script = add_script(
            &mut graph,
            "/app.js",
            "var g = TR('greeting'); LOCALEID = 'x'; use(LOCALEID, SUPPORTEDLOCALEIDS, DEFAULTLOCALEID, LOCALECOOKIENAME, TR('list'));",
        );
        graph.populate(page).unwrap();

        ctx.localize_node(&mut graph, script).unwrap();

        assert_eq!(
            serialized(&mut graph, script),
            "var g = \"Bonjour\";\nLOCALEID = \"x\";\nuse(\"fr\", [\"en\", \"fr\"], \"en\", \"lang\", [1, 2]);\n"
        );
        assert!(ctx.warnings.is_empty());
    }

    #[test]
    fn script_missing_translation_is_left_and_reported() {
        let catalog = catalog();
        let registry = registry();
        let mut ctx = LocalizationContext::new(&catalog, &registry, "fr", None);
        let mut graph = ContentGraph::new();
        let page = add_markup(&mut graph, "/index.html", r#"<script src="app.js"></script>"#);
        let script = add_script(&mut graph, "/app.js", "alert(TR('nope', 'Default'), LOCALECOOKIENAME);");
        graph.populate(page).unwrap();

        ctx.localize_node(&mut graph, script).unwrap();

        assert_eq!(
            serialized(&mut graph, script),
            "alert(TR(\"nope\", \"Default\"), LOCALECOOKIENAME);\n"
        );
        assert_eq!(
            ctx.warnings,
            vec![LocalizeWarning::UnresolvedTranslation {
                locale: "fr".into(),
                key: "nope".into(),
                node: "/app.js".into(),
            }]
        );
    }

    #[test]
    fn script_loaded_only_by_bootstrapper_is_untouched() {
        let catalog = catalog();
        let registry = registry();
        let mut ctx = LocalizationContext::new(&catalog, &registry, "fr", None);
        let mut graph = ContentGraph::new();
        let page = add_markup(&mut graph, "/index.html", "<script id=\"bootstrapper\">x = LOCALEID;</script>");
        graph.populate(page).unwrap();
        let boot = graph.inline_children(page)[0];

        ctx.localize_node(&mut graph, boot).unwrap();
        assert_eq!(serialized(&mut graph, boot), "x = LOCALEID;\n");
    }

    #[test]
    fn pattern_function_builds_concatenation() {
        assert_eq!(
            print_expr(&pattern_function(&json!("{0} sur {1}"))),
            "function(a0, a1) {\n  return \"\" + a0 + \" sur \" + a1;\n}"
        );
        assert_eq!(
            print_expr(&pattern_function(&json!("no args {x}"))),
            "function() {\n  return \"no args {x}\";\n}"
        );
        assert_eq!(
            print_expr(&pattern_function(&json!(3))),
            "function() {\n  return 3;\n}"
        );
    }

    #[test]
    fn trpat_call_is_replaced_by_function() {
        let catalog = catalog();
        let registry = registry();
        let lookup = TranslationLookup::new(&catalog, &registry, "en");
        let call = Expr::Call {
            callee: Box::new(Expr::Ident("TRPAT".into())),
            args: vec![Expr::Str("count".into())],
        };
        let mut missing = Vec::new();
        let replaced = localize_expr(&call, &[Slot::Statement], &lookup, &BTreeMap::new(), &mut missing);
        assert!(matches!(replaced, Some(Expr::Function(_))));
        assert!(missing.is_empty());
    }

    // =========================================================================
    // Markup
    // =========================================================================

    #[test]
    fn markup_directives_and_lang() {
        let catalog = catalog();
        let registry = registry();
        let mut ctx = LocalizationContext::new(&catalog, &registry, "fr", None);
        let mut graph = ContentGraph::new();
        let page = add_markup(
            &mut graph,
            "/index.html",
            r#"<html lang="en"><body><h1 data-i18n="title">Home</h1><i18n key="greeting">Hello</i18n><img data-i18n-attr="alt: alt" alt="Logo"></body></html>"#,
        );

        ctx.localize_node(&mut graph, page).unwrap();

        assert_eq!(
            serialized(&mut graph, page),
            r#"<html lang="fr"><body><h1><b>Accueil</b></h1>Bonjour<img alt="Logo FR"></body></html>"#
        );
        assert_eq!(ctx.primary_document, Some(page));
    }

    #[test]
    fn markup_unresolved_directive_stays() {
        let catalog = catalog();
        let registry = registry();
        let mut ctx = LocalizationContext::new(&catalog, &registry, "fr", None);
        let mut graph = ContentGraph::new();
        let page = add_markup(
            &mut graph,
            "/index.html",
            r#"<html><p data-i18n="missing">Keep</p><img data-i18n-attr="alt: missing, title: alt"></html>"#,
        );

        ctx.localize_node(&mut graph, page).unwrap();

        assert_eq!(
            serialized(&mut graph, page),
            r#"<html lang="fr"><p data-i18n="missing">Keep</p><img data-i18n-attr="alt: missing, title: alt" title="Logo FR"></html>"#
        );
        assert_eq!(ctx.warnings.len(), 2);
    }

    #[test]
    fn non_string_values_render_as_escaped_text() {
        let fragment = markup_fragment(&json!(["<a>", 1]));
        assert_eq!(fragment.to_html(), r#"["&lt;a&gt;",1]"#);
    }

    // =========================================================================
    // Style
    // =========================================================================

    #[test]
    fn lang_condition_operators() {
        let eq = LangCondition { op: LangOperator::Equals, value: "fr".into() };
        assert!(eq.matches("FR"));
        assert!(!eq.matches("fr-ca"));
        let dash = LangCondition { op: LangOperator::DashMatch, value: "fr".into() };
        assert!(dash.matches("fr"));
        assert!(dash.matches("fr-ca"));
        assert!(!dash.matches("french"));
        let includes = LangCondition { op: LangOperator::Includes, value: "fr".into() };
        assert!(includes.matches("en fr"));
        assert!(!includes.matches("en-fr"));
    }

    #[test]
    fn parses_fragment_forms() {
        let (cond, rest) = parse_lang_fragment(r#"html[lang="fr"] .x"#).unwrap();
        assert_eq!(cond, LangCondition { op: LangOperator::Equals, value: "fr".into() });
        assert_eq!(rest, " .x");
        let (cond, rest) = parse_lang_fragment("HTML[ lang |= 'da' ]>body").unwrap();
        assert_eq!(cond.op, LangOperator::DashMatch);
        assert_eq!(cond.value, "da");
        assert_eq!(rest, ">body");
        let (cond, _) = parse_lang_fragment("html[lang~=en]").unwrap();
        assert_eq!(cond.op, LangOperator::Includes);
        assert!(parse_lang_fragment("html[lang^=fr] .x").is_none());
    }

    #[test]
    fn compiles_selectors_against_oracle() {
        let fr = oracle(&["fr"]);
        let c = compile_selector(r#"html[lang="fr"] .x"#, &fr);
        assert_eq!(c.selector.as_deref(), Some(".x"));
        let c = compile_selector(r#"html[lang="en"] .x"#, &fr);
        assert_eq!(c.selector, None);
        let c = compile_selector(r#".a, html[lang="en"] .x, html[lang|=fr] > body"#, &fr);
        assert_eq!(c.selector.as_deref(), Some(".a, html > body"));
        let c = compile_selector("html[lang=fr]", &fr);
        assert_eq!(c.selector.as_deref(), Some("html"));
        let c = compile_selector("html[lang=fr].rtl p", &fr);
        assert_eq!(c.selector.as_deref(), Some("html.rtl p"));
        assert!(c.malformed.is_empty());
    }

    #[test]
    fn malformed_fragments_are_kept() {
        let fr = oracle(&["fr"]);
        let c = compile_selector("html[lang^=fr] .x, html[lang=en] .y", &fr);
        assert_eq!(c.selector.as_deref(), Some("html[lang^=fr] .x"));
        assert_eq!(c.malformed, vec!["html[lang^=fr] .x".to_string()]);

        let c = compile_selector("html[lang=fr .x", &fr);
        assert_eq!(c.selector.as_deref(), Some("html[lang=fr .x"));
        assert_eq!(c.malformed.len(), 1);
    }

    #[test]
    fn style_rule_removal_drops_inline_image() {
        let catalog = catalog();
        let registry = registry();
        let mut ctx = LocalizationContext::new(&catalog, &registry, "en", None);
        let mut graph = ContentGraph::new();
        let sheet = add_style(
            &mut graph,
            "/site.css",
            r#"html[lang="fr"] .flag { background: url(data:image/png;base64,AA) } .x { color: red }"#,
        );
        graph.populate(sheet).unwrap();
        assert_eq!(graph.node_count(), 2);

        ctx.localize_node(&mut graph, sheet).unwrap();

        assert_eq!(graph.node_count(), 1);
        assert!(graph.outgoing(sheet).is_empty());
        assert_eq!(serialized(&mut graph, sheet), ".x {\n  color: red;\n}\n");
    }

    #[test]
    fn style_uses_primary_document_lang() {
        let catalog = catalog();
        let registry = registry();
        let mut ctx = LocalizationContext::new(&catalog, &registry, "fr", None);
        let mut graph = ContentGraph::new();
        let page = add_markup(&mut graph, "/index.html", "<html><body></body></html>");
        let sheet = add_style(
            &mut graph,
            "/site.css",
            "html[lang|=fr] .banner { color: blue } html[lang=en] .banner { color: red }",
        );

        ctx.localize_node(&mut graph, page).unwrap();
        ctx.localize_node(&mut graph, sheet).unwrap();

        assert_eq!(serialized(&mut graph, sheet), ".banner {\n  color: blue;\n}\n");
    }
}
