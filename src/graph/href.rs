//! Reference text helpers.
//!
//! Node locators are site-absolute paths (`/js/app.js`) or external URLs.
//! References inside content keep whatever form the author wrote: relative,
//! root-relative or absolute, optionally with a query string or fragment.
//! These helpers convert between the two without touching the filesystem.

/// Whether `href` starts with a URL scheme (`https:`, `data:`, `mailto:`).
pub fn has_scheme(href: &str) -> bool {
    let Some(colon) = href.find(':') else {
        return false;
    };
    let scheme = &href[..colon];
    scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Whether `href` points off-site (scheme or protocol-relative).
pub fn is_external(href: &str) -> bool {
    href.starts_with("//") || has_scheme(href)
}

/// Split `url` into its path and its query-plus-fragment suffix.
///
/// ```
/// use sitegraph::graph::href::split_suffix;
/// assert_eq!(split_suffix("app.js?v=2#top"), ("app.js", "?v=2#top"));
/// assert_eq!(split_suffix("app.js"), ("app.js", ""));
/// ```
pub fn split_suffix(url: &str) -> (&str, &str) {
    match url.find(['?', '#']) {
        Some(i) => url.split_at(i),
        None => (url, ""),
    }
}

/// Split an absolute URL into origin (`https://host`) and path.
fn split_origin(url: &str) -> (&str, &str) {
    if let Some(rest_at) = url.find("://").map(|i| i + 3) {
        match url[rest_at..].find('/') {
            Some(slash) => url.split_at(rest_at + slash),
            None => (url, "/"),
        }
    } else {
        ("", url)
    }
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let trailing_slash = path.ends_with('/');
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let mut out = format!("/{}", segments.join("/"));
    if trailing_slash && !segments.is_empty() {
        out.push('/');
    }
    out
}

/// Resolve `href` as written inside a node located at `base`.
/// The result has no query string or fragment.
pub fn resolve_href(base: &str, href: &str) -> String {
    let (path, _) = split_suffix(href);
    if has_scheme(path) {
        return path.to_string();
    }
    if path.starts_with("//") {
        let scheme = base.split_once("://").map_or("https", |(s, _)| s);
        return format!("{scheme}:{path}");
    }
    let (origin, base_path) = split_origin(split_suffix(base).0);
    let joined = if path.starts_with('/') {
        path.to_string()
    } else if path.is_empty() {
        base_path.to_string()
    } else {
        let dir = base_path.rfind('/').map_or("/", |i| &base_path[..=i]);
        format!("{dir}{path}")
    };
    format!("{origin}{}", normalize_path(&joined))
}

/// The shortest relative reference from a node at `from` to one at `to`.
///
/// ```
/// use sitegraph::graph::href::relative_href;
/// assert_eq!(relative_href("/page.html", "/js/app.js"), "js/app.js");
/// assert_eq!(relative_href("/css/site.css", "/img/flag.png"), "../img/flag.png");
/// ```
pub fn relative_href(from: &str, to: &str) -> String {
    let (from_origin, from_path) = split_origin(from);
    let (to_origin, to_path) = split_origin(to);
    if from_origin != to_origin {
        return to.to_string();
    }
    let from_dir: Vec<&str> = {
        let mut segs: Vec<&str> = from_path.split('/').filter(|s| !s.is_empty()).collect();
        if !from_path.ends_with('/') {
            segs.pop();
        }
        segs
    };
    let to_segs: Vec<&str> = to_path.split('/').filter(|s| !s.is_empty()).collect();
    let common = from_dir
        .iter()
        .zip(&to_segs)
        .take_while(|(a, b)| a == b)
        .count()
        .min(to_segs.len().saturating_sub(1));
    let mut parts: Vec<&str> = vec![".."; from_dir.len() - common];
    parts.extend(&to_segs[common..]);
    let mut out = parts.join("/");
    if to_path.ends_with('/') && !to_segs.is_empty() {
        out.push('/');
    }
    if out.is_empty() { "./".to_string() } else { out }
}

/// Rewrite `old_href` so it points at `target`, keeping its form (relative,
/// root-relative or absolute) and its query string and fragment.
pub fn rewrite_href(old_href: &str, base: &str, target: &str) -> String {
    let (old_path, suffix) = split_suffix(old_href);
    let new_path = if is_external(target) || is_external(old_path) || old_path.starts_with('/') {
        target.to_string()
    } else {
        relative_href(base, target)
    };
    format!("{new_path}{suffix}")
}

/// The locator of a locale variant: `.<locale>` is inserted before the final
/// extension of the last path segment, or appended when there is none. Query
/// string and fragment are preserved.
///
/// ```
/// use sitegraph::graph::href::localized_locator;
/// assert_eq!(localized_locator("/page.html", "fr"), "/page.fr.html");
/// assert_eq!(localized_locator("/js/app.min.js?v=3", "en-us"), "/js/app.min.en-us.js?v=3");
/// assert_eq!(localized_locator("/feed", "de"), "/feed.de");
/// ```
pub fn localized_locator(url: &str, locale: &str) -> String {
    let (path, suffix) = split_suffix(url);
    let segment_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let at = segment_start + dot;
            format!("{}.{locale}{}{suffix}", &path[..at], &path[at..])
        }
        _ => format!("{path}.{locale}{suffix}"),
    }
}
