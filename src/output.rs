//! CLI output formatting for the pipeline commands.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Entry points
//! 001 /about.html
//!     nothing to localize
//! 002 /index.html (4 localizable)
//!     /index.html
//!     /css/site.css
//!     /js/app.js
//!
//! Locales: en, fr
//! ```
//!
//! ## Build
//!
//! ```text
//! Scanned 11 nodes, 2 entry points
//!
//! Locale en
//!     /index.en.html
//!     /css/site.en.css
//! Locale fr
//!     /index.fr.html
//!     /css/site.fr.css
//! Removed
//!     /index.html
//! Warnings
//!     [fr] no translation for "title" in /index.fr.html
//!
//! Wrote 12 files (4.1 KiB)
//! Manifest: dist/build-manifest.json
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::fanout::FanOutReport;
use crate::pipeline::{BuildReport, CheckReport};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["KiB", "MiB", "GiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check_output(report: &CheckReport) -> Vec<String> {
    let mut lines = vec!["Entry points".to_string()];
    for (i, closure) in report.closures.iter().enumerate() {
        if closure.pre_order.is_empty() {
            lines.push(format!("{} {}", format_index(i + 1), closure.root));
            lines.push(format!("{}nothing to localize", indent(1)));
            continue;
        }
        lines.push(format!(
            "{} {} ({} localizable)",
            format_index(i + 1),
            closure.root,
            closure.member_count
        ));
        for url in &closure.pre_order {
            lines.push(format!("{}{url}", indent(1)));
        }
    }
    if report.closures.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    lines.push(String::new());
    if report.locales.is_empty() {
        lines.push("Locales: none configured, fan-out disabled".to_string());
    } else {
        lines.push(format!("Locales: {}", report.locales.join(", ")));
    }
    lines
}

pub fn print_check_output(report: &CheckReport) {
    for line in format_check_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Fan-out
// ============================================================================

pub fn format_fanout_report(report: &FanOutReport) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<&str> = None;
    for (locale, url) in &report.clones {
        if current != Some(locale.as_str()) {
            lines.push(format!("Locale {locale}"));
            current = Some(locale);
        }
        lines.push(format!("{}{url}", indent(1)));
    }
    let mut section = |title: &str, items: Vec<String>| {
        if !items.is_empty() {
            lines.push(title.to_string());
            lines.extend(items.into_iter().map(|item| format!("{}{item}", indent(1))));
        }
    };
    section(
        "Reused",
        report
            .reused
            .iter()
            .map(|(locale, url)| format!("{url} ({locale})"))
            .collect(),
    );
    section("Removed", report.removed.clone());
    section("Nothing to localize", report.skipped_roots.clone());
    section(
        "Warnings",
        report.warnings.iter().map(ToString::to_string).collect(),
    );
    lines
}

pub fn print_fanout_report(report: &FanOutReport) {
    for line in format_fanout_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Scanned {} nodes, {} entry points",
            report.scanned_nodes,
            report.roots.len()
        ),
        String::new(),
    ];
    match &report.fan_out {
        Some(fan_out) => {
            lines.extend(format_fanout_report(fan_out));
            lines.push(String::new());
        }
        None => {
            lines.push("Fan-out skipped (no locales configured)".to_string());
            lines.push(String::new());
        }
    }
    lines.push(format!(
        "Wrote {} files ({})",
        report.emit.files_written,
        format_bytes(report.emit.bytes_written)
    ));
    if let Some(path) = &report.emit.manifest {
        lines.push(format!("Manifest: {}", path.display()));
    }
    lines
}

pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::EmitSummary;
    use crate::pipeline::ClosureSummary;
    use crate::rewrite::LocalizeWarning;
    use std::path::PathBuf;

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn check_output_lists_closures() {
        let report = CheckReport {
            scanned_nodes: 5,
            locales: vec!["en".into(), "fr".into()],
            closures: vec![
                ClosureSummary {
                    root: "/about.html".into(),
                    pre_order: vec![],
                    member_count: 0,
                },
                ClosureSummary {
                    root: "/index.html".into(),
                    pre_order: vec!["/index.html".into(), "/js/app.js".into()],
                    member_count: 3,
                },
            ],
        };
        assert_eq!(
            format_check_output(&report),
            vec![
                "Entry points",
                "001 /about.html",
                "    nothing to localize",
                "002 /index.html (3 localizable)",
                "    /index.html",
                "    /js/app.js",
                "",
                "Locales: en, fr",
            ]
        );
    }

    #[test]
    fn check_output_without_locales() {
        let report = CheckReport {
            scanned_nodes: 0,
            locales: vec![],
            closures: vec![],
        };
        let lines = format_check_output(&report);
        assert_eq!(lines[1], "    (none)");
        assert_eq!(lines.last().unwrap(), "Locales: none configured, fan-out disabled");
    }

    #[test]
    fn fanout_report_groups_by_locale() {
        let report = FanOutReport {
            clones: vec![
                ("en".into(), "/index.en.html".into()),
                ("en".into(), "/app.en.js".into()),
                ("fr".into(), "/app.fr.js".into()),
            ],
            reused: vec![("fr".into(), "/index.fr.html".into())],
            removed: vec!["/index.html".into()],
            skipped_roots: vec![],
            warnings: vec![LocalizeWarning::UnresolvedTranslation {
                locale: "fr".into(),
                key: "title".into(),
                node: "/app.fr.js".into(),
            }],
        };
        assert_eq!(
            format_fanout_report(&report),
            vec![
                "Locale en",
                "    /index.en.html",
                "    /app.en.js",
                "Locale fr",
                "    /app.fr.js",
                "Reused",
                "    /index.fr.html (fr)",
                "Removed",
                "    /index.html",
                "Warnings",
                "    [fr] no translation for \"title\" in /app.fr.js",
            ]
        );
    }

    #[test]
    fn build_output_reports_skip_and_manifest() {
        let report = BuildReport {
            roots: vec!["/index.html".into()],
            scanned_nodes: 3,
            fan_out: None,
            emit: EmitSummary {
                files_written: 3,
                bytes_written: 100,
                manifest: Some(PathBuf::from("dist/build-manifest.json")),
            },
        };
        assert_eq!(
            format_build_output(&report),
            vec![
                "Scanned 3 nodes, 1 entry points",
                "",
                "Fan-out skipped (no locales configured)",
                "",
                "Wrote 3 files (100 B)",
                "Manifest: dist/build-manifest.json",
            ]
        );
    }
}
