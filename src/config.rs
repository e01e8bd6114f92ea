//! Site configuration module.
//!
//! Handles loading, validating, and merging `sitegraph.toml`. The file lives in
//! the site root and is sparse: stock defaults are overridden key by key by
//! whatever the user writes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [i18n]
//! locales = []               # Target locales; empty disables fan-out
//! # default_locale = "en"    # Fallback for missing translations
//! # cookie_name = "locale"   # Value substituted for LOCALECOOKIENAME
//!
//! [build]
//! entry_points = []          # Root pages; empty = every top-level .html
//! manifest = true            # Write build-manifest.json
//! ```
//!
//! ## Partial Configuration
//!
//! Override just the values you want:
//!
//! ```toml
//! [i18n]
//! locales = ["en", "fr"]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::fanout::FanOutOptions;
use crate::locale::{FALLBACK_DEFAULT_LOCALE, normalize_locale_id};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the configuration file in the site root.
pub const CONFIG_FILE: &str = "sitegraph.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `sitegraph.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Locale fan-out settings.
    pub i18n: I18nConfig,
    /// Entry points and build outputs.
    pub build: BuildConfig,
}

impl SiteConfig {
    /// Validate locale identifiers and entry points.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: Vec<String> = Vec::new();
        for raw in &self.i18n.locales {
            let id = normalize_locale_id(raw)
                .map_err(|e| ConfigError::Validation(format!("i18n.locales: {e}")))?;
            if seen.contains(&id) {
                return Err(ConfigError::Validation(format!(
                    "i18n.locales: {raw:?} duplicates another entry"
                )));
            }
            seen.push(id);
        }
        if let Some(default) = &self.i18n.default_locale {
            normalize_locale_id(default)
                .map_err(|e| ConfigError::Validation(format!("i18n.default_locale: {e}")))?;
        }
        if self
            .i18n
            .cookie_name
            .as_deref()
            .is_some_and(|c| c.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "i18n.cookie_name must not be empty".into(),
            ));
        }
        if self.build.entry_points.iter().any(|e| e.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "build.entry_points must not contain empty paths".into(),
            ));
        }
        Ok(())
    }

    /// Whether locale fan-out runs at all.
    pub fn fan_out_enabled(&self) -> bool {
        !self.i18n.locales.is_empty()
    }

    pub fn fan_out_options(&self) -> FanOutOptions {
        FanOutOptions {
            locales: self.i18n.locales.clone(),
            default_locale: self.i18n.default_locale.clone(),
            cookie_name: self.i18n.cookie_name.clone(),
        }
    }
}

/// Locale fan-out settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct I18nConfig {
    /// Locales each root page is replicated for.
    pub locales: Vec<String>,
    /// Locale translations fall back to. Defaults to `en`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_locale: Option<String>,
    /// Cookie name scripts read through `LOCALECOOKIENAME`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie_name: Option<String>,
}

impl I18nConfig {
    pub fn effective_default_locale(&self) -> &str {
        self.default_locale
            .as_deref()
            .unwrap_or(FALLBACK_DEFAULT_LOCALE)
    }
}

/// Entry points and build outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Site-relative paths of root pages. Empty means every top-level
    /// `.html`/`.htm` file.
    pub entry_points: Vec<String>,
    /// Write `build-manifest.json` next to the output.
    pub manifest: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            entry_points: Vec::new(),
            manifest: true,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `sitegraph.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no config file.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `sitegraph.toml` in the given directory.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `sitegraph.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sitegraph configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file in the site root as sitegraph.toml.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Locale fan-out
# ---------------------------------------------------------------------------
[i18n]
# Locales every root page is replicated for. page.html becomes
# page.en.html, page.fr.html, ... Leave empty to skip fan-out.
locales = []

# Locale whose translation is used when a key has none for the target locale.
# default_locale = "en"

# Value scripts receive for the LOCALECOOKIENAME global.
# Omit to leave LOCALECOOKIENAME untouched.
# cookie_name = "locale"

# ---------------------------------------------------------------------------
# Build
# ---------------------------------------------------------------------------
[build]
# Site-relative root pages. Empty means every top-level .html file.
entry_points = []

# Write build-manifest.json (locator -> SHA-256) into the output directory.
manifest = true
"##
}
