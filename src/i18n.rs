//! Translation catalog.
//!
//! Translations live in `*.i18n` files next to the content. Each file is a
//! JSON object mapping a key to its per-locale values:
//!
//! ```json
//! {
//!     "greeting": { "en": "Hello", "fr": "Bonjour" },
//!     "months":   { "en": ["Jan", "Feb"], "da": ["jan", "feb"] }
//! }
//! ```
//!
//! Values are arbitrary JSON, so scripts can receive arrays and objects as
//! well as strings. Files are merged in load order; a later file overrides an
//! earlier one key by key and locale by locale.

use crate::locale::{LocaleError, LocaleRegistry, normalize_locale_id};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{origin}: invalid JSON: {source}")]
    Json {
        origin: String,
        source: serde_json::Error,
    },
    #[error("{origin}: key {key:?} must map locales to values")]
    Shape { origin: String, key: String },
    #[error("{origin}: {source}")]
    Locale { origin: String, source: LocaleError },
}

/// All known translations, keyed by translation key then normalized locale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one catalog document. `origin` names it in error messages.
    pub fn from_json_str(json: &str, origin: &str) -> Result<Self, CatalogError> {
        let parsed: BTreeMap<String, Value> =
            serde_json::from_str(json).map_err(|source| CatalogError::Json {
                origin: origin.to_string(),
                source,
            })?;
        let mut catalog = Catalog::new();
        for (key, per_locale) in parsed {
            let Value::Object(map) = per_locale else {
                return Err(CatalogError::Shape {
                    origin: origin.to_string(),
                    key,
                });
            };
            let mut values = BTreeMap::new();
            for (locale, value) in map {
                let locale = normalize_locale_id(&locale).map_err(|source| CatalogError::Locale {
                    origin: origin.to_string(),
                    source,
                })?;
                values.insert(locale, value);
            }
            catalog.entries.insert(key, values);
        }
        Ok(catalog)
    }

    pub fn load_file(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json, &path.display().to_string())
    }

    /// Fold `other` into this catalog; its values win.
    pub fn merge(&mut self, other: Catalog) {
        for (key, values) in other.entries {
            self.entries.entry(key).or_default().extend(values);
        }
    }

    pub fn insert(&mut self, key: &str, locale: &str, value: Value) {
        self.entries
            .entry(key.to_string())
            .or_default()
            .insert(locale.to_string(), value);
    }

    pub fn get(&self, key: &str, locale: &str) -> Option<&Value> {
        self.entries.get(key).and_then(|values| values.get(locale))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of looking up one key for one locale.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    /// The locale itself has a value.
    Exact(&'a Value),
    /// A less specific locale or the default locale had one.
    Fallback { locale: String, value: &'a Value },
    /// Nothing along the fallback chain.
    Missing,
}

impl<'a> Resolution<'a> {
    pub fn value(&self) -> Option<&'a Value> {
        match self {
            Resolution::Exact(value) | Resolution::Fallback { value, .. } => Some(*value),
            Resolution::Missing => None,
        }
    }
}

/// Catalog view scoped to one target locale.
#[derive(Debug, Clone)]
pub struct TranslationLookup<'a> {
    catalog: &'a Catalog,
    locale: String,
    chain: Vec<String>,
}

impl<'a> TranslationLookup<'a> {
    pub fn new(catalog: &'a Catalog, registry: &LocaleRegistry, locale: &str) -> Self {
        Self {
            catalog,
            locale: locale.to_string(),
            chain: registry.fallback_chain(locale),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn resolve(&self, key: &str) -> Resolution<'a> {
        for (i, locale) in self.chain.iter().enumerate() {
            if let Some(value) = self.catalog.get(key, locale) {
                return if i == 0 {
                    Resolution::Exact(value)
                } else {
                    Resolution::Fallback {
                        locale: locale.clone(),
                        value,
                    }
                };
            }
        }
        Resolution::Missing
    }
}
