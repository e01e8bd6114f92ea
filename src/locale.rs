//! Locale identifiers.
//!
//! Identifiers are compared in one normal form: lower-case, hyphen-separated
//! (`en_US` and `EN-us` both become `en-us`). Validation is delegated to
//! `unic-langid`, so typos such as `english` or `fr--ca` are rejected when the
//! configuration is loaded rather than producing oddly named files later.

use thiserror::Error;
use unic_langid::LanguageIdentifier;

/// Used when no default locale is configured.
pub const FALLBACK_DEFAULT_LOCALE: &str = "en";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocaleError {
    #[error("invalid locale identifier {0:?}")]
    Invalid(String),
}

/// Normalize a locale identifier: trimmed, lower-case, `_` replaced by `-`.
///
/// ```
/// use sitegraph::locale::normalize_locale_id;
/// assert_eq!(normalize_locale_id(" en_US ").unwrap(), "en-us");
/// assert!(normalize_locale_id("not a locale").is_err());
/// ```
pub fn normalize_locale_id(raw: &str) -> Result<String, LocaleError> {
    let candidate = raw.trim().replace('_', "-");
    if candidate.is_empty() {
        return Err(LocaleError::Invalid(raw.to_string()));
    }
    let parsed: LanguageIdentifier = candidate
        .parse()
        .map_err(|_| LocaleError::Invalid(raw.to_string()))?;
    Ok(parsed.to_string().to_ascii_lowercase())
}

/// The configured target locales, normalized and deduplicated in the order
/// they were given, plus the default locale translations fall back to.
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleRegistry {
    locales: Vec<String>,
    default_locale: String,
}

impl LocaleRegistry {
    pub fn new<S: AsRef<str>>(locales: &[S], default_locale: Option<&str>) -> Result<Self, LocaleError> {
        let mut normalized: Vec<String> = Vec::with_capacity(locales.len());
        for raw in locales {
            let id = normalize_locale_id(raw.as_ref())?;
            if !normalized.contains(&id) {
                normalized.push(id);
            }
        }
        let default_locale = match default_locale {
            Some(raw) => normalize_locale_id(raw)?,
            None => FALLBACK_DEFAULT_LOCALE.to_string(),
        };
        Ok(Self {
            locales: normalized,
            default_locale,
        })
    }

    pub fn locales(&self) -> &[String] {
        &self.locales
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn is_empty(&self) -> bool {
        self.locales.is_empty()
    }

    /// Locales to consult, most specific first, ending with the default:
    /// `fr-ca` → `fr-ca`, `fr`, `en`.
    pub fn fallback_chain(&self, locale: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = locale.to_string();
        loop {
            chain.push(current.clone());
            match current.rfind('-') {
                Some(i) => current.truncate(i),
                None => break,
            }
        }
        if !chain.contains(&self.default_locale) {
            chain.push(self.default_locale.clone());
        }
        chain
    }
}
