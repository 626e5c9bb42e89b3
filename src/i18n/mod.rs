//! Internationalization (i18n) module.
//!
//! Message catalogs are embedded JSON files, one per locale. Placeholders use
//! `{name}` and are filled in by the caller with `str::replace`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::warn;

/// Locale used when a key is missing from the requested catalog.
pub const FALLBACK_LOCALE: &str = "uk";

/// LangCode -> catalog
static TRANSLATIONS: Lazy<HashMap<&'static str, Value>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (lang, raw) in [("uk", include_str!("uk.json")), ("en", include_str!("en.json"))] {
        match serde_json::from_str(raw) {
            Ok(value) => {
                map.insert(lang, value);
            }
            Err(error) => warn!(lang, %error, "failed to parse message catalog"),
        }
    }
    map
});

/// Whether a catalog exists for `lang`.
pub fn is_supported(lang: &str) -> bool {
    TRANSLATIONS.contains_key(lang)
}

/// Get text for a key in a specific language.
/// Supports nested keys via dot notation, e.g., "ai.wait".
pub fn get_text(lang: &str, key: &str) -> String {
    TRANSLATIONS
        .get(lang)
        .and_then(|catalog| resolve_key(catalog, key))
        .or_else(|| {
            TRANSLATIONS
                .get(FALLBACK_LOCALE)
                .and_then(|catalog| resolve_key(catalog, key))
        })
        .unwrap_or_else(|| key.to_string())
}

fn resolve_key(val: &Value, key: &str) -> Option<String> {
    let mut current = val;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    current.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every key in the fallback catalog must exist in every other catalog.
    fn keys(value: &Value, prefix: &str, out: &mut Vec<String>) {
        if let Some(object) = value.as_object() {
            for (name, child) in object {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}.{name}")
                };
                if child.is_object() {
                    keys(child, &path, out);
                } else {
                    out.push(path);
                }
            }
        }
    }

    #[test]
    fn test_catalogs_parse_and_match() {
        assert!(is_supported("uk"));
        assert!(is_supported("en"));

        let mut expected = Vec::new();
        keys(&TRANSLATIONS[FALLBACK_LOCALE], "", &mut expected);
        assert!(!expected.is_empty());

        for key in &expected {
            assert!(
                resolve_key(&TRANSLATIONS["en"], key).is_some(),
                "en catalog is missing {key}"
            );
        }
    }

    #[test]
    fn test_missing_key_falls_back() {
        assert_eq!(get_text("en", "no.such.key"), "no.such.key");
        assert_eq!(get_text("de", "ai.wait"), get_text("uk", "ai.wait"));
        assert!(get_text("en", "ai.wait").contains("{seconds}"));
    }
}
