use isolang::Language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Language utilities for subtitle language tags
///
/// This module normalizes the language tags reported by media containers
/// and provides the configurable tag to display-name table.

/// Tag used for streams that carry no language information
pub const UNKNOWN_LANGUAGE_TAG: &str = "und";

/// ISO 639-2/B codes that differ from their ISO 639-2/T counterpart
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Normalize a raw language tag into the canonical stored form.
///
/// Tags are trimmed and lowercased. Missing or blank tags become
/// [`UNKNOWN_LANGUAGE_TAG`]. The code itself is kept as reported, so "en"
/// and "eng" remain distinct.
pub fn normalize_tag(tag: Option<&str>) -> String {
    match tag.map(|t| t.trim().to_lowercase()) {
        Some(t) if !t.is_empty() => t,
        _ => UNKNOWN_LANGUAGE_TAG.to_string(),
    }
}

/// Look up the English ISO 639 name of a 2- or 3-letter code
pub fn iso_english_name(code: &str) -> Option<String> {
    let code = code.trim().to_lowercase();

    let language = match code.len() {
        2 => Language::from_639_1(&code),
        3 => {
            let part2t = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == code)
                .map(|(_, t)| *t)
                .unwrap_or(code.as_str());
            Language::from_639_3(part2t)
        }
        _ => None,
    }?;

    Some(language.to_name().to_string())
}

/// Tag to display-name mapping handed to the language resolver.
///
/// Loaded from configuration so new codes can be added without a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LanguageTable {
    /// Revision of the mapping, bumped when names are edited
    #[serde(default = "default_table_version")]
    pub version: u32,

    /// Fall back to ISO 639 English names for tags missing from `names`
    #[serde(default)]
    pub iso_fallback: bool,

    /// Explicit tag to display-name entries
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}

impl LanguageTable {
    /// Create a table from explicit entries, without ISO fallback
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            version: default_table_version(),
            iso_fallback: false,
            names: entries
                .into_iter()
                .map(|(k, v)| (k.into().to_lowercase(), v.into()))
                .collect(),
        }
    }

    /// Enable or disable ISO 639 name fallback
    pub fn with_iso_fallback(mut self, enabled: bool) -> Self {
        self.iso_fallback = enabled;
        self
    }

    /// Display name for a tag, if one is known
    pub fn name_for(&self, tag: &str) -> Option<String> {
        let tag = tag.trim().to_lowercase();
        if let Some(name) = self.names.get(&tag).filter(|n| !n.is_empty()) {
            return Some(name.clone());
        }
        if self.iso_fallback {
            return iso_english_name(&tag);
        }
        None
    }
}

impl Default for LanguageTable {
    fn default() -> Self {
        Self::new([
            ("eng", "English"),
            ("rus", "Russian"),
            (UNKNOWN_LANGUAGE_TAG, "Undetermined"),
        ])
    }
}

fn default_table_version() -> u32 {
    1
}
