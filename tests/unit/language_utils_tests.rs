/*!
 * Tests for language utility functions
 */

use subingest::language_utils::{iso_english_name, normalize_tag, LanguageTable, UNKNOWN_LANGUAGE_TAG};

/// Test that tags keep their code and only lose case and padding
#[test]
fn test_normalize_tag_withVariousTags_shouldKeepCodesDistinct() {
    assert_eq!(normalize_tag(Some("en")), "en");
    assert_eq!(normalize_tag(Some("eng")), "eng");
    assert_eq!(normalize_tag(Some("\tPt-BR ")), "pt-br");
    assert_eq!(normalize_tag(Some("   ")), UNKNOWN_LANGUAGE_TAG);
    assert_eq!(normalize_tag(None), "und");
}

/// Test ISO lookups for 639-1, 639-2/T and 639-2/B codes
#[test]
fn test_iso_english_name_withKnownCodes_shouldReturnEnglishNames() {
    assert_eq!(iso_english_name("ru").as_deref(), Some("Russian"));
    assert_eq!(iso_english_name("RUS").as_deref(), Some("Russian"));
    assert_eq!(iso_english_name("deu").as_deref(), Some("German"));
    assert_eq!(iso_english_name("fre").as_deref(), Some("French"));
    assert_eq!(iso_english_name(""), None);
    assert_eq!(iso_english_name("zzzz"), None);
}

/// Test the default table carried by a fresh configuration
#[test]
fn test_language_table_default_shouldNameBuiltInCodes() {
    let table = LanguageTable::default();

    assert_eq!(table.version, 1);
    assert!(!table.iso_fallback);
    assert_eq!(table.name_for("eng").as_deref(), Some("English"));
    assert_eq!(table.name_for("rus").as_deref(), Some("Russian"));
    assert_eq!(table.name_for(UNKNOWN_LANGUAGE_TAG).as_deref(), Some("Undetermined"));
    assert_eq!(table.name_for("en"), None);
}

/// Test that the table deserializes from the config file shape
#[test]
fn test_language_table_fromJson_shouldApplyDefaults() {
    let table: LanguageTable = serde_json::from_str(r#"{ "names": { "ukr": "Ukrainian", "blank": "" } }"#)
        .expect("table should parse");

    assert_eq!(table.version, 1);
    assert_eq!(table.name_for("UKR").as_deref(), Some("Ukrainian"));
    // Empty names count as unknown
    assert_eq!(table.name_for("blank"), None);
}
