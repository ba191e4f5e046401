/*!
 * Tests for application configuration functionality
 */

use anyhow::Result;
use subingest::app_config::{Config, InspectorMode, LogLevel};
use subingest::caption_parser::CaptionFormat;
use subingest::stream_inspector::StreamDescriptor;
use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.database_path, None);
    assert_eq!(config.inspector.mode, InspectorMode::Ffprobe);
    assert_eq!(config.inspector.ffprobe_path, "ffprobe");
    assert_eq!(config.inspector.timeout_secs, 60);
    assert_eq!(config.extractor.ffmpeg_path, "ffmpeg");
    assert_eq!(config.extractor.timeout_secs, 120);
    assert_eq!(config.extractor.format, CaptionFormat::Srt);
    assert_eq!(config.jobs.workers, 2);
    assert_eq!(config.languages.name_for("eng").as_deref(), Some("English"));
    assert_eq!(config.log_level, LogLevel::Info);

    assert!(config.validate().is_ok());
}

/// Test configuration validation
#[test]
fn test_config_validation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();

    config.jobs.workers = 0;
    assert!(config.validate().is_err());
    config.jobs.workers = 4;

    config.inspector.timeout_secs = 0;
    assert!(config.validate().is_err());
    config.inspector.timeout_secs = 10;

    config.extractor.ffmpeg_path = " ".to_string();
    assert!(config.validate().is_err());
    config.extractor.ffmpeg_path = "/usr/bin/ffmpeg".to_string();

    // Static mode needs a stream list
    config.inspector.mode = InspectorMode::Static;
    assert!(config.validate().is_err());
    config.inspector.static_streams = vec![StreamDescriptor::new(0, "en"), StreamDescriptor::new(1, "ru")];
    assert!(config.validate().is_ok());

    config.languages.names.insert(" ".to_string(), "Blank".to_string());
    assert!(config.validate().is_err());
}

/// Test that a partial config file is completed with defaults
#[test]
fn test_config_fromPartialJson_shouldFillDefaults() -> Result<()> {
    let json = r#"{
        "inspector": {
            "mode": "static",
            "static_streams": [
                { "index": 0, "language": "en" },
                { "index": 1, "language_tag": "ru" }
            ]
        },
        "extractor": { "format": "webvtt" },
        "languages": { "version": 3, "iso_fallback": true, "names": { "en": "English" } },
        "log_level": "debug"
    }"#;

    let config: Config = serde_json::from_str(json)?;

    assert_eq!(config.inspector.mode, InspectorMode::Static);
    assert_eq!(config.inspector.timeout_secs, 60);
    assert_eq!(config.inspector.static_streams[0].language_tag, "en");
    assert_eq!(config.inspector.static_streams[1].language_tag, "ru");
    assert_eq!(config.extractor.format, CaptionFormat::WebVtt);
    assert_eq!(config.extractor.timeout_secs, 120);
    assert_eq!(config.languages.version, 3);
    assert_eq!(config.languages.name_for("de").as_deref(), Some("German"));
    assert_eq!(config.jobs.workers, 2);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert!(config.validate().is_ok());

    Ok(())
}

/// Test that a missing config file is created with defaults and read back
#[test]
fn test_load_or_create_withMissingFile_shouldWriteDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let created = Config::load_or_create(&path)?;
    assert!(path.exists());
    assert_eq!(created, Config::default());

    let mut edited = created.clone();
    edited.jobs.workers = 8;
    edited.database_path = Some(temp_dir.path().join("db.sqlite"));
    edited.save(&path)?;

    let reloaded = Config::load_or_create(&path)?;
    assert_eq!(reloaded, edited);

    Ok(())
}

/// Test that a malformed config file is reported
#[test]
fn test_load_or_create_withMalformedFile_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    Ok(())
}

/// Test inspector mode parsing
#[test]
fn test_inspector_mode_fromStr_shouldParseBothModes() {
    assert_eq!("FFPROBE".parse::<InspectorMode>().unwrap(), InspectorMode::Ffprobe);
    assert_eq!("static".parse::<InspectorMode>().unwrap(), InspectorMode::Static);
    assert!("mediainfo".parse::<InspectorMode>().is_err());
}
