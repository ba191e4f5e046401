use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::caption_parser::CaptionFormat;
use crate::language_utils::LanguageTable;
use crate::stream_inspector::StreamDescriptor;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// SQLite database file, defaults to the user data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Stream discovery settings
    #[serde(default)]
    pub inspector: InspectorConfig,

    /// Stream demuxing settings
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Language tag to display-name table
    #[serde(default)]
    pub languages: LanguageTable,

    /// Background ingestion settings
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// How subtitle streams are discovered
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InspectorMode {
    // @mode: Probe the container with ffprobe
    #[default]
    Ffprobe,
    // @mode: Use the configured stream list
    Static,
}

impl std::fmt::Display for InspectorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ffprobe => write!(f, "ffprobe"),
            Self::Static => write!(f, "static"),
        }
    }
}

impl std::str::FromStr for InspectorMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ffprobe" => Ok(Self::Ffprobe),
            "static" => Ok(Self::Static),
            _ => Err(anyhow!("Invalid inspector mode: {}", s)),
        }
    }
}

/// Stream inspector configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InspectorConfig {
    #[serde(default)]
    pub mode: InspectorMode,

    /// ffprobe binary, looked up on PATH when bare
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Probe timeout in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,

    /// Streams reported for every video in static mode
    #[serde(default)]
    pub static_streams: Vec<StreamDescriptor>,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            mode: InspectorMode::default(),
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_probe_timeout_secs(),
            static_streams: Vec::new(),
        }
    }
}

/// Stream extractor configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExtractorConfig {
    /// ffmpeg binary, looked up on PATH when bare
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Demux timeout in seconds
    #[serde(default = "default_demux_timeout_secs")]
    pub timeout_secs: u64,

    /// Caption format streams are converted to
    #[serde(default)]
    pub format: CaptionFormat,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            timeout_secs: default_demux_timeout_secs(),
            format: CaptionFormat::default(),
        }
    }
}

/// Ingestion worker pool configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JobsConfig {
    /// Number of videos ingested concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<&LogLevel> for log::LevelFilter {
    fn from(level: &LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    60
}

fn default_demux_timeout_secs() -> u64 {
    120 // subtitle demux has to read through the whole container
}

fn default_workers() -> usize {
    2
}

impl Config {
    /// Load the configuration file, writing a default one when it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {:?}", path))?;

            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;

            return Ok(config);
        }

        warn!("Config file not found at {:?}, creating default config.", path);

        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        let config_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;

        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {:?}", path))?;

        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.inspector.timeout_secs == 0 {
            return Err(anyhow!("inspector.timeout_secs must be greater than zero"));
        }
        if self.extractor.timeout_secs == 0 {
            return Err(anyhow!("extractor.timeout_secs must be greater than zero"));
        }
        if self.jobs.workers == 0 {
            return Err(anyhow!("jobs.workers must be greater than zero"));
        }

        match self.inspector.mode {
            InspectorMode::Ffprobe => {
                if self.inspector.ffprobe_path.trim().is_empty() {
                    return Err(anyhow!("inspector.ffprobe_path is required in ffprobe mode"));
                }
            }
            InspectorMode::Static => {
                if self.inspector.static_streams.is_empty() {
                    return Err(anyhow!("inspector.static_streams must list at least one stream in static mode"));
                }
            }
        }

        if self.extractor.ffmpeg_path.trim().is_empty() {
            return Err(anyhow!("extractor.ffmpeg_path is required"));
        }

        if let Some(code) = self.languages.names.keys().find(|code| code.trim().is_empty()) {
            return Err(anyhow!("languages.names contains a blank language code: {:?}", code));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: None,
            inspector: InspectorConfig::default(),
            extractor: ExtractorConfig::default(),
            languages: LanguageTable::default(),
            jobs: JobsConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
