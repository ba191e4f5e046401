use async_trait::async_trait;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::{InspectorConfig, InspectorMode};
use crate::errors::IngestError;
use crate::language_utils::normalize_tag;

// @module: Subtitle stream discovery inside media containers

const FFPROBE: &str = "ffprobe";

/// Subtitle codecs that are images and cannot be demuxed to a text format
const BITMAP_CODECS: &[&str] = &["hdmv_pgs_subtitle", "dvd_subtitle", "dvb_subtitle", "xsub"];

/// One subtitle stream of a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Ordinal among the subtitle streams, as addressed by `0:s:<index>`
    pub index: usize,

    /// Normalized language tag, "und" when the container has none
    #[serde(alias = "language", default = "unknown_tag")]
    pub language_tag: String,

    /// Codec reported by the probe
    #[serde(default)]
    pub codec_name: Option<String>,

    /// Absolute stream index within the container
    #[serde(default)]
    pub container_index: Option<usize>,
}

impl StreamDescriptor {
    pub fn new(index: usize, language_tag: &str) -> Self {
        Self {
            index,
            language_tag: normalize_tag(Some(language_tag)),
            codec_name: None,
            container_index: None,
        }
    }

    /// Whether the stream holds picture-based subtitles
    pub fn is_bitmap(&self) -> bool {
        self.codec_name
            .as_deref()
            .is_some_and(|codec| BITMAP_CODECS.contains(&codec))
    }
}

fn unknown_tag() -> String {
    normalize_tag(None)
}

/// Source of the subtitle stream list of a video
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// List subtitle streams in container order
    async fn inspect(&self, video_path: &Path) -> Result<Vec<StreamDescriptor>, IngestError>;
}

/// Build the stream source selected in configuration
pub fn stream_source_from_config(config: &InspectorConfig) -> Arc<dyn StreamSource> {
    match config.mode {
        InspectorMode::Ffprobe => Arc::new(FfprobeInspector::new(
            &config.ffprobe_path,
            Duration::from_secs(config.timeout_secs),
        )),
        InspectorMode::Static => Arc::new(StaticStreamSource::new(config.static_streams.clone())),
    }
}

/// Probe-backed stream inspector
#[derive(Debug, Clone)]
pub struct FfprobeInspector {
    ffprobe_path: String,
    timeout: Duration,
}

impl FfprobeInspector {
    pub fn new(ffprobe_path: &str, timeout: Duration) -> Self {
        Self {
            ffprobe_path: ffprobe_path.to_string(),
            timeout,
        }
    }

    fn failure(&self, video_path: &Path, message: impl Into<String>) -> IngestError {
        IngestError::ToolInvocation {
            tool: FFPROBE.to_string(),
            video: video_path.to_path_buf(),
            message: message.into(),
        }
    }
}

impl Default for FfprobeInspector {
    fn default() -> Self {
        Self::new(FFPROBE, Duration::from_secs(60))
    }
}

#[async_trait]
impl StreamSource for FfprobeInspector {
    async fn inspect(&self, video_path: &Path) -> Result<Vec<StreamDescriptor>, IngestError> {
        if !video_path.is_file() {
            return Err(self.failure(video_path, "video file not found"));
        }

        let ffprobe_future = Command::new(&self.ffprobe_path)
            .args([
                "-v", "error",
                "-select_streams", "s",
                "-show_entries", "stream=index,codec_type,codec_name:stream_tags=language",
                "-of", "json",
            ])
            .arg(video_path)
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            result = ffprobe_future => {
                result.map_err(|e| self.failure(video_path, format!("failed to execute: {}", e)))?
            },
            _ = tokio::time::sleep(self.timeout) => {
                return Err(self.failure(
                    video_path,
                    format!("timed out after {} seconds", self.timeout.as_secs()),
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("ffprobe failed for {:?}: {}", video_path, stderr.trim());
            return Err(self.failure(video_path, stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let streams = parse_ffprobe_output(&stdout)
            .map_err(|e| self.failure(video_path, format!("unparseable output: {}", e)))?;

        debug!("Found {} subtitle stream(s) in {:?}", streams.len(), video_path);
        Ok(streams)
    }
}

/// Fixed stream list, used when no probe tool is available
#[derive(Debug, Clone, Default)]
pub struct StaticStreamSource {
    streams: Vec<StreamDescriptor>,
}

impl StaticStreamSource {
    pub fn new(streams: Vec<StreamDescriptor>) -> Self {
        Self { streams }
    }
}

#[async_trait]
impl StreamSource for StaticStreamSource {
    async fn inspect(&self, _video_path: &Path) -> Result<Vec<StreamDescriptor>, IngestError> {
        Ok(self
            .streams
            .iter()
            .map(|s| StreamDescriptor {
                language_tag: normalize_tag(Some(s.language_tag.as_str())),
                ..s.clone()
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: usize,
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Parse probe JSON into subtitle stream descriptors, numbering them in container order
pub fn parse_ffprobe_output(json: &str) -> Result<Vec<StreamDescriptor>, serde_json::Error> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }

    let output: FfprobeOutput = serde_json::from_str(json)?;

    let descriptors = output
        .streams
        .into_iter()
        .filter(|s| {
            let is_subtitle = s.codec_type.as_deref().is_none_or(|t| t == "subtitle");
            if !is_subtitle {
                warn!("Ignoring non-subtitle stream {} from probe output", s.index);
            }
            is_subtitle
        })
        .enumerate()
        .map(|(ordinal, s)| StreamDescriptor {
            index: ordinal,
            language_tag: normalize_tag(s.tags.get("language").map(String::as_str)),
            codec_name: s.codec_name,
            container_index: Some(s.index),
        })
        .collect();

    Ok(descriptors)
}
