use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::ExtractorConfig;
use crate::caption_parser::CaptionFormat;
use crate::errors::IngestError;
use crate::file_utils::FileManager;

// @module: Demuxing subtitle streams to caption files

/// Tool that writes one subtitle stream of a video to a caption file
#[async_trait]
pub trait Demuxer: Send + Sync {
    async fn demux(
        &self,
        video_path: &Path,
        stream_index: usize,
        format: CaptionFormat,
        output_path: &Path,
    ) -> Result<(), IngestError>;
}

/// ffmpeg-backed demuxer
#[derive(Debug, Clone)]
pub struct FfmpegDemuxer {
    ffmpeg_path: String,
    timeout: Duration,
}

impl FfmpegDemuxer {
    pub fn new(ffmpeg_path: &str, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.to_string(),
            timeout,
        }
    }
}

impl Default for FfmpegDemuxer {
    fn default() -> Self {
        Self::new("ffmpeg", Duration::from_secs(120))
    }
}

#[async_trait]
impl Demuxer for FfmpegDemuxer {
    async fn demux(
        &self,
        video_path: &Path,
        stream_index: usize,
        format: CaptionFormat,
        output_path: &Path,
    ) -> Result<(), IngestError> {
        let failure = |message: String| IngestError::Extraction {
            video: video_path.to_path_buf(),
            stream_index,
            message,
        };

        let ffmpeg_future = Command::new(&self.ffmpeg_path)
            .args(["-nostdin", "-y", "-v", "error", "-i"])
            .arg(video_path)
            .args([
                "-map", &format!("0:s:{}", stream_index),
                "-f", format.ffmpeg_muxer(),
            ])
            .arg(output_path)
            .kill_on_drop(true)
            .output();

        let result = tokio::select! {
            result = ffmpeg_future => {
                result.map_err(|e| failure(format!("failed to execute ffmpeg: {}", e)))?
            },
            _ = tokio::time::sleep(self.timeout) => {
                return Err(failure(format!("ffmpeg timed out after {} seconds", self.timeout.as_secs())));
            }
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(failure(filter_ffmpeg_stderr(&stderr)));
        }

        Ok(())
    }
}

/// Result of extracting one stream
#[derive(Debug)]
pub enum ExtractionOutcome {
    /// The tool wrote a new caption file
    Extracted(PathBuf),
    /// A caption file was already present, nothing was run
    Skipped(PathBuf),
    /// Extraction failed, no file is left behind
    Failed(IngestError),
}

impl ExtractionOutcome {
    /// Caption file path, unless extraction failed
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Extracted(path) | Self::Skipped(path) => Some(path),
            Self::Failed(_) => None,
        }
    }
}

/// Idempotent per-stream caption extraction
#[derive(Clone)]
pub struct StreamExtractor {
    demuxer: Arc<dyn Demuxer>,
}

impl StreamExtractor {
    pub fn new(demuxer: Arc<dyn Demuxer>) -> Self {
        Self { demuxer }
    }

    /// Build an ffmpeg-backed extractor from configuration
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(Arc::new(FfmpegDemuxer::new(
            &config.ffmpeg_path,
            Duration::from_secs(config.timeout_secs),
        )))
    }

    /// Deterministic caption path for a stream: `<video>_stream_<index>.<ext>`
    pub fn output_path(video_path: &Path, stream_index: usize, format: CaptionFormat) -> PathBuf {
        let mut name = video_path.as_os_str().to_os_string();
        name.push(format!("_stream_{}.{}", stream_index, format.extension()));
        PathBuf::from(name)
    }

    /// Extract one stream unless its caption file already exists
    pub async fn extract(
        &self,
        video_path: &Path,
        stream_index: usize,
        language_tag: &str,
        format: CaptionFormat,
    ) -> ExtractionOutcome {
        let output_path = Self::output_path(video_path, stream_index, format);

        if output_path.exists() {
            debug!(
                "Caption file {:?} already exists, skipping stream {} ({})",
                output_path, stream_index, language_tag
            );
            return ExtractionOutcome::Skipped(output_path);
        }

        let result = self
            .demuxer
            .demux(video_path, stream_index, format, &output_path)
            .await
            .and_then(|()| {
                if output_path.is_file() {
                    Ok(())
                } else {
                    Err(IngestError::Extraction {
                        video: video_path.to_path_buf(),
                        stream_index,
                        message: "no caption file was produced".to_string(),
                    })
                }
            });

        match result {
            Ok(()) => {
                info!(
                    "Extracted stream {} ({}) of {:?} to {:?}",
                    stream_index, language_tag, video_path, output_path
                );
                ExtractionOutcome::Extracted(output_path)
            }
            Err(e) => {
                error!("{}", e);
                if let Err(cleanup) = FileManager::remove_if_exists(&output_path) {
                    warn!("Could not remove partial caption file: {:#}", cleanup);
                }
                ExtractionOutcome::Failed(e)
            }
        }
    }
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let noise_prefixes = [
        "ffmpeg version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Chapter",
        "Stream #",
        "title",
        "BPS",
        "DURATION",
        "NUMBER_OF",
        "_STATISTICS",
        "Output #",
        "Stream mapping:",
        "Press [q]",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !noise_prefixes.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}
