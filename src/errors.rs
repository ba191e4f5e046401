/*!
 * Error types for the subingest pipeline.
 *
 * This module contains the error taxonomy of subtitle ingestion,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while ingesting the subtitles of a video
#[derive(Error, Debug)]
pub enum IngestError {
    /// The video id is not present in the repository
    #[error("Video {0} does not exist")]
    VideoNotFound(i64),

    /// An external probe tool could not be run or returned garbage
    #[error("{tool} failed for {video:?}: {message}")]
    ToolInvocation {
        /// Tool name (e.g. "ffprobe")
        tool: String,
        /// Video the tool was run against
        video: PathBuf,
        /// Tool output or failure reason
        message: String,
    },

    /// Demuxing one subtitle stream failed
    #[error("Extraction of stream {stream_index} from {video:?} failed: {message}")]
    Extraction {
        /// Video the stream belongs to
        video: PathBuf,
        /// Subtitle stream ordinal
        stream_index: usize,
        /// Filtered tool output or failure reason
        message: String,
    },

    /// Persistence layer failure
    #[error("Database error: {0}")]
    Database(String),

    /// Reading or removing a caption file failed
    #[error("File error: {0}")]
    Io(String),
}

impl IngestError {
    /// Whether the error ends the whole ingestion job rather than a single stream
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Extraction { .. } | Self::Io(_))
    }
}

impl From<anyhow::Error> for IngestError {
    fn from(error: anyhow::Error) -> Self {
        Self::Database(format!("{:#}", error))
    }
}

impl From<std::io::Error> for IngestError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}
