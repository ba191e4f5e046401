/*!
 * # subingest - Subtitle extraction and ingestion
 *
 * A Rust library that pulls the embedded subtitle streams out of uploaded
 * video files and stores them as searchable, timed caption records.
 *
 * ## Features
 *
 * - Discover subtitle streams with ffprobe (or a static stream list)
 * - Demux each stream to an SRT or WebVTT file with ffmpeg, skipping
 *   streams whose caption file already exists
 * - Parse SRT and WebVTT captions into cues
 * - Resolve language tags to canonical language records
 * - Persist cues in SQLite, dropping duplicates by start time
 * - Background ingestion through a worker pool
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `caption_parser`: SRT and WebVTT parsing
 * - `language_utils`: Language tag normalization and name table
 * - `language_resolver`: Tag to language record resolution
 * - `stream_inspector`: Subtitle stream discovery
 * - `stream_extractor`: Idempotent stream demuxing
 * - `ingestion`: Per-video ingestion pipeline
 * - `jobs`: Ingestion queue and worker pool
 * - `database`: SQLite schema, connection and repository
 * - `file_utils`: File system operations
 * - `errors`: Custom error types for the pipeline
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod caption_parser;
pub mod database;
pub mod errors;
pub mod file_utils;
pub mod ingestion;
pub mod jobs;
pub mod language_resolver;
pub mod language_utils;
pub mod stream_extractor;
pub mod stream_inspector;

// Re-export main types for easier usage
pub use app_config::Config;
pub use caption_parser::{CaptionFormat, Cue};
pub use database::Repository;
pub use errors::IngestError;
pub use ingestion::{IngestionReport, IngestionState, SubtitleIngestor};
pub use jobs::{IngestionQueue, JobId, JobOutcome};
pub use language_resolver::LanguageResolver;
pub use stream_extractor::{ExtractionOutcome, StreamExtractor};
pub use stream_inspector::{StreamDescriptor, StreamSource};
