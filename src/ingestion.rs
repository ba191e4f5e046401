/*!
 * Subtitle ingestion for a single video.
 *
 * The ingestor walks a video through inspection, per-stream language
 * resolution, extraction and parsing, then commits every parsed cue in one
 * transaction. A stream that fails to extract or read is skipped; a probe or
 * database failure aborts the whole video.
 */

use log::{debug, error, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::caption_parser::{self, CaptionFormat};
use crate::database::{NewSubtitle, Repository};
use crate::errors::IngestError;
use crate::file_utils::FileManager;
use crate::language_resolver::LanguageResolver;
use crate::stream_extractor::{ExtractionOutcome, StreamExtractor};
use crate::stream_inspector::{stream_source_from_config, StreamDescriptor, StreamSource};

/// Steps of an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionState {
    Started,
    Inspecting,
    Resolving,
    Extracting,
    Parsing,
    Committing,
    Done,
    Aborted,
}

impl fmt::Display for IngestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Started => "started",
            Self::Inspecting => "inspecting",
            Self::Resolving => "resolving",
            Self::Extracting => "extracting",
            Self::Parsing => "parsing",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}

/// Summary of a finished ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub video_id: i64,
    pub final_state: IngestionState,
    /// Subtitle streams reported by the inspector
    pub streams_found: usize,
    /// Streams demuxed and parsed in this run
    pub streams_extracted: usize,
    /// Streams whose caption file already existed
    pub streams_skipped: usize,
    /// Streams dropped after an extraction or read failure
    pub streams_failed: usize,
    pub cues_parsed: usize,
    pub rows_inserted: usize,
    /// Cues dropped because their (video, language, start) was already stored
    pub duplicates_dropped: usize,
}

impl IngestionReport {
    fn new(video_id: i64) -> Self {
        Self {
            video_id,
            final_state: IngestionState::Started,
            streams_found: 0,
            streams_extracted: 0,
            streams_skipped: 0,
            streams_failed: 0,
            cues_parsed: 0,
            rows_inserted: 0,
            duplicates_dropped: 0,
        }
    }
}

impl fmt::Display for IngestionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "video {}: {} stream(s), {} extracted, {} skipped, {} failed, {} cue(s), {} inserted, {} duplicate(s)",
            self.video_id,
            self.streams_found,
            self.streams_extracted,
            self.streams_skipped,
            self.streams_failed,
            self.cues_parsed,
            self.rows_inserted,
            self.duplicates_dropped
        )
    }
}

/// Tracks the current state of one run and logs its transitions
struct IngestionRun {
    report: IngestionReport,
    /// Caption files written by this run, removed again if the run aborts
    extracted_files: Vec<PathBuf>,
}

impl IngestionRun {
    fn new(video_id: i64) -> Self {
        debug!("Video {}: {}", video_id, IngestionState::Started);
        Self {
            report: IngestionReport::new(video_id),
            extracted_files: Vec::new(),
        }
    }

    fn enter(&mut self, state: IngestionState) {
        debug!(
            "Video {}: {} -> {}",
            self.report.video_id, self.report.final_state, state
        );
        self.report.final_state = state;
    }

    fn remove_extracted_files(&self) {
        for path in &self.extracted_files {
            if let Err(e) = FileManager::remove_if_exists(path) {
                warn!("Video {}: could not remove {:?}: {:#}", self.report.video_id, path, e);
            }
        }
    }
}

/// Runs the ingestion pipeline for videos stored in the repository
#[derive(Clone)]
pub struct SubtitleIngestor {
    repository: Repository,
    inspector: Arc<dyn StreamSource>,
    resolver: LanguageResolver,
    extractor: StreamExtractor,
    format: CaptionFormat,
}

impl SubtitleIngestor {
    pub fn new(
        repository: Repository,
        inspector: Arc<dyn StreamSource>,
        resolver: LanguageResolver,
        extractor: StreamExtractor,
        format: CaptionFormat,
    ) -> Self {
        Self {
            repository,
            inspector,
            resolver,
            extractor,
            format,
        }
    }

    /// Wire the ingestor from configuration
    pub fn from_config(repository: Repository, config: &Config) -> Self {
        let resolver = LanguageResolver::new(repository.clone(), config.languages.clone());

        Self::new(
            repository,
            stream_source_from_config(&config.inspector),
            resolver,
            StreamExtractor::from_config(&config.extractor),
            config.extractor.format,
        )
    }

    /// Ingest the subtitles of one video.
    ///
    /// Re-running on a processed video does no tool work and inserts nothing,
    /// since every stream's caption file is already present. An aborted run
    /// removes the caption files it wrote, so a retry extracts them again.
    pub async fn ingest(&self, video_id: i64) -> Result<IngestionReport, IngestError> {
        let mut run = IngestionRun::new(video_id);

        match self.run(&mut run).await {
            Ok(()) => {
                run.enter(IngestionState::Done);
                info!("Ingestion finished, {}", run.report);
                Ok(run.report)
            }
            Err(e) => {
                let failed_in = run.report.final_state;
                run.enter(IngestionState::Aborted);
                error!("Ingestion of video {} aborted while {}: {}", video_id, failed_in, e);
                run.remove_extracted_files();
                Err(e)
            }
        }
    }

    async fn run(&self, run: &mut IngestionRun) -> Result<(), IngestError> {
        let video_id = run.report.video_id;

        let video = self
            .repository
            .get_video(video_id)
            .await?
            .ok_or(IngestError::VideoNotFound(video_id))?;
        let video_path = PathBuf::from(&video.file_path);

        run.enter(IngestionState::Inspecting);
        let streams = self.inspector.inspect(&video_path).await?;
        run.report.streams_found = streams.len();
        info!(
            "Video {}: found {} subtitle stream(s) in {:?}",
            video_id,
            streams.len(),
            video_path
        );

        let mut pending = Vec::new();
        for stream in &streams {
            self.ingest_stream(run, &video_path, stream, &mut pending).await?;
        }

        run.enter(IngestionState::Committing);
        let inserted = self.repository.insert_subtitles(pending).await?;
        run.report.rows_inserted = inserted.inserted;
        run.report.duplicates_dropped = inserted.duplicates;
        if inserted.duplicates > 0 {
            warn!("Video {}: {}", video_id, inserted);
        }

        Ok(())
    }

    async fn ingest_stream(
        &self,
        run: &mut IngestionRun,
        video_path: &Path,
        stream: &StreamDescriptor,
        pending: &mut Vec<NewSubtitle>,
    ) -> Result<(), IngestError> {
        let video_id = run.report.video_id;

        run.enter(IngestionState::Resolving);
        let language = self.resolver.resolve(&stream.language_tag).await?;

        if stream.is_bitmap() {
            warn!(
                "Video {}: stream {} uses picture codec {:?}, text conversion will likely fail",
                video_id, stream.index, stream.codec_name
            );
        }

        run.enter(IngestionState::Extracting);
        let caption_path = match self
            .extractor
            .extract(video_path, stream.index, &language.code, self.format)
            .await
        {
            ExtractionOutcome::Extracted(path) => path,
            ExtractionOutcome::Skipped(path) => {
                debug!("Video {}: stream {} already extracted to {:?}", video_id, stream.index, path);
                run.report.streams_skipped += 1;
                return Ok(());
            }
            ExtractionOutcome::Failed(e) if e.is_fatal() => return Err(e),
            ExtractionOutcome::Failed(e) => {
                error!("Video {}: skipping stream {}: {}", video_id, stream.index, e);
                run.report.streams_failed += 1;
                return Ok(());
            }
        };

        run.enter(IngestionState::Parsing);
        let caption_text = match tokio::fs::read(&caption_path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                let e = IngestError::from(e);
                error!(
                    "Video {}: skipping stream {}, cannot read {:?}: {}",
                    video_id, stream.index, caption_path, e
                );
                // An existing caption file marks its stream as done
                if let Err(cleanup) = FileManager::remove_if_exists(&caption_path) {
                    warn!("Video {}: could not remove {:?}: {:#}", video_id, caption_path, cleanup);
                }
                run.report.streams_failed += 1;
                return Ok(());
            }
        };
        run.extracted_files.push(caption_path);

        let cues = caption_parser::parse_as(&caption_text, self.format);
        debug!(
            "Video {}: stream {} ({}) yielded {} cue(s)",
            video_id,
            stream.index,
            language.code,
            cues.len()
        );

        run.report.streams_extracted += 1;
        run.report.cues_parsed += cues.len();
        pending.extend(cues.into_iter().map(|cue| {
            NewSubtitle::new(video_id, language.id, cue.text, cue.start, cue.end)
        }));

        Ok(())
    }
}
