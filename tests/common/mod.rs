/*!
 * Common test utilities for the subingest test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use subingest::caption_parser::CaptionFormat;
use subingest::database::{Repository, VideoRecord};
use subingest::language_resolver::LanguageResolver;
use subingest::language_utils::LanguageTable;
use subingest::stream_extractor::StreamExtractor;
use subingest::stream_inspector::StreamSource;
use subingest::SubtitleIngestor;


/// Routes library logs to the test harness output, once per test binary
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a placeholder video file and registers it in the repository
pub async fn create_test_video(repo: &Repository, dir: &Path, filename: &str) -> Result<VideoRecord> {
    let path = create_test_file(dir, filename, "")?;
    repo.create_video(filename, &path.to_string_lossy()).await
}

/// Builds an ingestor over the given mocks with the default language table.
///
/// Captions are requested as WebVTT, the grammar `SAMPLE_CAPTION` is written in.
pub fn create_ingestor(
    repo: &Repository,
    source: Arc<dyn StreamSource>,
    demuxer: Arc<mock_media::CountingDemuxer>,
) -> SubtitleIngestor {
    init_test_logging();
    SubtitleIngestor::new(
        repo.clone(),
        source,
        LanguageResolver::new(repo.clone(), LanguageTable::default()),
        StreamExtractor::new(demuxer),
        CaptionFormat::WebVtt,
    )
}
