/*!
 * Integration tests for the subtitle ingestion workflow
 */

use anyhow::Result;
use std::sync::Arc;

use subingest::caption_parser::CaptionFormat;
use subingest::database::{DatabaseConnection, Repository};
use subingest::errors::IngestError;
use subingest::language_resolver::LanguageResolver;
use subingest::language_utils::LanguageTable;
use subingest::stream_extractor::StreamExtractor;
use subingest::stream_inspector::{StaticStreamSource, StreamDescriptor};
use subingest::{IngestionState, SubtitleIngestor};
use crate::common;
use crate::common::mock_media::{CountingDemuxer, CountingSource};

fn en_ru_streams() -> Vec<StreamDescriptor> {
    vec![StreamDescriptor::new(0, "en"), StreamDescriptor::new(1, "ru")]
}

/// Test that the sample caption lands as "Hello" and "World" for English
#[tokio::test]
async fn test_ingest_withEnAndRuStreams_shouldPersistHelloWorldForEnglish() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let repo = Repository::new_in_memory()?;
    let video = common::create_test_video(&repo, temp_dir.path(), "movie.mkv").await?;
    let demuxer = Arc::new(CountingDemuxer::new());
    let ingestor = common::create_ingestor(
        &repo,
        Arc::new(StaticStreamSource::new(en_ru_streams())),
        demuxer.clone(),
    );

    let report = ingestor.ingest(video.id).await?;

    assert_eq!(report.final_state, IngestionState::Done);
    assert_eq!(report.streams_found, 2);
    assert_eq!(report.streams_extracted, 2);
    assert_eq!(report.cues_parsed, 4);
    assert_eq!(report.rows_inserted, 4);
    assert_eq!(demuxer.calls(), 2);

    let english = repo.list_subtitles(video.id, Some("en")).await?;
    assert_eq!(english.len(), 2);
    assert_eq!(english[0].content, "Hello");
    assert_eq!(english[0].timestamp_start, "00:00:01.000");
    assert_eq!(english[0].timestamp_end, "00:00:02.000");
    assert_eq!(english[1].content, "World");
    assert_eq!(english[1].timestamp_start, "00:00:03.000");
    assert_eq!(english[1].timestamp_end, "00:00:04.000");

    let video_path = temp_dir.path().join("movie.mkv");
    assert!(StreamExtractor::output_path(&video_path, 0, CaptionFormat::WebVtt).exists());
    assert!(StreamExtractor::output_path(&video_path, 1, CaptionFormat::WebVtt).exists());

    Ok(())
}

/// Test that a second run over a processed video does nothing
#[tokio::test]
async fn test_ingest_twice_shouldInsertNothingAndInvokeNoTool() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let repo = Repository::new_in_memory()?;
    let video = common::create_test_video(&repo, temp_dir.path(), "movie.mkv").await?;
    let demuxer = Arc::new(CountingDemuxer::new());
    let ingestor = common::create_ingestor(
        &repo,
        Arc::new(StaticStreamSource::new(en_ru_streams())),
        demuxer.clone(),
    );

    ingestor.ingest(video.id).await?;
    let rows_after_first = repo.stats()?.subtitle_count;
    let calls_after_first = demuxer.calls();

    let second = ingestor.ingest(video.id).await?;

    assert_eq!(second.final_state, IngestionState::Done);
    assert_eq!(second.streams_skipped, 2);
    assert_eq!(second.streams_extracted, 0);
    assert_eq!(second.rows_inserted, 0);
    assert_eq!(demuxer.calls(), calls_after_first);
    assert_eq!(repo.stats()?.subtitle_count, rows_after_first);

    Ok(())
}

/// Test that an unknown video id aborts without touching anything
#[tokio::test]
async fn test_ingest_withUnknownVideo_shouldFailWithVideoNotFound() -> Result<()> {
    let repo = Repository::new_in_memory()?;
    let source = Arc::new(CountingSource::new(en_ru_streams()));
    let demuxer = Arc::new(CountingDemuxer::new());
    let ingestor = common::create_ingestor(&repo, source.clone(), demuxer.clone());

    let result = ingestor.ingest(404).await;

    assert!(matches!(result, Err(IngestError::VideoNotFound(404))));
    assert_eq!(source.calls(), 0);
    assert_eq!(demuxer.calls(), 0);
    assert_eq!(repo.stats()?.subtitle_count, 0);

    Ok(())
}

/// Test that a probe failure aborts the video
#[tokio::test]
async fn test_ingest_withProbeFailure_shouldAbortWithToolInvocation() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let repo = Repository::new_in_memory()?;
    let video = common::create_test_video(&repo, temp_dir.path(), "broken.mkv").await?;
    let demuxer = Arc::new(CountingDemuxer::new());
    let ingestor = common::create_ingestor(&repo, Arc::new(CountingSource::failing()), demuxer.clone());

    let result = ingestor.ingest(video.id).await;

    match result {
        Err(IngestError::ToolInvocation { tool, .. }) => assert_eq!(tool, "ffprobe"),
        other => panic!("expected ToolInvocation, got {:?}", other),
    }
    assert_eq!(demuxer.calls(), 0);
    assert_eq!(repo.stats()?.subtitle_count, 0);

    Ok(())
}

/// Test that one failing stream does not stop the others
#[tokio::test]
async fn test_ingest_withOneFailingStream_shouldPersistTheOthers() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let repo = Repository::new_in_memory()?;
    let video = common::create_test_video(&repo, temp_dir.path(), "movie.mkv").await?;
    let demuxer = Arc::new(CountingDemuxer::new().failing_on(0));
    let ingestor = common::create_ingestor(
        &repo,
        Arc::new(StaticStreamSource::new(en_ru_streams())),
        demuxer.clone(),
    );

    let report = ingestor.ingest(video.id).await?;

    assert_eq!(report.streams_failed, 1);
    assert_eq!(report.streams_extracted, 1);
    assert_eq!(report.rows_inserted, 2);
    assert!(repo.list_subtitles(video.id, Some("en")).await?.is_empty());
    assert_eq!(repo.list_subtitles(video.id, Some("ru")).await?.len(), 2);

    // The partial file was removed, so a retry tries the stream again
    let video_path = temp_dir.path().join("movie.mkv");
    assert!(!StreamExtractor::output_path(&video_path, 0, CaptionFormat::WebVtt).exists());
    ingestor.ingest(video.id).await?;
    assert_eq!(demuxer.calls(), 3);

    Ok(())
}

/// Test that a job aborted after extracting a stream extracts it again on retry
#[tokio::test]
async fn test_ingest_abortedAfterFirstStream_shouldReextractItOnRetry() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let db = DatabaseConnection::new_in_memory()?;
    let repo = Repository::new(db.clone());
    let video = common::create_test_video(&repo, temp_dir.path(), "movie.mkv").await?;
    let demuxer = Arc::new(CountingDemuxer::new());
    let ingestor = common::create_ingestor(
        &repo,
        Arc::new(StaticStreamSource::new(vec![
            StreamDescriptor::new(0, "eng"),
            StreamDescriptor::new(1, "fra"),
        ])),
        demuxer.clone(),
    );
    db.execute(|conn| {
        conn.execute_batch(
            "CREATE TRIGGER reject_fra BEFORE INSERT ON languages
             WHEN NEW.code = 'fra'
             BEGIN SELECT RAISE(ABORT, 'languages table is read-only'); END;",
        )?;
        Ok(())
    })?;

    let result = ingestor.ingest(video.id).await;

    assert!(matches!(result, Err(IngestError::Database(_))));
    assert_eq!(demuxer.calls(), 1);
    let video_path = temp_dir.path().join("movie.mkv");
    assert!(!StreamExtractor::output_path(&video_path, 0, CaptionFormat::WebVtt).exists());
    assert_eq!(repo.stats()?.subtitle_count, 0);

    db.execute(|conn| {
        conn.execute_batch("DROP TRIGGER reject_fra;")?;
        Ok(())
    })?;
    let retry = ingestor.ingest(video.id).await?;

    assert_eq!(retry.streams_skipped, 0);
    assert_eq!(retry.streams_extracted, 2);
    assert_eq!(demuxer.calls(), 3);
    assert_eq!(repo.list_subtitles(video.id, Some("eng")).await?.len(), 2);
    assert_eq!(repo.list_subtitles(video.id, Some("fra")).await?.len(), 2);

    Ok(())
}

/// Test that a failed commit removes the caption files of the run
#[tokio::test]
async fn test_ingest_withFailingCommit_shouldRemoveExtractedFiles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let db = DatabaseConnection::new_in_memory()?;
    let repo = Repository::new(db.clone());
    let video = common::create_test_video(&repo, temp_dir.path(), "movie.mkv").await?;
    let demuxer = Arc::new(CountingDemuxer::new());
    let ingestor = common::create_ingestor(
        &repo,
        Arc::new(StaticStreamSource::new(en_ru_streams())),
        demuxer.clone(),
    );
    db.execute(|conn| {
        conn.execute_batch(
            "CREATE TRIGGER reject_subtitles BEFORE INSERT ON subtitles
             BEGIN SELECT RAISE(ABORT, 'disk quota exceeded'); END;",
        )?;
        Ok(())
    })?;

    let result = ingestor.ingest(video.id).await;

    assert!(matches!(result, Err(IngestError::Database(_))));
    assert_eq!(demuxer.calls(), 2);
    let video_path = temp_dir.path().join("movie.mkv");
    for index in 0..2 {
        assert!(!StreamExtractor::output_path(&video_path, index, CaptionFormat::WebVtt).exists());
    }
    assert_eq!(repo.stats()?.subtitle_count, 0);

    db.execute(|conn| {
        conn.execute_batch("DROP TRIGGER reject_subtitles;")?;
        Ok(())
    })?;
    let retry = ingestor.ingest(video.id).await?;

    assert_eq!(retry.streams_extracted, 2);
    assert_eq!(retry.rows_inserted, 4);
    assert_eq!(demuxer.calls(), 4);

    Ok(())
}

/// Test that repeated start times keep the first cue and count the rest
#[tokio::test]
async fn test_ingest_withDuplicateStartTimes_shouldDropDuplicatesAndKeepSiblings() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let repo = Repository::new_in_memory()?;
    let video = common::create_test_video(&repo, temp_dir.path(), "movie.mkv").await?;
    let caption = "WEBVTT\n\n1\n00:00:01.000 --> 00:00:02.000\nFirst\n\n2\n00:00:01.000 --> 00:00:03.000\nSame start\n\n3\n00:00:05.000 --> 00:00:06.000\nLast\n";
    let demuxer = Arc::new(CountingDemuxer::new().with_caption(0, caption));
    let ingestor = common::create_ingestor(
        &repo,
        Arc::new(StaticStreamSource::new(vec![StreamDescriptor::new(0, "eng")])),
        demuxer,
    );

    let report = ingestor.ingest(video.id).await?;

    assert_eq!(report.cues_parsed, 3);
    assert_eq!(report.rows_inserted, 2);
    assert_eq!(report.duplicates_dropped, 1);
    let texts: Vec<String> = repo
        .list_subtitles(video.id, None)
        .await?
        .into_iter()
        .map(|s| s.content)
        .collect();
    assert_eq!(texts, vec!["First", "Last"]);

    Ok(())
}

/// Test that two streams sharing a tag both keep their own caption file
#[tokio::test]
async fn test_ingest_withSharedLanguageTag_shouldExtractBothStreams() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let repo = Repository::new_in_memory()?;
    let video = common::create_test_video(&repo, temp_dir.path(), "movie.mkv").await?;
    let demuxer = Arc::new(
        CountingDemuxer::new()
            .with_caption(0, "00:00:01.000 --> 00:00:02.000\nFull\n")
            .with_caption(1, "00:00:05.000 --> 00:00:06.000\n[door slams]\n"),
    );
    let ingestor = common::create_ingestor(
        &repo,
        Arc::new(StaticStreamSource::new(vec![
            StreamDescriptor::new(0, "eng"),
            StreamDescriptor::new(1, "ENG"),
        ])),
        demuxer.clone(),
    );

    let report = ingestor.ingest(video.id).await?;

    assert_eq!(demuxer.calls(), 2);
    assert_eq!(report.rows_inserted, 2);
    let languages = repo.video_languages(video.id).await?;
    assert_eq!(languages.len(), 1);
    assert_eq!(languages[0].code, "eng");
    assert_eq!(languages[0].name, "English");

    Ok(())
}

/// Test that deleting a video removes its subtitles
#[tokio::test]
async fn test_deleteVideo_afterIngest_shouldCascadeSubtitles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let repo = Repository::new_in_memory()?;
    let video = common::create_test_video(&repo, temp_dir.path(), "movie.mkv").await?;
    let other = common::create_test_video(&repo, temp_dir.path(), "other.mkv").await?;
    let ingestor = common::create_ingestor(
        &repo,
        Arc::new(StaticStreamSource::new(en_ru_streams())),
        Arc::new(CountingDemuxer::new()),
    );
    ingestor.ingest(video.id).await?;
    ingestor.ingest(other.id).await?;

    assert!(repo.delete_video(video.id).await?);

    assert!(repo.list_subtitles(video.id, None).await?.is_empty());
    assert_eq!(repo.list_subtitles(other.id, None).await?.len(), 4);
    assert_eq!(repo.search_subtitles(other.id, "hello").await?.len(), 2);

    Ok(())
}

/// Test that two jobs racing on an unseen tag share one language row
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ingest_concurrentJobsWithUnseenTag_shouldCreateOneLanguageRow() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let db_path = temp_dir.path().join("shared.db");

    let setup = Repository::new(DatabaseConnection::new(&db_path)?);
    let first_video = common::create_test_video(&setup, temp_dir.path(), "a.mkv").await?;
    let second_video = common::create_test_video(&setup, temp_dir.path(), "b.mkv").await?;

    let make_ingestor = || -> Result<SubtitleIngestor> {
        let repo = Repository::new(DatabaseConnection::new(&db_path)?);
        Ok(SubtitleIngestor::new(
            repo.clone(),
            Arc::new(StaticStreamSource::new(vec![StreamDescriptor::new(0, "tlh")])),
            LanguageResolver::new(repo, LanguageTable::default()),
            StreamExtractor::new(Arc::new(CountingDemuxer::new())),
            CaptionFormat::WebVtt,
        ))
    };
    let first = make_ingestor()?;
    let second = make_ingestor()?;

    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.ingest(first_video.id).await }),
        tokio::spawn(async move { second.ingest(second_video.id).await }),
    );
    a??;
    b??;

    let languages = setup.video_languages(first_video.id).await?;
    assert_eq!(languages.len(), 1);
    assert_eq!(setup.video_languages(second_video.id).await?, languages);
    assert_eq!(setup.stats()?.language_count, 1);

    Ok(())
}
