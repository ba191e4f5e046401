/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for the video, language and subtitle
 * tables, abstracting away the SQL details and providing type-safe access.
 */

use anyhow::{anyhow, Result};
use log::{debug, warn};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::connection::{DatabaseConnection, DatabaseStats};
use super::models::{InsertReport, LanguageRecord, NewSubtitle, SubtitleRecord, VideoRecord};
use crate::caption_parser::timestamp_to_millis;

/// Attempts at a language get-or-create before giving up on a contended tag
const MAX_GET_OR_CREATE_ATTEMPTS: usize = 5;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Row counts and file size of the underlying database
    pub fn stats(&self) -> Result<DatabaseStats> {
        self.db.stats()
    }

    // =========================================================================
    // Video Operations
    // =========================================================================

    /// Register an uploaded video
    pub async fn create_video(&self, title: &str, file_path: &str) -> Result<VideoRecord> {
        let title = title.to_string();
        let file_path = file_path.to_string();
        let uploaded_at = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT INTO videos (title, file_path, uploaded_at) VALUES (?1, ?2, ?3)",
                    params![title, file_path, uploaded_at],
                )?;

                Ok(VideoRecord {
                    id: conn.last_insert_rowid(),
                    title,
                    file_path,
                    uploaded_at,
                })
            })
            .await
    }

    /// Get a video by ID
    pub async fn get_video(&self, video_id: i64) -> Result<Option<VideoRecord>> {
        self.db
            .execute_async(move |conn| {
                let video = conn
                    .query_row(
                        "SELECT id, title, file_path, uploaded_at FROM videos WHERE id = ?1",
                        [video_id],
                        parse_video_row,
                    )
                    .optional()?;
                Ok(video)
            })
            .await
    }

    /// List all videos, oldest first
    pub async fn list_videos(&self) -> Result<Vec<VideoRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, file_path, uploaded_at FROM videos ORDER BY id",
                )?;
                let videos = stmt
                    .query_map([], parse_video_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(videos)
            })
            .await
    }

    /// Delete a video and, through the cascade, all of its subtitles
    pub async fn delete_video(&self, video_id: i64) -> Result<bool> {
        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute("DELETE FROM videos WHERE id = ?1", [video_id])?;
                Ok(deleted > 0)
            })
            .await
    }

    // =========================================================================
    // Language Operations
    // =========================================================================

    /// Get a language by exact code
    pub async fn get_language(&self, code: &str) -> Result<Option<LanguageRecord>> {
        let code = code.to_string();

        self.db
            .execute_async(move |conn| Self::get_language_sync(conn, &code))
            .await
    }

    fn get_language_sync(conn: &Connection, code: &str) -> Result<Option<LanguageRecord>> {
        let language = conn
            .query_row(
                "SELECT id, code, name FROM languages WHERE code = ?1",
                [code],
                parse_language_row,
            )
            .optional()?;
        Ok(language)
    }

    /// Fetch the language with this code, creating it with `default_name` if absent.
    ///
    /// Safe against a concurrent writer creating the same code: a unique
    /// violation on insert means the other writer won, so the row is read back.
    pub async fn get_or_create_language(
        &self,
        code: &str,
        default_name: &str,
    ) -> Result<LanguageRecord> {
        let code = code.to_string();
        let default_name = default_name.to_string();

        self.db
            .execute_async(move |conn| {
                Self::get_or_create_language_sync(conn, &code, &default_name)
            })
            .await
    }

    fn get_or_create_language_sync(
        conn: &Connection,
        code: &str,
        default_name: &str,
    ) -> Result<LanguageRecord> {
        for attempt in 1..=MAX_GET_OR_CREATE_ATTEMPTS {
            if let Some(existing) = Self::get_language_sync(conn, code)? {
                return Ok(existing);
            }

            match conn.execute(
                "INSERT INTO languages (code, name) VALUES (?1, ?2)",
                params![code, default_name],
            ) {
                Ok(_) => {
                    debug!("Created language '{}' ({:?})", code, default_name);
                    return Ok(LanguageRecord {
                        id: conn.last_insert_rowid(),
                        code: code.to_string(),
                        name: default_name.to_string(),
                    });
                }
                Err(e) if is_unique_violation(&e) => {
                    debug!(
                        "Language '{}' was created concurrently (attempt {}), reading it back",
                        code, attempt
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!("Giving up on language '{}' after {} attempts", code, MAX_GET_OR_CREATE_ATTEMPTS);
        Err(anyhow!(
            "Could not get or create language '{}' after {} attempts",
            code,
            MAX_GET_OR_CREATE_ATTEMPTS
        ))
    }

    /// Set the name of a language whose name is still empty.
    ///
    /// Returns whether a row was updated. A name that is already set is kept.
    pub async fn backfill_language_name(&self, code: &str, name: &str) -> Result<bool> {
        let code = code.to_string();
        let name = name.to_string();

        self.db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    "UPDATE languages SET name = ?1 WHERE code = ?2 AND TRIM(name) = ''",
                    params![name, code],
                )?;
                Ok(updated > 0)
            })
            .await
    }

    /// Distinct languages that have subtitles for a video
    pub async fn video_languages(&self, video_id: i64) -> Result<Vec<LanguageRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT DISTINCT l.id, l.code, l.name
                    FROM languages l
                    JOIN subtitles s ON s.language_id = l.id
                    WHERE s.video_id = ?1
                    ORDER BY l.code
                    "#,
                )?;
                let languages = stmt
                    .query_map([video_id], parse_language_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(languages)
            })
            .await
    }

    // =========================================================================
    // Subtitle Operations
    // =========================================================================

    /// Insert subtitle cues in one transaction.
    ///
    /// A cue whose (video, language, start) is already stored, or appears
    /// earlier in the same batch, is dropped and counted as a duplicate; the
    /// rest of the batch is still written.
    pub async fn insert_subtitles(&self, subtitles: Vec<NewSubtitle>) -> Result<InsertReport> {
        if subtitles.is_empty() {
            return Ok(InsertReport::default());
        }

        self.db
            .transaction_async(move |tx| {
                let mut report = InsertReport::default();
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO subtitles (video_id, language_id, content, timestamp_start, timestamp_end)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(video_id, language_id, timestamp_start) DO NOTHING
                    "#,
                )?;

                for subtitle in subtitles {
                    let changed = stmt.execute(params![
                        subtitle.video_id,
                        subtitle.language_id,
                        subtitle.content,
                        subtitle.timestamp_start,
                        subtitle.timestamp_end,
                    ])?;

                    if changed == 0 {
                        debug!(
                            "Dropping duplicate cue for video {} language {} at {}",
                            subtitle.video_id, subtitle.language_id, subtitle.timestamp_start
                        );
                        report.duplicates += 1;
                    } else {
                        report.inserted += changed;
                    }
                }

                Ok(report)
            })
            .await
    }

    /// List a video's subtitles, optionally for one language code.
    ///
    /// Ordered by language code, then by start time parsed from the stored text.
    pub async fn list_subtitles(
        &self,
        video_id: i64,
        language: Option<&str>,
    ) -> Result<Vec<SubtitleRecord>> {
        let language = language.map(|l| l.trim().to_lowercase());

        let mut subtitles = self
            .db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT s.id, s.video_id, l.code, s.content, s.timestamp_start, s.timestamp_end
                    FROM subtitles s
                    JOIN languages l ON l.id = s.language_id
                    WHERE s.video_id = ?1 AND (?2 IS NULL OR l.code = ?2)
                    ORDER BY l.code, s.id
                    "#,
                )?;
                let subtitles = stmt
                    .query_map(params![video_id, language], parse_subtitle_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(subtitles)
            })
            .await?;

        subtitles.sort_by_cached_key(|s| {
            (
                s.language_code.clone(),
                timestamp_to_millis(&s.timestamp_start).unwrap_or(u64::MAX),
            )
        });

        Ok(subtitles)
    }

    /// Case-insensitive substring search over a video's subtitle text
    pub async fn search_subtitles(&self, video_id: i64, query: &str) -> Result<Vec<SubtitleRecord>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(anyhow!("Search term cannot be empty"));
        }

        let subtitles = self.list_subtitles(video_id, None).await?;
        Ok(subtitles
            .into_iter()
            .filter(|s| s.content.to_lowercase().contains(&needle))
            .collect())
    }
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn parse_video_row(row: &rusqlite::Row) -> rusqlite::Result<VideoRecord> {
    Ok(VideoRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        file_path: row.get(2)?,
        uploaded_at: row.get(3)?,
    })
}

fn parse_language_row(row: &rusqlite::Row) -> rusqlite::Result<LanguageRecord> {
    Ok(LanguageRecord {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
    })
}

fn parse_subtitle_row(row: &rusqlite::Row) -> rusqlite::Result<SubtitleRecord> {
    Ok(SubtitleRecord {
        id: row.get(0)?,
        video_id: row.get(1)?,
        language_code: row.get(2)?,
        content: row.get(3)?,
        timestamp_start: row.get(4)?,
        timestamp_end: row.get(5)?,
    })
}
