/*!
 * Database entity models.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Uploaded video record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoRecord {
    /// Database ID
    pub id: i64,
    /// Display title
    pub title: String,
    /// Path of the stored media file
    pub file_path: String,
    /// Upload timestamp (RFC 3339)
    pub uploaded_at: String,
}

/// Canonical language record, keyed by code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguageRecord {
    /// Database ID
    pub id: i64,
    /// Language tag (e.g. "en", "eng", "und")
    pub code: String,
    /// Display name, empty when unknown
    pub name: String,
}

impl LanguageRecord {
    /// Whether the display name still needs to be filled in
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

impl fmt::Display for LanguageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_name() {
            write!(f, "{} ({})", self.name, self.code)
        } else {
            write!(f, "{}", self.code)
        }
    }
}

/// Stored subtitle cue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubtitleRecord {
    /// Database ID
    pub id: i64,
    /// Owning video
    pub video_id: i64,
    /// Language code of the cue
    pub language_code: String,
    /// Caption text
    pub content: String,
    /// Start timestamp as written in the caption file
    pub timestamp_start: String,
    /// End timestamp as written in the caption file
    pub timestamp_end: String,
}

/// Subtitle cue waiting to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubtitle {
    pub video_id: i64,
    pub language_id: i64,
    pub content: String,
    pub timestamp_start: String,
    pub timestamp_end: String,
}

impl NewSubtitle {
    pub fn new(
        video_id: i64,
        language_id: i64,
        content: String,
        timestamp_start: String,
        timestamp_end: String,
    ) -> Self {
        Self {
            video_id,
            language_id,
            content,
            timestamp_start,
            timestamp_end,
        }
    }
}

/// Outcome of a batch subtitle insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertReport {
    /// Rows written
    pub inserted: usize,
    /// Rows dropped because (video, language, start) was already taken
    pub duplicates: usize,
}

impl fmt::Display for InsertReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} inserted, {} duplicate(s) dropped", self.inserted, self.duplicates)
    }
}
