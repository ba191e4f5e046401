/*!
 * Database module for persistent storage of videos and their subtitles.
 *
 * This module provides SQLite-based persistence for:
 * - Uploaded videos
 * - Canonical languages keyed by tag
 * - Subtitle cues, unique per (video, language, start timestamp)
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::{DatabaseConnection, DatabaseStats};
pub use models::{InsertReport, LanguageRecord, NewSubtitle, SubtitleRecord, VideoRecord};
pub use repository::Repository;
