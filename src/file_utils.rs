use anyhow::{Result, Context, anyhow};
use log::debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// @module: File and directory utilities

// @const: Extensions accepted for upload
const UPLOAD_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi"];

// @const: Video extensions picked up when scanning directories
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v",
    "mpg", "mpeg", "ogv", "ts", "mts", "m2ts",
];

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_dir()
    }

    /// Lowercased extension of a path, if any
    fn extension_of(path: &Path) -> Option<String> {
        path.extension().map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Whether the file type is accepted for upload (.mp4, .mkv, .avi)
    pub fn is_supported_upload<P: AsRef<Path>>(path: P) -> bool {
        Self::extension_of(path.as_ref())
            .is_some_and(|ext| UPLOAD_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Reject files whose type is not accepted for upload
    pub fn validate_upload<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();

        if !Self::file_exists(path) {
            return Err(anyhow!("File does not exist: {:?}", path));
        }
        if !Self::is_supported_upload(path) {
            return Err(anyhow!(
                "Unsupported file type: {:?}. Allowed types: {}",
                path,
                UPLOAD_EXTENSIONS.join(", ")
            ));
        }

        Ok(())
    }

    /// Whether the extension belongs to a common video container
    pub fn is_video_file<P: AsRef<Path>>(path: P) -> bool {
        Self::extension_of(path.as_ref())
            .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Find uploadable video files under a directory, sorted by path
    pub fn find_videos<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }
            if Self::is_supported_upload(path) {
                result.push(path.to_path_buf());
            } else if Self::is_video_file(path) {
                debug!("Skipping video with unsupported upload type: {:?}", path);
            }
        }

        result.sort();
        Ok(result)
    }

    /// Remove a file, treating an already missing file as success.
    ///
    /// Returns whether a file was removed.
    pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> Result<bool> {
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove file: {:?}", path.as_ref())),
        }
    }

    /// Title derived from a file name, used when none is given at upload
    pub fn title_from_path<P: AsRef<Path>>(path: P) -> String {
        path.as_ref()
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .filter(|stem| !stem.trim().is_empty())
            .unwrap_or_else(|| "Untitled".to_string())
    }
}
