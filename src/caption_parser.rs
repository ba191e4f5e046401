/*!
 * Caption text parsing.
 *
 * Turns the text of an SRT or WebVTT caption file into an ordered list of cues.
 * Parsing is lenient: a malformed block is dropped and the rest of the file is
 * still returned, so one bad cue never aborts ingestion of a stream.
 */

use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timing separator shared by both grammars
const TIMING_ARROW: &str = "-->";

/// `[HH:]MM:SS[.mmm]` with either `.` or `,` before the fraction
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+):)?(\d{1,2}):(\d{2})(?:[.,](\d{1,3}))?$").unwrap()
});

/// A single timed caption unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// Start timestamp as written in the source file
    pub start: String,
    /// End timestamp as written in the source file
    pub end: String,
    /// Caption text, lines joined with single spaces
    pub text: String,
}

impl Cue {
    pub fn new(start: impl Into<String>, end: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            text: text.into(),
        }
    }

    /// Start time in milliseconds, if the timestamp is well formed
    pub fn start_millis(&self) -> Option<u64> {
        timestamp_to_millis(&self.start)
    }
}

/// Caption file grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptionFormat {
    /// SubRip: numbered entries separated by blank lines
    #[default]
    Srt,
    /// WebVTT: cues introduced by timing lines
    WebVtt,
}

impl CaptionFormat {
    /// File extension used for extracted caption files
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::WebVtt => "vtt",
        }
    }

    /// Muxer name understood by ffmpeg's `-f` option
    pub fn ffmpeg_muxer(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::WebVtt => "webvtt",
        }
    }
}

impl fmt::Display for CaptionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Srt => write!(f, "srt"),
            Self::WebVtt => write!(f, "webvtt"),
        }
    }
}

impl std::str::FromStr for CaptionFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "srt" | "subrip" => Ok(Self::Srt),
            "webvtt" | "vtt" => Ok(Self::WebVtt),
            _ => Err(anyhow::anyhow!("Invalid caption format: {}", s)),
        }
    }
}

/// Parse caption text, detecting its grammar from the content
pub fn parse(text: &str) -> Vec<Cue> {
    let format = detect_format(text);
    debug!("Parsing caption text as {}", format);
    parse_as(text, format)
}

/// Parse caption text with an explicit grammar
pub fn parse_as(text: &str, format: CaptionFormat) -> Vec<Cue> {
    match format {
        CaptionFormat::Srt => parse_srt(text),
        CaptionFormat::WebVtt => parse_webvtt(text),
    }
}

/// Guess the grammar of caption text.
///
/// A `WEBVTT` header, or a first non-empty line that is already a timing line
/// (headerless cue blocks), means WebVTT. Anything else is treated as SRT.
pub fn detect_format(text: &str) -> CaptionFormat {
    let first = text
        .lines()
        .map(|l| l.trim_start_matches('\u{FEFF}').trim())
        .find(|l| !l.is_empty());

    match first {
        Some(line) if line.starts_with("WEBVTT") => CaptionFormat::WebVtt,
        Some(line) if is_timing_line(line) => CaptionFormat::WebVtt,
        _ => CaptionFormat::Srt,
    }
}

/// Parse SRT text.
///
/// Each blank-line separated entry needs an index line, a timing line and at
/// least one text line; shorter entries are skipped.
pub fn parse_srt(text: &str) -> Vec<Cue> {
    let normalized = normalize_newlines(text);
    let mut cues = Vec::new();

    for (block_no, block) in split_blocks(&normalized).into_iter().enumerate() {
        if block.len() < 3 {
            trace!("Skipping SRT block {}: only {} line(s)", block_no + 1, block.len());
            continue;
        }

        let Some((start, end)) = split_timing(block[1]) else {
            trace!("Skipping SRT block {}: no timing line", block_no + 1);
            continue;
        };

        let content = join_text(&block[2..]);
        if content.is_empty() {
            continue;
        }

        cues.push(Cue::new(start, end, content));
    }

    cues
}

/// Parse WebVTT text.
///
/// Every timing line opens a cue; the non-empty lines up to the next timing
/// line form its text. Cue identifiers and `NOTE` blocks are not cue text.
pub fn parse_webvtt(text: &str) -> Vec<Cue> {
    let normalized = normalize_newlines(text);
    let lines: Vec<&str> = normalized
        .lines()
        .map(|l| l.trim_start_matches('\u{FEFF}').trim())
        .collect();

    let mut cues = Vec::new();
    let mut current: Option<(String, String, Vec<&str>)> = None;
    let mut in_note = false;

    for (i, line) in lines.iter().enumerate() {
        if is_timing_line(line) {
            if let Some(cue) = finish_cue(current.take()) {
                cues.push(cue);
            }
            in_note = false;
            current = split_timing(line).map(|(start, end)| (start, end, Vec::new()));
            continue;
        }

        if line.is_empty() {
            in_note = false;
            continue;
        }

        let block_start = i == 0 || lines[i - 1].is_empty();
        if block_start && (line.starts_with("NOTE") || line.starts_with("STYLE") || line.starts_with("REGION")) {
            in_note = true;
            continue;
        }
        if in_note {
            continue;
        }

        // A lone line opening a block right before a timing line is the next cue's identifier
        let next_is_timing = lines.get(i + 1).is_some_and(|next| is_timing_line(next));
        if block_start && next_is_timing {
            continue;
        }

        if let Some((_, _, text_lines)) = current.as_mut() {
            text_lines.push(*line);
        }
    }

    if let Some(cue) = finish_cue(current.take()) {
        cues.push(cue);
    }

    cues
}

/// Convert a caption timestamp to milliseconds.
///
/// Accepts `HH:MM:SS.mmm`, `HH:MM:SS,mmm`, `MM:SS.mmm` and `HH:MM:SS`.
pub fn timestamp_to_millis(timestamp: &str) -> Option<u64> {
    let caps = TIMESTAMP_REGEX.captures(timestamp.trim())?;

    let number = |i: usize| caps.get(i).map_or(Some(0), |m| m.as_str().parse::<u64>().ok());
    let hours = number(1)?;
    let minutes = number(2)?;
    let seconds = number(3)?;

    if minutes >= 60 || seconds >= 60 {
        return None;
    }

    // "5" means 500 ms, "05" means 50 ms
    let millis = match caps.get(4) {
        Some(f) => f.as_str().parse::<u64>().ok()? * 10u64.pow(3 - f.as_str().len() as u32),
        None => 0,
    };

    // The hour field is unbounded, so an absurd value yields None instead of wrapping
    hours
        .checked_mul(3_600_000)?
        .checked_add(minutes * 60_000 + seconds * 1_000 + millis)
}

fn is_timing_line(line: &str) -> bool {
    line.contains(TIMING_ARROW)
}

/// Split `start --> end [settings]` into its two timestamps
fn split_timing(line: &str) -> Option<(String, String)> {
    let (left, right) = line.split_once(TIMING_ARROW)?;
    let start = left.split_whitespace().next()?;
    let end = right.split_whitespace().next()?;
    Some((start.to_string(), end.to_string()))
}

fn finish_cue(current: Option<(String, String, Vec<&str>)>) -> Option<Cue> {
    let (start, end, lines) = current?;
    let text = join_text(&lines);
    if text.is_empty() {
        trace!("Dropping empty cue at {}", start);
        return None;
    }
    Some(Cue::new(start, end, text))
}

fn join_text(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Group lines into blank-line separated blocks
fn split_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in text.lines() {
        let line = line.trim_start_matches('\u{FEFF}').trim_end();
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}
