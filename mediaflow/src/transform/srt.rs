//! SubRip (`.srt`) subtitle parsing.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// A subtitle timestamp with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timecode {
    millis: u64,
}

impl Timecode {
    /// Creates a timecode from milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    /// Returns the timecode in milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.millis
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.millis % 1000;
        let total_secs = self.millis / 1000;
        write!(
            f,
            "{:02}:{:02}:{:02},{:03}",
            total_secs / 3600,
            (total_secs / 60) % 60,
            total_secs % 60,
            ms
        )
    }
}

/// A timecode string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid timecode: '{0}'")]
pub struct InvalidTimecode(pub String);

fn timecode_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(?:(\d+):)?(\d{1,2}):(\d{2})(?:[,.](\d{1,3}))?$").ok())
        .as_ref()
}

impl FromStr for Timecode {
    type Err = InvalidTimecode;

    /// Accepts `HH:MM:SS,mmm`, `HH:MM:SS.mmm`, `H:MM:SS` and `M:SS`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidTimecode(s.to_string());
        let caps = timecode_pattern()
            .and_then(|re| re.captures(s.trim()))
            .ok_or_else(invalid)?;

        let number = |i: usize| -> Result<u64, InvalidTimecode> {
            caps.get(i)
                .map_or(Ok(0), |m| m.as_str().parse().map_err(|_| invalid()))
        };
        let hours = number(1)?;
        let minutes = number(2)?;
        let seconds = number(3)?;
        if seconds >= 60 || (caps.get(1).is_some() && minutes >= 60) {
            return Err(invalid());
        }

        let millis = match caps.get(4) {
            Some(m) => {
                let digits = m.as_str();
                let value: u64 = digits.parse().map_err(|_| invalid())?;
                value * 10u64.pow(3 - u32::try_from(digits.len()).unwrap_or(3))
            }
            None => 0,
        };

        hours
            .checked_mul(60)
            .and_then(|m| m.checked_add(minutes))
            .and_then(|m| m.checked_mul(60))
            .and_then(|s| s.checked_add(seconds))
            .and_then(|s| s.checked_mul(1000))
            .and_then(|ms| ms.checked_add(millis))
            .map(Self::from_millis)
            .ok_or_else(invalid)
    }
}

/// One cue of a subtitle document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    /// Declared cue number.
    pub index: u32,
    /// When the cue appears.
    pub start_time: Timecode,
    /// When the cue disappears.
    pub end_time: Timecode,
    /// Cue text, possibly spanning several lines.
    pub text: String,
}

impl SubtitleEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(index: u32, start_time: Timecode, end_time: Timecode, text: impl Into<String>) -> Self {
        Self {
            index,
            start_time,
            end_time,
            text: text.into(),
        }
    }
}

/// A subtitle document with a broken block structure.
///
/// Blocks are numbered from 1 in document order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubtitleParseError {
    /// The first line of a block is not a cue number.
    #[error("Subtitle block {block}: invalid index line '{line}'")]
    InvalidIndex {
        /// Block number.
        block: usize,
        /// The offending line.
        line: String,
    },

    /// A block has no timing line.
    #[error("Subtitle block {block}: missing timing line")]
    MissingTiming {
        /// Block number.
        block: usize,
    },

    /// The timing line is not `start --> end`.
    #[error("Subtitle block {block}: invalid timing line '{line}'")]
    InvalidTiming {
        /// Block number.
        block: usize,
        /// The offending line.
        line: String,
    },

    /// The cue ends before it starts.
    #[error("Subtitle block {block}: end {end} is before start {start}")]
    EndBeforeStart {
        /// Block number.
        block: usize,
        /// Parsed start.
        start: Timecode,
        /// Parsed end.
        end: Timecode,
    },
}

fn parse_timing(block: usize, line: &str) -> Result<(Timecode, Timecode), SubtitleParseError> {
    let invalid = || SubtitleParseError::InvalidTiming {
        block,
        line: line.to_string(),
    };

    let (start, rest) = line.split_once("-->").ok_or_else(invalid)?;
    // Some encoders append cue settings after the end time.
    let end = rest.split_whitespace().next().ok_or_else(invalid)?;

    let start: Timecode = start.trim().parse().map_err(|_| invalid())?;
    let end: Timecode = end.parse().map_err(|_| invalid())?;
    if end < start {
        return Err(SubtitleParseError::EndBeforeStart { block, start, end });
    }
    Ok((start, end))
}

fn parse_block(block: usize, lines: &[&str]) -> Result<SubtitleEntry, SubtitleParseError> {
    let index_line = lines.first().map_or("", |l| l.trim());
    let index = index_line
        .parse()
        .map_err(|_| SubtitleParseError::InvalidIndex {
            block,
            line: index_line.to_string(),
        })?;

    let timing = lines
        .get(1)
        .ok_or(SubtitleParseError::MissingTiming { block })?;
    let (start_time, end_time) = parse_timing(block, timing)?;

    let text = lines.get(2..).unwrap_or_default().join("\n");
    Ok(SubtitleEntry::new(index, start_time, end_time, text))
}

/// Parses a SubRip document.
///
/// Blocks are separated by blank lines. Each block is a cue number, a
/// `start --> end` timing line and zero or more text lines. CRLF line
/// endings, bare CR line endings and a leading byte order mark are accepted.
pub fn parse_srt(content: &str) -> Result<Vec<SubtitleEntry>, SubtitleParseError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let content = content.replace("\r\n", "\n").replace('\r', "\n");

    let mut entries = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    for line in content.split('\n').chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if !block.is_empty() {
                entries.push(parse_block(entries.len() + 1, &block)?);
                block.clear();
            }
        } else {
            block.push(line);
        }
    }
    Ok(entries)
}
