//! Assembles subtitle entries into plain prose.

use regex::Regex;
use std::sync::OnceLock;

use super::SubtitleEntry;

/// Paragraph width used by [`ExtractOptions::cleaned`].
pub const DEFAULT_PARAGRAPH_WIDTH: usize = 500;

/// Optional cleanup applied by [`extract_with`].
///
/// The default leaves text untouched apart from line collapsing, which is
/// what [`extract`] does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Remove tags, style codes, speaker labels and sound cues.
    pub strip_markup: bool,
    /// Break paragraphs at the first sentence end after this many characters.
    pub paragraph_width: Option<usize>,
}

impl ExtractOptions {
    /// Markup stripping plus paragraphs of [`DEFAULT_PARAGRAPH_WIDTH`].
    #[must_use]
    pub fn cleaned() -> Self {
        Self {
            strip_markup: true,
            paragraph_width: Some(DEFAULT_PARAGRAPH_WIDTH),
        }
    }

    /// Enables or disables markup stripping.
    #[must_use]
    pub fn with_strip_markup(mut self, strip: bool) -> Self {
        self.strip_markup = strip;
        self
    }

    /// Sets the paragraph width.
    #[must_use]
    pub fn with_paragraph_width(mut self, width: usize) -> Self {
        self.paragraph_width = Some(width);
        self
    }
}

fn markup_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"<[^>]+>",
            r"\{[^}]+\}",
            r"(?m)^\s*Speaker \d+:\s*",
            r"\[.*?\]",
            r"\(.*?\)",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn strip_markup(text: &str) -> String {
    let mut stripped = text.to_string();
    for re in markup_patterns() {
        stripped = re.replace_all(&stripped, "").into_owned();
    }
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trims the text and joins its lines with single spaces.
fn collapse_lines(text: &str) -> String {
    text.split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn add_paragraph_breaks(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }

    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut length = 0;
    for word in text.split_whitespace() {
        current.push(word);
        length += word.chars().count() + 1;
        if length >= width && word.ends_with(['.', '!', '?']) {
            paragraphs.push(current.join(" "));
            current.clear();
            length = 0;
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs.join("\n\n")
}

/// Extracts the spoken text of a subtitle document.
///
/// Entries are taken in the given order. Each entry's text is trimmed and
/// its lines are joined with a single space; entries are joined with a
/// single space and empty entries are skipped. Indices and timestamps are
/// discarded. Repeated text is kept as is.
///
/// ```
/// use mediaflow::transform::{extract, SubtitleEntry, Timecode};
///
/// let entries = vec![
///     SubtitleEntry::new(1, Timecode::from_millis(0), Timecode::from_millis(3_000), "Welcome to the course."),
///     SubtitleEntry::new(2, Timecode::from_millis(3_000), Timecode::from_millis(7_000), "Today we cover OSPF routing."),
/// ];
/// assert_eq!(extract(&entries), "Welcome to the course. Today we cover OSPF routing.");
/// ```
#[must_use]
pub fn extract(entries: &[SubtitleEntry]) -> String {
    extract_with(entries, &ExtractOptions::default())
}

/// Extracts text with optional cleanup.
#[must_use]
pub fn extract_with(entries: &[SubtitleEntry], options: &ExtractOptions) -> String {
    let pieces: Vec<String> = entries
        .iter()
        .map(|entry| {
            if options.strip_markup {
                strip_markup(&entry.text)
            } else {
                collapse_lines(&entry.text)
            }
        })
        .filter(|piece| !piece.is_empty())
        .collect();

    let text = pieces.join(" ");
    match options.paragraph_width {
        Some(width) if width > 0 => add_paragraph_breaks(&text, width),
        _ => text,
    }
}
