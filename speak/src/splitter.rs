//! Sentence splitting for per-unit synthesis
//!
//! Splits a block of text into ordered, speakable units. Every unit is
//! trimmed and non-empty; text without sentence-terminal punctuation comes
//! back as a single unit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How text is broken into speech units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Break after sentence-terminal punctuation
    #[default]
    Punctuation,
    /// Break at line endings
    Newline,
    /// Speak the whole text as one unit
    None,
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SplitMode::Punctuation => "punctuation",
            SplitMode::Newline => "newline",
            SplitMode::None => "none",
        };
        f.write_str(name)
    }
}

impl FromStr for SplitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "punctuation" => Ok(SplitMode::Punctuation),
            "newline" => Ok(SplitMode::Newline),
            "none" => Ok(SplitMode::None),
            _ => Err(format!(
                "Unknown splitting mode: {}. Available: punctuation, newline, none",
                s
            )),
        }
    }
}

/// One sentence-scale fragment of an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechUnit {
    /// Position in playback order, starting at 0
    pub index: usize,
    pub text: String,
}

/// Split text into units and attach their playback indices
pub fn speech_units(text: &str, mode: SplitMode) -> Vec<SpeechUnit> {
    split(text, mode)
        .into_iter()
        .enumerate()
        .map(|(index, text)| SpeechUnit { index, text })
        .collect()
}

/// Split text into ordered, non-empty units.
///
/// Never fails. Empty or whitespace-only input yields no units, and text
/// without sentence-terminal punctuation is one unit in every mode.
pub fn split(text: &str, mode: SplitMode) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if !trimmed.chars().any(is_terminal) {
        return vec![trimmed.to_string()];
    }

    match mode {
        SplitMode::Punctuation => split_on_punctuation(trimmed),
        SplitMode::Newline => trimmed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        SplitMode::None => vec![trimmed.to_string()],
    }
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…' | '。' | '！' | '？')
}

/// Full-width terminators end a sentence even without trailing whitespace
fn is_wide_terminal(c: char) -> bool {
    matches!(c, '。' | '！' | '？')
}

/// Closing marks that belong to the sentence they follow
fn is_closing(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '”' | '’' | '」' | '』')
}

fn push_unit(units: &mut Vec<String>, fragment: &str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        units.push(trimmed.to_string());
    }
}

fn split_on_punctuation(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminal(c) {
            continue;
        }

        // Absorb runs like "?!", "..." and closing quotes after the terminator
        let mut end = i + c.len_utf8();
        let mut last_terminal = c;
        while let Some(&(j, next)) = chars.peek() {
            if is_terminal(next) {
                last_terminal = next;
            } else if !is_closing(next) {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }

        let at_boundary = match chars.peek() {
            None => true,
            Some(&(_, next)) => next.is_whitespace() || is_wide_terminal(last_terminal),
        };

        if at_boundary {
            push_unit(&mut units, &text[start..end]);
            start = end;
        }
    }

    push_unit(&mut units, &text[start..]);
    units
}
