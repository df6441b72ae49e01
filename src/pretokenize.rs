//! Regex pre-tokenization: splitting text into chunks before BPE
//!
//! Merges never cross a chunk boundary, so the split pattern decides which
//! byte neighbourhoods BPE is allowed to see. The GPT-2 and GPT-4 patterns
//! need Unicode categories, inline case-insensitivity, lookahead and
//! possessive quantifiers, all of which `fancy_regex` supports.

use crate::Error;
use fancy_regex::Regex;

/// GPT-2 split pattern.
pub const GPT2_SPLIT_PATTERN: &str =
    r"'(?:[sdmt]|ll|ve|re)| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// GPT-4 (cl100k) split pattern.
pub const GPT4_SPLIT_PATTERN: &str = r"'(?i:[sdmt]|ll|ve|re)|[^\r\n\p{L}\p{N}]?+\p{L}+|\p{N}{1,3}| ?[^\s\p{L}\p{N}]++[\r\n]*|\s*[\r\n]|\s+(?!\S)|\s+";

/// Built-in pattern selection: `basic` is no pattern at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPreset {
    Basic,
    Gpt2,
    Gpt4,
}

impl SplitPreset {
    pub fn pattern(self) -> &'static str {
        match self {
            SplitPreset::Basic => "",
            SplitPreset::Gpt2 => GPT2_SPLIT_PATTERN,
            SplitPreset::Gpt4 => GPT4_SPLIT_PATTERN,
        }
    }
}

/// A compiled split pattern, or the identity split when the pattern is
/// empty.
#[derive(Debug)]
pub struct Pretokenizer {
    pattern: String,
    regex: Option<Regex>,
}

impl Pretokenizer {
    /// No pattern: every input is a single chunk.
    pub fn identity() -> Self {
        Pretokenizer {
            pattern: String::new(),
            regex: None,
        }
    }

    /// Compile `pattern`, treating the empty string as the identity split.
    pub fn from_pattern(pattern: &str) -> Result<Self, Error> {
        if pattern.is_empty() {
            return Ok(Self::identity());
        }
        let regex = Regex::new(pattern)?;
        Ok(Pretokenizer {
            pattern: pattern.to_string(),
            regex: Some(regex),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Split `text` into the sequence of non-overlapping matches, in order.
    ///
    /// A zero-width match advances the scan by one character so degenerate
    /// patterns cannot loop forever.
    pub fn split<'t>(&self, text: &'t str) -> Result<Vec<&'t str>, Error> {
        let Some(regex) = &self.regex else {
            return Ok(vec![text]);
        };

        let mut chunks = Vec::new();
        let mut pos = 0;
        while pos <= text.len() {
            let Some(found) = regex.find_from_pos(text, pos)? else {
                break;
            };
            if found.start() == found.end() {
                pos = advance_one_char(text, found.end());
                continue;
            }
            chunks.push(&text[found.start()..found.end()]);
            pos = found.end();
        }
        Ok(chunks)
    }
}

fn advance_one_char(text: &str, pos: usize) -> usize {
    match text[pos..].chars().next() {
        Some(c) => pos + c.len_utf8(),
        // Past the last character; push the cursor off the end.
        None => text.len() + 1,
    }
}
