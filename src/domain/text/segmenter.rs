use super::error::SegmentationError;
use super::model::TextChunk;

/// Default per-request character limit of the synthesis service
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 4500;

/// Boundary search looks back at most `max_size / LOOKBACK_DIVISOR` chars from the limit
const LOOKBACK_DIVISOR: usize = 5;

/// Closing marks allowed between a sentence terminator and the following whitespace
const SENTENCE_CLOSERS: [char; 7] = ['"', '\'', ')', ']', '»', '”', '’'];

/// Splits normalized text into ordered chunks no longer than `max_chunk_size` chars
#[derive(Debug, Clone)]
pub struct TextSegmenter {
    max_chunk_size: usize,
}

impl TextSegmenter {
    pub fn new(max_chunk_size: usize) -> Result<Self, SegmentationError> {
        if max_chunk_size == 0 {
            return Err(SegmentationError::InvalidMaxSize);
        }
        Ok(Self { max_chunk_size })
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Normalize `text` and split it into chunks.
    ///
    /// Concatenating the chunk texts reproduces `normalize(text)` exactly.
    pub fn segment(&self, text: &str) -> Vec<TextChunk> {
        let normalized = normalize(text);
        split_normalized(&normalized, self.max_chunk_size)
    }
}

/// Segment `text` with a one-off limit
pub fn segment(text: &str, max_size: usize) -> Result<Vec<TextChunk>, SegmentationError> {
    Ok(TextSegmenter::new(max_size)?.segment(text))
}

/// Canonical whitespace form used for chunking and for resume keys.
///
/// Line endings become `\n`, runs of spaces and tabs collapse to one space, every line is
/// trimmed, blank-line runs collapse to a single empty line and the whole text is trimmed.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut normalized = String::with_capacity(unified.len());
    let mut blank_lines = 0usize;

    for line in unified.split('\n') {
        let line = collapse_blanks(line);
        if line.is_empty() {
            blank_lines += 1;
            continue;
        }
        if !normalized.is_empty() {
            normalized.push_str(if blank_lines > 0 { "\n\n" } else { "\n" });
        }
        normalized.push_str(&line);
        blank_lines = 0;
    }

    normalized
}

fn collapse_blanks(line: &str) -> String {
    let collapsed = line
        .split([' ', '\t'])
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    collapsed.trim().to_string()
}

fn split_normalized(text: &str, max_size: usize) -> Vec<TextChunk> {
    let chars: Vec<char> = text.chars().collect();
    let lookback = (max_size / LOOKBACK_DIVISOR).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = if chars.len() - start <= max_size {
            chars.len()
        } else {
            find_cut(&chars, start, max_size, lookback)
        };

        chunks.push(TextChunk {
            index: chunks.len(),
            text: chars[start..end].iter().collect(),
            char_range: start..end,
        });
        start = end;
    }

    chunks
}

/// Pick the end (exclusive) of the chunk starting at `start`.
///
/// Candidates sit right after a whitespace run, so boundary whitespace trails the earlier chunk.
/// Caller guarantees `start + max_size < chars.len()`.
fn find_cut(chars: &[char], start: usize, max_size: usize, lookback: usize) -> usize {
    let limit = start + max_size;
    let floor = limit.saturating_sub(lookback).max(start + 1);

    let mut sentence_cut = None;
    let mut word_cut = None;

    for cut in (floor..=limit).rev() {
        if !chars[cut - 1].is_whitespace() || chars[cut].is_whitespace() {
            continue;
        }
        if is_paragraph_break(chars, start, cut) {
            return cut;
        }
        if sentence_cut.is_none() && is_sentence_end(chars, start, cut) {
            sentence_cut = Some(cut);
        }
        if word_cut.is_none() {
            word_cut = Some(cut);
        }
    }

    sentence_cut.or(word_cut).unwrap_or(limit)
}

fn is_paragraph_break(chars: &[char], start: usize, cut: usize) -> bool {
    cut >= start + 2 && chars[cut - 1] == '\n' && chars[cut - 2] == '\n'
}

fn is_sentence_end(chars: &[char], start: usize, cut: usize) -> bool {
    let mut pos = cut;
    while pos > start && chars[pos - 1].is_whitespace() {
        pos -= 1;
    }
    while pos > start && SENTENCE_CLOSERS.contains(&chars[pos - 1]) {
        pos -= 1;
    }
    pos > start && matches!(chars[pos - 1], '.' | '!' | '?' | '…')
}
