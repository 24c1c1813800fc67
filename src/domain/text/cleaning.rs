use regex::Regex;
use std::sync::OnceLock;

/// Minimum number of non-blank characters worth sending to synthesis
pub const MIN_SPEAKABLE_CHARS: usize = 10;

/// Rough speaking pace used for duration estimates
const CHARS_PER_SECOND: f64 = 15.0;

fn ellipsis_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\.{4,}").expect("ellipsis pattern is valid"))
}

fn repeated_exclamation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"!{2,}").expect("exclamation pattern is valid"))
}

fn repeated_question_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\?{2,}").expect("question pattern is valid"))
}

/// Prepare chunk text for a synthesis request.
///
/// Collapses whitespace and repeated punctuation, then drops symbols the voice service
/// cannot pronounce. Only the request payload is affected; chunk boundaries never move.
/// The result is never longer than `text`, so a chunk within the size limit stays within it.
pub fn clean_for_synthesis(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let collapsed = ellipsis_pattern().replace_all(&collapsed, "...");
    let collapsed = repeated_exclamation_pattern().replace_all(&collapsed, "!");
    let collapsed = repeated_question_pattern().replace_all(&collapsed, "?");

    let cleaned: String = collapsed.chars().filter(|c| is_pronounceable(*c)).collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_pronounceable(c: char) -> bool {
    c.is_alphanumeric()
        || c.is_whitespace()
        || matches!(
            c,
            '_' | '.' | ',' | '!' | '?' | ';' | ':' | '(' | ')' | '-' | '—' | '–' | '"' | '“'
                | '”' | '«' | '»' | '\''
        )
}

/// Whether the text carries enough content to be worth synthesizing
pub fn validate_for_processing(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.chars().count() >= MIN_SPEAKABLE_CHARS && trimmed.chars().any(char::is_alphabetic)
}

/// Expected number of chunks, padded for boundary slack
pub fn estimate_chunk_count(text: &str, max_chunk_size: usize) -> usize {
    if max_chunk_size == 0 {
        return 0;
    }
    let chars = text.chars().count();
    let base = chars.div_ceil(max_chunk_size);
    (base * 6 / 5).max(1)
}

/// Approximate spoken duration in seconds
pub fn estimate_duration_secs(text: &str) -> f64 {
    text.chars().count() as f64 / CHARS_PER_SECOND
}
