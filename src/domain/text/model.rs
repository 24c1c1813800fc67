use std::fmt;
use std::ops::Range;

/// Where the document text came from before extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    PlainText,
    Markdown,
    Html,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::PlainText => "plain text",
            SourceFormat::Markdown => "markdown",
            SourceFormat::Html => "html",
        };
        f.write_str(name)
    }
}

/// Extracted document text, consumed once by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub source_format: SourceFormat,
}

impl Document {
    pub fn new(text: impl Into<String>, source_format: SourceFormat) -> Self {
        Self {
            text: text.into(),
            source_format,
        }
    }
}

/// A size-bounded slice of the normalized document.
///
/// `char_range` is measured in chars (Unicode scalar values), not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
    pub char_range: Range<usize>,
}

impl TextChunk {
    pub fn char_len(&self) -> usize {
        self.char_range.end - self.char_range.start
    }
}
