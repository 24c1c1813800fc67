//! Input document loading: plain text, Markdown and HTML files become a [`Document`].

use crate::domain::text::{Document, SourceFormat};
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("input file not found: {0}")]
    NotFound(PathBuf),
    #[error("unsupported input file type `{extension}` for {path} (expected .txt, .md, .markdown, .html or .htm)")]
    Unsupported { path: PathBuf, extension: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is not valid UTF-8 text")]
    Encoding(PathBuf),
}

/// Pick the source format from the file extension
pub fn detect_format(path: &Path) -> Result<SourceFormat, DocumentError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "text" => Ok(SourceFormat::PlainText),
        "md" | "markdown" => Ok(SourceFormat::Markdown),
        "html" | "htm" => Ok(SourceFormat::Html),
        _ => Err(DocumentError::Unsupported {
            path: path.to_path_buf(),
            extension,
        }),
    }
}

pub async fn load_document(path: &Path) -> Result<Document, DocumentError> {
    let source_format = detect_format(path)?;

    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => DocumentError::NotFound(path.to_path_buf()),
        _ => DocumentError::Read {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
    let raw = std::str::from_utf8(bytes).map_err(|_| DocumentError::Encoding(path.to_path_buf()))?;

    let text = match source_format {
        SourceFormat::PlainText => raw.to_string(),
        SourceFormat::Markdown => strip_markdown(raw),
        SourceFormat::Html => html_to_text(raw),
    };

    tracing::debug!(
        path = %path.display(),
        source_format = %source_format,
        original_length = raw.len(),
        extracted_length = text.len(),
        "Document loaded"
    );

    Ok(Document::new(text, source_format))
}

struct MarkdownPatterns {
    code_fence: Regex,
    image: Regex,
    link: Regex,
    heading: Regex,
    bold: Regex,
    italic: Regex,
    inline_code: Regex,
    bullet: Regex,
    numbered: Regex,
}

fn markdown_patterns() -> &'static MarkdownPatterns {
    static PATTERNS: OnceLock<MarkdownPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| MarkdownPatterns {
        code_fence: Regex::new(r"(?s)```.*?```").expect("code fence pattern is valid"),
        image: Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("image pattern is valid"),
        link: Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("link pattern is valid"),
        heading: Regex::new(r"(?m)^#{1,6}\s+").expect("heading pattern is valid"),
        bold: Regex::new(r"\*\*([^*]+)\*\*|__([^_]+)__").expect("bold pattern is valid"),
        italic: Regex::new(r"\*([^*\n]+)\*|\b_([^_\n]+)_\b").expect("italic pattern is valid"),
        inline_code: Regex::new(r"`([^`]+)`").expect("inline code pattern is valid"),
        bullet: Regex::new(r"(?m)^[ \t]*[-*+][ \t]+").expect("bullet pattern is valid"),
        numbered: Regex::new(r"(?m)^[ \t]*\d+\.[ \t]+").expect("numbered list pattern is valid"),
    })
}

/// Drop Markdown markup, keeping the readable text
pub fn strip_markdown(content: &str) -> String {
    let p = markdown_patterns();
    let text = p.code_fence.replace_all(content, "");
    let text = p.image.replace_all(&text, "$1");
    let text = p.link.replace_all(&text, "$1");
    let text = p.heading.replace_all(&text, "");
    let text = p.bullet.replace_all(&text, "");
    let text = p.numbered.replace_all(&text, "");
    let text = p.bold.replace_all(&text, "$1$2");
    let text = p.italic.replace_all(&text, "$1$2");
    let text = p.inline_code.replace_all(&text, "$1");
    text.trim().to_string()
}

/// Render HTML to plain text without line wrapping
pub fn html_to_text(content: &str) -> String {
    html2text::from_read(content.as_bytes(), usize::MAX)
}
