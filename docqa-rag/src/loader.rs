//! Turning uploaded bytes into ordered text [`Segment`]s.
//!
//! Dispatch is an exhaustive `match` on [`DocumentFormat`]:
//!
//! - [`DocumentFormat::Pdf`]: parsed in memory with `lopdf`, one segment per page
//! - [`DocumentFormat::Text`]: the whole file as one segment
//! - [`DocumentFormat::Markdown`]: one segment per header-delimited section

use std::time::Duration;

use tracing::{debug, error, info};

use crate::document::{Document, DocumentFormat, Segment};
use crate::error::{RagError, Result};

/// Extracts segments from documents, off the async executor and under a deadline.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    timeout: Duration,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(60) }
    }
}

impl DocumentLoader {
    /// Create a loader whose parsing is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Load a document into segments in reading order.
    ///
    /// Parsing runs on the blocking thread pool and never touches the disk.
    /// The document bytes are moved into the parser and dropped when it
    /// finishes, even if the deadline has already passed.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Load`] if the content cannot be parsed, if the
    /// parser panics or if parsing exceeds the configured deadline.
    pub async fn load(&self, document: Document) -> Result<Vec<Segment>> {
        let name = document.name.clone();
        let format = document.format;
        debug!(document.name = %name, %format, bytes = document.bytes.len(), "loading document");

        let task = tokio::task::spawn_blocking(move || load_segments(&document));
        let segments = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => {
                error!(document.name = %name, error = %join_error, "document parser aborted");
                return Err(RagError::Load {
                    document: name,
                    message: format!("parser aborted: {join_error}"),
                });
            }
            Err(_) => {
                error!(document.name = %name, timeout = ?self.timeout, "document parsing timed out");
                return Err(RagError::Load {
                    document: name,
                    message: format!("parsing exceeded {:?}", self.timeout),
                });
            }
        };

        info!(document.name = %name, %format, segment_count = segments.len(), "loaded document");
        Ok(segments)
    }
}

/// Synchronously extract segments from a document.
///
/// # Errors
///
/// Returns [`RagError::Load`] if the content cannot be parsed.
pub fn load_segments(document: &Document) -> Result<Vec<Segment>> {
    match document.format {
        DocumentFormat::Pdf => load_pdf(&document.name, &document.bytes),
        DocumentFormat::Text => load_text(&document.name, &document.bytes),
        DocumentFormat::Markdown => load_markdown(&document.name, &document.bytes),
    }
}

fn load_error(document: &str, message: impl Into<String>) -> RagError {
    RagError::Load { document: document.to_string(), message: message.into() }
}

fn decode_utf8(name: &str, bytes: &[u8]) -> Result<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| load_error(name, format!("content is not valid UTF-8: {e}")))
}

fn load_text(name: &str, bytes: &[u8]) -> Result<Vec<Segment>> {
    let text = decode_utf8(name, bytes)?;
    Ok(vec![Segment { document_name: name.to_string(), position: 0, label: None, text }])
}

fn load_pdf(name: &str, bytes: &[u8]) -> Result<Vec<Segment>> {
    let pdf = lopdf::Document::load_mem(bytes)
        .map_err(|e| load_error(name, format!("unreadable PDF: {e}")))?;

    let mut segments = Vec::new();
    for (position, page_number) in pdf.get_pages().into_keys().enumerate() {
        let text = pdf.extract_text(&[page_number]).map_err(|e| {
            load_error(name, format!("failed to extract text from page {page_number}: {e}"))
        })?;
        segments.push(Segment {
            document_name: name.to_string(),
            position,
            label: Some(format!("page {page_number}")),
            text,
        });
    }

    Ok(segments)
}

/// A markdown section with its header hierarchy and raw lines.
struct MarkdownSection {
    header_path: String,
    text: String,
}

/// Split markdown into sections at header lines.
///
/// Header lines stay in the section text so no content is dropped. Lines
/// inside fenced code blocks are never treated as headers.
fn parse_markdown_sections(text: &str) -> Vec<MarkdownSection> {
    let mut sections = Vec::new();
    let mut headers: Vec<String> = Vec::new();
    let mut current_header_path = String::new();
    let mut current_lines: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        }

        let level = trimmed.chars().take_while(|c| *c == '#').count();
        let is_header = !in_fence
            && (1..=6).contains(&level)
            && trimmed[level..].chars().next().is_none_or(char::is_whitespace);

        if is_header {
            if !current_lines.is_empty() {
                sections.push(MarkdownSection {
                    header_path: current_header_path.clone(),
                    text: current_lines.join("\n"),
                });
                current_lines.clear();
            }

            headers.truncate(level.saturating_sub(1));
            headers.push(trimmed[level..].trim().trim_end_matches('#').trim().to_string());
            current_header_path = headers.join(" > ");
        }

        current_lines.push(line);
    }

    if !current_lines.is_empty() {
        sections.push(MarkdownSection {
            header_path: current_header_path,
            text: current_lines.join("\n"),
        });
    }

    sections
}

fn load_markdown(name: &str, bytes: &[u8]) -> Result<Vec<Segment>> {
    let text = decode_utf8(name, bytes)?;

    let segments = parse_markdown_sections(&text)
        .into_iter()
        .map(|section| (section.header_path, section.text.trim().to_string()))
        .filter(|(_, text)| !text.is_empty())
        .enumerate()
        .map(|(position, (header_path, text))| Segment {
            document_name: name.to_string(),
            position,
            label: (!header_path.is_empty()).then_some(header_path),
            text,
        })
        .collect();

    Ok(segments)
}
