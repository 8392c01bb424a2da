//! Data types for documents, segments, passages and search results.

use std::fmt;
use std::ops::{Range, RangeInclusive};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// The closed set of formats the loader understands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Portable Document Format, one segment per page.
    Pdf,
    /// Plain UTF-8 text, one segment.
    Text,
    /// Markdown, one segment per header-delimited section.
    Markdown,
}

impl DocumentFormat {
    /// Infer the format from a file name's extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnsupportedFormat`] for anything other than
    /// `.pdf`, `.txt`, `.md` or `.markdown`.
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("pdf") => Ok(Self::Pdf),
            Some("txt") => Ok(Self::Text),
            Some("md" | "markdown") => Ok(Self::Markdown),
            _ => Err(RagError::UnsupportedFormat { file_name: file_name.to_string() }),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
            Self::Markdown => "markdown",
        };
        f.write_str(name)
    }
}

/// An uploaded file awaiting loading.
///
/// The bytes are moved into the loader and dropped once segments have been
/// extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// The file name as uploaded.
    pub name: String,
    /// The declared format.
    pub format: DocumentFormat,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl Document {
    /// Create a document with an explicit format.
    pub fn new(name: impl Into<String>, format: DocumentFormat, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), format, bytes }
    }

    /// Create a document, inferring the format from the file name.
    pub fn from_upload(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let format = DocumentFormat::from_file_name(&name)?;
        Ok(Self { name, format, bytes })
    }
}

/// An ordered unit of raw text extracted from a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    /// Name of the source document.
    pub document_name: String,
    /// Zero-based position in reading order.
    pub position: usize,
    /// Human-readable locator such as `page 3` or a markdown header path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// The extracted text.
    pub text: String,
}

/// A bounded chunk of text derived from one or more adjacent [`Segment`]s.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Passage {
    /// Zero-based position among the document's passages.
    pub index: usize,
    /// Name of the source document.
    pub document_name: String,
    /// The passage text.
    pub text: String,
    /// Character range within the concatenated segment text.
    pub char_range: Range<usize>,
    /// Positions of the first and last segment this passage draws from.
    pub segments: RangeInclusive<usize>,
}

/// A vector paired with the passage it was computed from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The embedding vector.
    pub vector: Vec<f32>,
    /// The originating passage, with its source metadata.
    pub passage: Passage,
}

impl IndexEntry {
    /// Pair a vector with its passage.
    pub fn new(vector: Vec<f32>, passage: Passage) -> Self {
        Self { vector, passage }
    }
}

/// A retrieved [`Passage`] paired with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved passage.
    pub passage: Passage,
    /// Cosine similarity in `[-1, 1]` (higher is more relevant).
    pub score: f32,
    /// Insertion position of the entry inside the index.
    pub position: usize,
}
