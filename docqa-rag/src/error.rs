//! Error types for the `docqa-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while ingesting a document or answering a question.
#[derive(Debug, Error)]
pub enum RagError {
    /// The file extension does not map to a supported [`DocumentFormat`](crate::DocumentFormat).
    #[error("Unsupported document format: '{file_name}' (expected .pdf, .txt or .md)")]
    UnsupportedFormat {
        /// The name of the rejected file.
        file_name: String,
    },

    /// The document bytes could not be decoded or parsed.
    #[error("Failed to load '{document}': {message}")]
    Load {
        /// The name of the document being loaded.
        document: String,
        /// A description of the failure.
        message: String,
    },

    /// Chunk size and overlap are inconsistent.
    #[error("Invalid chunk configuration: {0}")]
    InvalidChunkConfig(String),

    /// A transient embedding failure persisted through every retry attempt.
    #[error("Embedding unavailable ({provider}) after {attempts} attempt(s): {message}")]
    EmbeddingUnavailable {
        /// The embedder that produced the error.
        provider: String,
        /// How many attempts were made.
        attempts: u32,
        /// The last failure observed.
        message: String,
    },

    /// The embedding backend refused the request and retrying will not help.
    #[error("Embedding rejected ({provider}): {message}")]
    EmbeddingRejected {
        /// The embedder that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Ingestion produced no passages, so there is nothing to index.
    #[error("Document produced no indexable text")]
    EmptyCorpus,

    /// Vectors of different lengths were mixed in one index or query.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimensionality of the index.
        expected: usize,
        /// The dimensionality that was supplied.
        actual: usize,
    },

    /// The generator failed to produce an answer.
    #[error("Generation failed ({provider}): {message}")]
    Generation {
        /// The generator that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A question was asked before any document was ingested.
    #[error("No document has been ingested yet; upload a document first")]
    NotReady,

    /// The question was empty or whitespace only.
    #[error("Question must not be empty")]
    EmptyQuestion,

    /// The session was reset while this ingestion was running; its result was discarded.
    #[error("Session was reset during ingestion; the result was discarded")]
    Superseded,

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// A failure reported by an external model backend ([`Embedder`](crate::Embedder)
/// or [`Generator`](crate::Generator)).
///
/// The variant decides whether the call is worth repeating; see
/// [`ProviderError::is_retriable`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// The backend asked us to slow down.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The call did not complete within its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Network failure or a server-side (5xx) error.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the input itself.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The account has no quota left.
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Credentials were missing or refused.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-retriable failure, including malformed responses.
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Whether repeating the same call may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Timeout(_) | Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_are_retriable() {
        assert!(ProviderError::RateLimited("slow down".into()).is_retriable());
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_retriable());
        assert!(ProviderError::Unavailable("503".into()).is_retriable());
    }

    #[test]
    fn permanent_failures_are_not_retriable() {
        assert!(!ProviderError::InvalidInput("too long".into()).is_retriable());
        assert!(!ProviderError::QuotaExhausted("daily".into()).is_retriable());
        assert!(!ProviderError::Unauthorized("bad key".into()).is_retriable());
        assert!(!ProviderError::Other("garbage".into()).is_retriable());
    }
}
