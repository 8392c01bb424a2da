//! Configuration for ingestion, embedding and question answering.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Retry behaviour for transient embedding failures.
///
/// Delays grow exponentially from `base_delay_ms` and are capped at
/// `max_delay_ms`. `max_attempts` counts the first call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 500, max_delay_ms: 8_000 }
    }
}

impl RetryPolicy {
    /// Delay to wait before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Settings for the [`EmbeddingGateway`](crate::EmbeddingGateway).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingConfig {
    /// Number of texts sent to the embedder per call.
    pub batch_size: usize,
    /// Maximum number of embedder calls in flight at once.
    pub max_concurrency: usize,
    /// Deadline for a single embedder call, in milliseconds.
    pub timeout_ms: u64,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { batch_size: 32, max_concurrency: 4, timeout_ms: 30_000, retry: RetryPolicy::default() }
    }
}

impl EmbeddingConfig {
    /// The per-call deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Configuration parameters for the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum passage length in characters.
    pub chunk_size: usize,
    /// Number of characters shared by consecutive passages.
    pub chunk_overlap: usize,
    /// Number of passages retrieved per question.
    pub top_k: usize,
    /// Optional similarity floor. When set and no retrieved passage reaches it,
    /// the question is answered with the not-found response without calling
    /// the generator.
    pub min_similarity: Option<f32>,
    /// Embedding gateway settings.
    pub embedding: EmbeddingConfig,
    /// Deadline for parsing an uploaded document, in milliseconds.
    pub load_timeout_ms: u64,
    /// Deadline for a single generation call, in milliseconds.
    pub generation_timeout_ms: u64,
    /// Number of previous question/answer exchanges included in the prompt.
    pub history_window: usize,
    /// Default system instruction (persona) handed to the generator.
    pub system_instruction: Option<String>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            top_k: 4,
            min_similarity: None,
            embedding: EmbeddingConfig::default(),
            load_timeout_ms: 60_000,
            generation_timeout_ms: 60_000,
            history_window: 0,
            system_instruction: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// The load deadline as a [`Duration`].
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// The generation deadline as a [`Duration`].
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidChunkConfig`] if `chunk_size == 0` or
    /// `chunk_overlap >= chunk_size`, and [`RagError::ConfigError`] for any
    /// other invalid value.
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if let Some(floor) = self.min_similarity {
            if !(-1.0..=1.0).contains(&floor) {
                return Err(RagError::ConfigError(format!(
                    "min_similarity ({floor}) must be within [-1, 1]"
                )));
            }
        }
        if self.embedding.batch_size == 0 {
            return Err(RagError::ConfigError("embedding batch_size must be greater than zero".into()));
        }
        if self.embedding.max_concurrency == 0 {
            return Err(RagError::ConfigError(
                "embedding max_concurrency must be greater than zero".into(),
            ));
        }
        if self.embedding.retry.max_attempts == 0 {
            return Err(RagError::ConfigError("retry max_attempts must be at least 1".into()));
        }
        if self.embedding.timeout_ms == 0 || self.load_timeout_ms == 0 || self.generation_timeout_ms == 0
        {
            return Err(RagError::ConfigError("timeouts must be greater than zero".into()));
        }
        Ok(())
    }
}

pub(crate) fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::InvalidChunkConfig("chunk_size must be greater than zero".into()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::InvalidChunkConfig(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum passage length in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive passages in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of passages retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set a similarity floor below which retrieval counts as empty.
    pub fn min_similarity(mut self, floor: f32) -> Self {
        self.config.min_similarity = Some(floor);
        self
    }

    /// Set the number of texts per embedder call.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding.batch_size = size;
        self
    }

    /// Set the maximum number of concurrent embedder calls.
    pub fn embedding_concurrency(mut self, n: usize) -> Self {
        self.config.embedding.max_concurrency = n;
        self
    }

    /// Set the per-call embedding deadline.
    pub fn embedding_timeout(mut self, timeout: Duration) -> Self {
        self.config.embedding.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the retry policy for transient embedding failures.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.embedding.retry = retry;
        self
    }

    /// Set the document parsing deadline.
    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.config.load_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the generation deadline.
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.config.generation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set how many previous exchanges are replayed in the prompt.
    pub fn history_window(mut self, exchanges: usize) -> Self {
        self.config.history_window = exchanges;
        self
    }

    /// Set the default system instruction (persona).
    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.system_instruction = Some(instruction.into());
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
