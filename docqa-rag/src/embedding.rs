//! The embedding capability and the gateway that batches and retries calls to it.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{Instrument, debug, error, info, warn};

use crate::config::EmbeddingConfig;
use crate::error::{ProviderError, RagError, Result};

/// A backend that turns texts into fixed-length vectors.
///
/// Implementations wrap a specific embedding service (Gemini, OpenAI, a local
/// model) and report failures as [`ProviderError`] so the gateway can decide
/// whether to retry. Batching, timeouts and retries are the gateway's job,
/// not the implementation's.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::Embedder;
///
/// let vectors = embedder.embed(&["hello".to_string(), "world".to_string()]).await?;
/// assert_eq!(vectors.len(), 2);
/// ```
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every input text, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError>;

    /// Embed search queries. Backends with asymmetric retrieval models
    /// override this; the default treats queries like documents.
    async fn embed_query(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        self.embed(texts).await
    }

    /// A short name used in logs and error messages.
    fn name(&self) -> &str {
        "embedder"
    }
}

#[derive(Debug, Clone, Copy)]
enum Purpose {
    Document,
    Query,
}

/// Wraps an [`Embedder`] with batching, bounded concurrency, per-call
/// timeouts and exponential-backoff retries.
///
/// Batches run concurrently up to `max_concurrency`, but results are always
/// reassembled in input order.
#[derive(Clone)]
pub struct EmbeddingGateway {
    embedder: Arc<dyn Embedder>,
    config: EmbeddingConfig,
}

impl EmbeddingGateway {
    /// Create a gateway around `embedder`.
    pub fn new(embedder: Arc<dyn Embedder>, config: EmbeddingConfig) -> Self {
        Self { embedder, config }
    }

    /// The gateway configuration.
    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Embed a single search query through [`Embedder::embed_query`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingUnavailable`] once transient failures have
    /// used up every attempt, and [`RagError::EmbeddingRejected`] for
    /// failures that retrying cannot fix.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_with_retry(vec![text.to_string()], Purpose::Query).await?;
        vectors.pop().ok_or_else(|| self.rejected("embedder returned no vector".to_string()))
    }

    /// Embed many document texts, returning vectors in input order.
    ///
    /// # Errors
    ///
    /// Fails on the first batch that fails; see [`embed`](Self::embed).
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batch_size = self.config.batch_size.max(1);
        let batch_count = texts.len().div_ceil(batch_size);
        debug!(
            provider = self.embedder.name(),
            text_count = texts.len(),
            batch_count,
            "embedding texts"
        );

        let batches: Vec<Vec<Vec<f32>>> = stream::iter(texts.chunks(batch_size))
            .map(|batch| self.embed_with_retry(batch.to_vec(), Purpose::Document))
            .buffered(self.config.max_concurrency.max(1))
            .try_collect()
            .await?;

        let vectors: Vec<Vec<f32>> = batches.into_iter().flatten().collect();
        info!(provider = self.embedder.name(), vector_count = vectors.len(), "embedded texts");
        Ok(vectors)
    }

    async fn embed_with_retry(&self, batch: Vec<String>, purpose: Purpose) -> Result<Vec<Vec<f32>>> {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let timeout = self.config.timeout();

        let mut attempt = 0;
        loop {
            attempt += 1;
            if attempt > 1 {
                let delay = self.config.retry.delay(attempt - 1);
                debug!(attempt, max_attempts, delay_ms = delay.as_millis() as u64, "backing off");
                tokio::time::sleep(delay).await;
            }

            let span = tracing::debug_span!("embedding.attempt", attempt, batch_size = batch.len());
            let call = match purpose {
                Purpose::Document => self.embedder.embed(&batch),
                Purpose::Query => self.embedder.embed_query(&batch),
            };
            let outcome = match tokio::time::timeout(timeout, call)
                .instrument(span)
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            };

            let failure = match outcome {
                Ok(vectors) if vectors.len() == batch.len() => {
                    if attempt > 1 {
                        info!(provider = self.embedder.name(), attempt, "embedding succeeded after retry");
                    }
                    return Ok(vectors);
                }
                Ok(vectors) => {
                    let message = format!(
                        "embedder returned {} vector(s) for {} input(s)",
                        vectors.len(),
                        batch.len()
                    );
                    error!(provider = self.embedder.name(), %message, "malformed embedding response");
                    return Err(self.rejected(message));
                }
                Err(failure) => failure,
            };

            if !failure.is_retriable() {
                error!(provider = self.embedder.name(), error = %failure, "embedding rejected");
                return Err(self.rejected(failure.to_string()));
            }

            if attempt >= max_attempts {
                error!(
                    provider = self.embedder.name(),
                    attempts = attempt,
                    error = %failure,
                    "embedding retries exhausted"
                );
                return Err(RagError::EmbeddingUnavailable {
                    provider: self.embedder.name().to_string(),
                    attempts: attempt,
                    message: failure.to_string(),
                });
            }

            warn!(
                provider = self.embedder.name(),
                attempt,
                max_attempts,
                error = %failure,
                "transient embedding failure, retrying"
            );
        }
    }

    fn rejected(&self, message: String) -> RagError {
        RagError::EmbeddingRejected { provider: self.embedder.name().to_string(), message }
    }
}
