//! Retrieval-augmented question answering over a built [`VectorIndex`].
//!
//! Each question runs `EmbedQuestion -> Retrieve -> AssemblePrompt -> Generate
//! -> Respond`. Embedding failures propagate to the caller; generation
//! failures become a user-facing answer so a single bad turn never ends the
//! session.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{QueryPipeline, RagConfig};
//!
//! let pipeline = QueryPipeline::new(gateway, Arc::new(my_generator), &RagConfig::default());
//! let answer = pipeline.answer("Where is ALPHA?", &index).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::RagConfig;
use crate::document::SearchResult;
use crate::embedding::EmbeddingGateway;
use crate::error::{ProviderError, RagError, Result};
use crate::generation::{GenerationRequest, Generator};
use crate::index::VectorIndex;
use crate::prompt::PromptTemplate;
use crate::session::ChatTurn;

/// How an [`Answer`] was produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    /// The generator produced the text.
    Generated,
    /// No passage reached the similarity floor; the text is the fallback phrase.
    NoRelevantContext,
    /// Generation failed; the text explains the failure.
    GenerationFailed,
}

/// The outcome of one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The text to show the user.
    pub text: String,
    /// How the text was produced.
    pub kind: AnswerKind,
    /// The passages the prompt was grounded on, best first.
    pub sources: Vec<SearchResult>,
}

/// Answers questions against an index using an embedding gateway and a generator.
#[derive(Clone)]
pub struct QueryPipeline {
    gateway: EmbeddingGateway,
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
    top_k: usize,
    min_similarity: Option<f32>,
    generation_timeout: Duration,
}

impl QueryPipeline {
    /// Create a pipeline using retrieval and timeout settings from `config`.
    pub fn new(gateway: EmbeddingGateway, generator: Arc<dyn Generator>, config: &RagConfig) -> Self {
        Self {
            gateway,
            generator,
            template: PromptTemplate::default(),
            top_k: config.top_k,
            min_similarity: config.min_similarity,
            generation_timeout: config.generation_timeout(),
        }
    }

    /// Replace the prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// The prompt template in use.
    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// The embedding gateway in use.
    pub fn gateway(&self) -> &EmbeddingGateway {
        &self.gateway
    }

    /// Answer `question` from `index` and return the text unmodified.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingUnavailable`] or
    /// [`RagError::EmbeddingRejected`] if the question cannot be embedded.
    /// Generation failures are reported in the returned text instead.
    pub async fn answer(&self, question: &str, index: &VectorIndex) -> Result<String> {
        Ok(self.answer_with(question, index, &[], None).await?.text)
    }

    /// Embed the question and return the `top_k` most similar passages.
    ///
    /// # Errors
    ///
    /// Propagates embedding errors and [`RagError::DimensionMismatch`].
    pub async fn retrieve(&self, question: &str, index: &VectorIndex) -> Result<Vec<SearchResult>> {
        let query_vector = self.gateway.embed(question).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;

        let results = index.search(&query_vector, self.top_k)?;
        debug!(result_count = results.len(), top_score = results.first().map(|r| r.score), "retrieved passages");
        Ok(results)
    }

    /// Answer `question`, replaying `history` and using `system_instruction`
    /// as the generator persona.
    ///
    /// # Errors
    ///
    /// See [`answer`](Self::answer).
    pub async fn answer_with(
        &self,
        question: &str,
        index: &VectorIndex,
        history: &[ChatTurn],
        system_instruction: Option<String>,
    ) -> Result<Answer> {
        let results = self.retrieve(question, index).await?;

        let context: Vec<SearchResult> = match self.min_similarity {
            Some(floor) => results.into_iter().filter(|r| r.score >= floor).collect(),
            None => results,
        };
        if context.is_empty() && self.min_similarity.is_some() {
            info!("no passage reached the similarity floor, answering with fallback");
            return Ok(Answer {
                text: self.template.fallback().to_string(),
                kind: AnswerKind::NoRelevantContext,
                sources: context,
            });
        }

        let prompt = self.template.assemble(question, &context, history);
        let request = GenerationRequest::new(prompt).with_system_instruction(system_instruction);

        match self.generate(&request).await {
            Ok(text) => {
                info!(source_count = context.len(), answer_len = text.len(), "answered question");
                Ok(Answer { text, kind: AnswerKind::Generated, sources: context })
            }
            Err(e) => {
                warn!(error = %e, "generation failed, returning error answer");
                Ok(Answer {
                    text: generation_failure_message(&e),
                    kind: AnswerKind::GenerationFailed,
                    sources: context,
                })
            }
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let provider = self.generator.name();
        let outcome =
            match tokio::time::timeout(self.generation_timeout, self.generator.generate(request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::Timeout(self.generation_timeout)),
            };

        outcome.map_err(|e| {
            error!(provider, error = %e, "generation request failed");
            RagError::Generation { provider: provider.to_string(), message: e.to_string() }
        })
    }
}

/// The answer shown to the user when generation fails.
pub fn generation_failure_message(error: &RagError) -> String {
    format!("An error occurred while generating the answer: {error}")
}
