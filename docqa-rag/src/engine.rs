//! The host-facing entry point: ingest a file, ask questions, reset.
//!
//! [`RagEngine`] composes the [`DocumentLoader`], [`Chunker`],
//! [`EmbeddingGateway`] and [`QueryPipeline`]. It holds no session state;
//! every call takes the host's [`SessionContext`].
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RagConfig, RagEngine, SessionContext};
//!
//! let engine = RagEngine::builder()
//!     .config(RagConfig::default())
//!     .embedder(Arc::new(my_embedder))
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//!
//! let session = SessionContext::new();
//! engine.ingest(&session, bytes, "handbook.pdf").await?;
//! let answer = engine.ask(&session, "How many vacation days do I get?").await?;
//! ```

use std::sync::Arc;

use tracing::{Instrument, error, info, info_span, warn};

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::document::{Document, IndexEntry};
use crate::embedding::{Embedder, EmbeddingGateway};
use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::index::VectorIndex;
use crate::loader::DocumentLoader;
use crate::pipeline::{Answer, QueryPipeline};
use crate::prompt::PromptTemplate;
use crate::session::SessionContext;

/// Ingests documents into sessions and answers questions against them.
///
/// Construct one via [`RagEngine::builder()`]. The engine is cheap to share
/// behind an `Arc` and can serve many sessions.
pub struct RagEngine {
    config: RagConfig,
    loader: DocumentLoader,
    chunker: Chunker,
    gateway: EmbeddingGateway,
    pipeline: QueryPipeline,
}

impl RagEngine {
    /// Create a new [`RagEngineBuilder`].
    pub fn builder() -> RagEngineBuilder {
        RagEngineBuilder::default()
    }

    /// Return a reference to the engine configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the query pipeline.
    pub fn pipeline(&self) -> &QueryPipeline {
        &self.pipeline
    }

    /// Build an index from an uploaded file and make it the session's active index.
    ///
    /// The format is inferred from `file_name`. The previous index, if any,
    /// stays active until the new one is fully built; it is replaced wholesale
    /// and the chat history is cleared.
    ///
    /// # Errors
    ///
    /// - [`RagError::UnsupportedFormat`] for an unknown extension
    /// - [`RagError::Load`] if the file cannot be parsed
    /// - [`RagError::EmptyCorpus`] if the file holds no text
    /// - [`RagError::EmbeddingUnavailable`] / [`RagError::EmbeddingRejected`]
    /// - [`RagError::Superseded`] if the session was reset meanwhile
    ///
    /// On any error nothing is published.
    pub async fn ingest(
        &self,
        session: &SessionContext,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<Arc<VectorIndex>> {
        let span = info_span!("rag.ingest", session.id = %session.id(), document.name = file_name);
        self.ingest_document(session, bytes, file_name).instrument(span).await
    }

    async fn ingest_document(
        &self,
        session: &SessionContext,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<Arc<VectorIndex>> {
        let document = Document::from_upload(file_name, bytes).map_err(|e| {
            warn!(error = %e, "rejected upload");
            e
        })?;
        let epoch = session.epoch().await;

        let segments = self.loader.load(document).await?;
        let passages = self.chunker.split(&segments);
        if passages.is_empty() {
            warn!(segment_count = segments.len(), "document produced no passages");
            return Err(RagError::EmptyCorpus);
        }

        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let vectors = self.gateway.embed_batch(&texts).await.map_err(|e| {
            error!(error = %e, "embedding failed during ingestion");
            e
        })?;

        let entries = vectors.into_iter().zip(passages).map(|(v, p)| IndexEntry::new(v, p)).collect();
        let index = Arc::new(VectorIndex::build(entries)?);

        if !session.publish(epoch, Arc::clone(&index)).await {
            warn!("session was reset during ingestion, discarding index");
            return Err(RagError::Superseded);
        }

        info!(
            segment_count = segments.len(),
            passage_count = index.len(),
            dimensions = index.dimensions(),
            "ingested document"
        );
        Ok(index)
    }

    /// Answer a question against the session's active index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotReady`] if nothing has been ingested since the
    /// last reset, [`RagError::EmptyQuestion`] for a blank question and
    /// embedding errors from the question's embedding step. Generation
    /// failures come back as `Ok` with an explanatory answer.
    pub async fn ask(&self, session: &SessionContext, question: &str) -> Result<String> {
        Ok(self.ask_detailed(session, question).await?.text)
    }

    /// Like [`ask`](Self::ask) but also returns the sources and how the
    /// answer was produced.
    ///
    /// # Errors
    ///
    /// See [`ask`](Self::ask).
    pub async fn ask_detailed(&self, session: &SessionContext, question: &str) -> Result<Answer> {
        let span = info_span!("rag.ask", session.id = %session.id());
        async {
            if question.trim().is_empty() {
                return Err(RagError::EmptyQuestion);
            }
            let snapshot = session.snapshot().await.ok_or(RagError::NotReady)?;

            let keep = self.config.history_window * 2;
            let history = &snapshot.history[snapshot.history.len().saturating_sub(keep)..];
            let system_instruction =
                snapshot.system_instruction.clone().or_else(|| self.config.system_instruction.clone());

            let answer = self
                .pipeline
                .answer_with(question, &snapshot.index, history, system_instruction)
                .await?;

            if !session.record_exchange(snapshot.conversation, question, &answer.text).await {
                warn!("conversation changed while answering, exchange not recorded");
            }
            Ok(answer)
        }
        .instrument(span)
        .await
    }

    /// Discard the session's index and chat history.
    pub async fn reset(&self, session: &SessionContext) {
        session.reset().await;
    }
}

/// Builder for constructing a [`RagEngine`].
///
/// `embedder` and `generator` are required; `config` defaults to
/// [`RagConfig::default()`].
#[derive(Default)]
pub struct RagEngineBuilder {
    config: Option<RagConfig>,
    embedder: Option<Arc<dyn Embedder>>,
    generator: Option<Arc<dyn Generator>>,
    template: Option<PromptTemplate>,
    loader: Option<DocumentLoader>,
}

impl RagEngineBuilder {
    /// Set the engine configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding backend.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the generation backend.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Override the prompt template.
    pub fn prompt_template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Override the document loader (for example to change the parse deadline).
    pub fn loader(mut self, loader: DocumentLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Build the [`RagEngine`], validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required component is missing,
    /// and any error from [`RagConfig::validate`].
    pub fn build(self) -> Result<RagEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::ConfigError("embedder is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;

        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
        let loader = self.loader.unwrap_or_else(|| DocumentLoader::new(config.load_timeout()));
        let gateway = EmbeddingGateway::new(embedder, config.embedding.clone());
        let pipeline = QueryPipeline::new(gateway.clone(), generator, &config)
            .with_template(self.template.unwrap_or_default());

        Ok(RagEngine { config, loader, chunker, gateway, pipeline })
    }
}
