//! # docqa-rag
//!
//! Retrieval-augmented question answering over a single uploaded document.
//!
//! A file is loaded into text [`Segment`]s, split into overlapping
//! [`Passage`]s, embedded through an [`EmbeddingGateway`] and stored in an
//! immutable [`VectorIndex`]. Questions are embedded, matched against the
//! index and answered by a [`Generator`] from a prompt grounded in the
//! retrieved passages.
//!
//! External model calls sit behind two capability traits, [`Embedder`] and
//! [`Generator`], injected through [`RagEngine::builder()`]. Session state
//! lives in a [`SessionContext`] owned by the host.
//!
//! ## Features
//!
//! - `gemini`: [`gemini::GeminiEmbedder`] and [`gemini::GeminiGenerator`]
//! - `openai`: [`openai::OpenAIEmbedder`] and [`openai::OpenAIGenerator`]
//! - `full`: both

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generation;
pub mod index;
pub mod loader;
pub mod pipeline;
pub mod prompt;
pub mod session;

#[cfg(any(feature = "gemini", feature = "openai"))]
mod http;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, SEGMENT_SEPARATOR, split};
pub use config::{EmbeddingConfig, RagConfig, RagConfigBuilder, RetryPolicy};
pub use document::{Document, DocumentFormat, IndexEntry, Passage, SearchResult, Segment};
pub use embedding::{Embedder, EmbeddingGateway};
pub use engine::{RagEngine, RagEngineBuilder};
pub use error::{ProviderError, RagError, Result};
pub use generation::{GenerationRequest, Generator};
pub use index::{VectorIndex, cosine_similarity};
pub use loader::{DocumentLoader, load_segments};
pub use pipeline::{Answer, AnswerKind, QueryPipeline, generation_failure_message};
pub use prompt::{NOT_FOUND_RESPONSE, PromptTemplate};
pub use session::{ChatTurn, GREETING, Role, SessionContext};
