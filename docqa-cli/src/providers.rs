//! Construction of the hosted model backends from environment variables.

use std::sync::Arc;

use anyhow::{Context, Result};
use docqa_rag::gemini::{GeminiEmbedder, GeminiGenerator};
use docqa_rag::openai::{OpenAIEmbedder, OpenAIGenerator};
use docqa_rag::{Embedder, Generator};

use crate::cli::Provider;

/// Embedding and generation backends for `provider`.
pub fn backends(provider: Provider) -> Result<(Arc<dyn Embedder>, Arc<dyn Generator>)> {
    match provider {
        Provider::Gemini => {
            let embedder = GeminiEmbedder::from_env().context("cannot create Gemini embedder")?;
            let generator = GeminiGenerator::from_env().context("cannot create Gemini generator")?;
            Ok((Arc::new(embedder), Arc::new(generator)))
        }
        Provider::OpenAi => {
            let embedder = OpenAIEmbedder::from_env().context("cannot create OpenAI embedder")?;
            let generator = OpenAIGenerator::from_env().context("cannot create OpenAI generator")?;
            Ok((Arc::new(embedder), Arc::new(generator)))
        }
    }
}
