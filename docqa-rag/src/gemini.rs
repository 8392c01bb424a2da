//! Gemini embedding and generation backends over the Generative Language REST API.
//!
//! This module is only available when the `gemini` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::Embedder;
use crate::error::{ProviderError, RagError, Result};
use crate::generation::{GenerationRequest, Generator};
use crate::http::send_json;

/// The default Generative Language API base URL.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// The default generation model.
const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash";

/// Environment variable holding the API key.
const API_KEY_ENV: &str = "GOOGLE_API_KEY";

fn read_api_key() -> Result<String> {
    let api_key = std::env::var(API_KEY_ENV)
        .map_err(|_| RagError::ConfigError(format!("{API_KEY_ENV} environment variable not set")))?;
    if api_key.is_empty() {
        return Err(RagError::ConfigError("Gemini API key must not be empty".into()));
    }
    Ok(api_key)
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content,
    task_type: &'a str,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body).ok().map(|e| e.error.message)
}

impl GenerateContentResponse {
    fn into_text(self) -> std::result::Result<String, ProviderError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = block_reason.unwrap_or_else(|| "no candidates".to_string());
            return Err(ProviderError::Other(format!("response was empty: {reason}")));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
            return Err(ProviderError::Other(format!("response had no text (finish reason {reason})")));
        }
        Ok(text)
    }
}

// ── Embedder ───────────────────────────────────────────────────────

/// An [`Embedder`] backed by the Gemini `batchEmbedContents` endpoint.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-004`.
/// - `task_type` – defaults to `RETRIEVAL_DOCUMENT`, used for passages.
/// - `query_task_type` – defaults to `RETRIEVAL_QUERY`, used for questions.
/// - `api_key` – from the constructor or the `GOOGLE_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::gemini::GeminiEmbedder;
///
/// let embedder = GeminiEmbedder::from_env()?;
/// ```
pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    task_type: String,
    query_task_type: String,
}

impl GeminiEmbedder {
    /// Create an embedder with the given API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::ConfigError("Gemini API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: GEMINI_API_BASE.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            task_type: "RETRIEVAL_DOCUMENT".into(),
            query_task_type: "RETRIEVAL_QUERY".into(),
        })
    }

    /// Create an embedder using the `GOOGLE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(read_api_key()?)
    }

    /// Set the model name (without the `models/` prefix).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the embedding task type (e.g. `SEMANTIC_SIMILARITY`).
    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = task_type.into();
        self
    }

    /// Set the task type used for search queries.
    pub fn with_query_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.query_task_type = task_type.into();
        self
    }

    /// Point at a different API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn batch_request<'a>(&self, texts: &[String], task_type: &'a str) -> BatchEmbedRequest<'a> {
        BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: format!("models/{}", self.model),
                    content: Content { role: None, parts: vec![Part { text: text.clone() }] },
                    task_type,
                })
                .collect(),
        }
    }

    async fn embed_as(
        &self,
        texts: &[String],
        task_type: &str,
    ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = "Gemini", batch_size = texts.len(), model = %self.model, task_type, "embedding batch");

        let body = self.batch_request(texts, task_type);
        let url = format!("{}/models/{}:batchEmbedContents", self.base_url, self.model);
        let request = self.client.post(url).header("x-goog-api-key", &self.api_key).json(&body);
        let response: BatchEmbedResponse = send_json("Gemini", request, error_detail).await?;

        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        self.embed_as(texts, &self.task_type).await
    }

    async fn embed_query(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        self.embed_as(texts, &self.query_task_type).await
    }

    fn name(&self) -> &str {
        "Gemini"
    }
}

// ── Generator ──────────────────────────────────────────────────────

/// A [`Generator`] backed by the Gemini `generateContent` endpoint.
///
/// The request's system instruction is sent as Gemini's `systemInstruction`.
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiGenerator {
    /// Create a generator with the given API key and `gemini-1.5-flash`.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::ConfigError("Gemini API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: GEMINI_API_BASE.into(),
            model: DEFAULT_GENERATION_MODEL.into(),
        })
    }

    /// Create a generator using the `GOOGLE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(read_api_key()?)
    }

    /// Set the model name (e.g. `gemini-2.0-flash`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at a different API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> std::result::Result<String, ProviderError> {
        debug!(provider = "Gemini", model = %self.model, prompt_len = request.prompt.len(), "generating");

        let body = GenerateContentRequest {
            system_instruction: request
                .system_instruction
                .as_ref()
                .map(|s| Content { role: None, parts: vec![Part { text: s.clone() }] }),
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: request.prompt.clone() }],
            }],
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let http = self.client.post(url).header("x-goog-api-key", &self.api_key).json(&body);
        let response: GenerateContentResponse = send_json("Gemini", http, error_detail).await?;
        response.into_text()
    }

    fn name(&self) -> &str {
        "Gemini"
    }
}
