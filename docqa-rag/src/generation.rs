//! The text-generation capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Everything a [`Generator`] needs for one completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Optional persona or system instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    /// The fully assembled prompt.
    pub prompt: String,
}

impl GenerationRequest {
    /// Create a request with no system instruction.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { system_instruction: None, prompt: prompt.into() }
    }

    /// Attach a system instruction.
    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction;
        self
    }
}

/// A language model that turns a prompt into text.
///
/// The pipeline applies its own deadline around each call and never retries
/// a failed generation.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a completion for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;

    /// A short name used in logs and error messages.
    fn name(&self) -> &str {
        "generator"
    }
}
