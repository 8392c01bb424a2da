//! Grounded prompt assembly.

use std::fmt::Write;

use crate::document::SearchResult;
use crate::session::{ChatTurn, Role};

/// The answer the generator is told to give when the context lacks one.
pub const NOT_FOUND_RESPONSE: &str = "I could not find the answer to that in the document.";

const DEFAULT_INSTRUCTIONS: &str = "\
You answer questions about a document the user uploaded.
Answer strictly from the context passages below. Do not use outside knowledge and do not guess.
If the context does not contain enough information to answer, reply with exactly:
{fallback}";

/// Builds the prompt sent to the [`Generator`](crate::Generator).
///
/// The layout is: instructions, numbered context passages in similarity
/// order, optional earlier exchanges, then the verbatim question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    instructions: String,
    fallback: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { instructions: DEFAULT_INSTRUCTIONS.to_string(), fallback: NOT_FOUND_RESPONSE.to_string() }
    }
}

impl PromptTemplate {
    /// Use custom instructions. A `{fallback}` placeholder is replaced by the
    /// fallback phrase.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Use a custom fallback phrase.
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// The phrase the generator is told to use when the context is insufficient.
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Assemble the final prompt.
    pub fn assemble(&self, question: &str, context: &[SearchResult], history: &[ChatTurn]) -> String {
        let mut prompt = self.instructions.replace("{fallback}", &self.fallback);
        prompt.push_str("\n\nContext:\n");

        if context.is_empty() {
            prompt.push_str("(no passages were retrieved)\n");
        }
        for (i, result) in context.iter().enumerate() {
            let _ = writeln!(prompt, "[{}] {}", i + 1, result.passage.text.trim());
            if i + 1 < context.len() {
                prompt.push_str("---\n");
            }
        }

        if !history.is_empty() {
            prompt.push_str("\nConversation so far:\n");
            for turn in history {
                let speaker = match turn.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                let _ = writeln!(prompt, "{speaker}: {}", turn.content);
            }
        }

        let _ = write!(prompt, "\nQuestion: {question}\nAnswer:");
        prompt
    }
}
