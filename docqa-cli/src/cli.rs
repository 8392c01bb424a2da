//! Command-line flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use docqa_rag::{RagConfig, SessionContext};

/// Chat with a PDF, text or markdown document from the terminal.
#[derive(Parser, Debug)]
#[command(name = "docqa", author, version, about, long_about = None)]
pub struct Cli {
    /// Document to load at startup (.pdf, .txt, .md)
    pub file: Option<PathBuf>,

    /// Model provider for embeddings and answers
    #[arg(short, long, value_enum, default_value_t = Provider::Gemini)]
    pub provider: Provider,

    /// Maximum passage length in characters
    #[arg(long, default_value_t = 1000)]
    pub chunk_size: usize,

    /// Characters shared by consecutive passages
    #[arg(long, default_value_t = 100)]
    pub overlap: usize,

    /// Passages retrieved per question
    #[arg(short = 'k', long, default_value_t = 4)]
    pub top_k: usize,

    /// Answer "not found" without calling the model when no passage is at least this similar
    #[arg(long)]
    pub min_similarity: Option<f32>,

    /// Previous exchanges replayed to the model
    #[arg(long, default_value_t = 0)]
    pub history_window: usize,

    /// System instruction for the assistant
    #[arg(long)]
    pub persona: Option<String>,

    /// Seconds allowed for one answer
    #[arg(long, default_value_t = 60)]
    pub answer_timeout: u64,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Gemini,
    #[value(name = "openai")]
    OpenAi,
}

impl Cli {
    /// The engine configuration these flags describe.
    ///
    /// The persona is not part of it; it belongs to the session so that
    /// `/persona` can replace or clear it.
    pub fn rag_config(&self) -> docqa_rag::Result<RagConfig> {
        let mut builder = RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.overlap)
            .top_k(self.top_k)
            .history_window(self.history_window)
            .generation_timeout(Duration::from_secs(self.answer_timeout));
        if let Some(floor) = self.min_similarity {
            builder = builder.min_similarity(floor);
        }
        builder.build()
    }

    /// A fresh session carrying the `--persona` flag, if given.
    pub fn session(&self) -> SessionContext {
        match &self.persona {
            Some(persona) => SessionContext::with_system_instruction(persona.clone()),
            None => SessionContext::new(),
        }
    }
}
