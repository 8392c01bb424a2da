//! The interactive chat loop.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use docqa_rag::{RagEngine, Role, SessionContext};
use docqa_telemetry::SpanStore;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

use crate::command::{Command, HELP};

const PROMPT: &str = "docqa> ";

/// What the loop should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Print(String),
    Exit,
}

/// One chat session driven from the terminal.
pub struct Repl {
    engine: RagEngine,
    session: SessionContext,
    spans: Arc<SpanStore>,
}

impl Repl {
    pub fn new(engine: RagEngine, session: SessionContext, spans: Arc<SpanStore>) -> Self {
        Self { engine, session, spans }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Read a file from disk and make it the session's document.
    pub async fn load(&self, path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("'{}' is not a file path", path.display()))?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))?;

        let index = self.engine.ingest(&self.session, bytes, file_name).await?;
        Ok(format!("Loaded {file_name}: {} passages. Ask away.", index.len()))
    }

    /// Execute one command.
    pub async fn handle(&self, command: Command) -> Result<Reply> {
        let text = match command {
            Command::Empty => return Ok(Reply::Print(String::new())),
            Command::Exit => return Ok(Reply::Exit),
            Command::Help => HELP.to_string(),
            Command::Ask(question) => {
                let answer = self.engine.ask_detailed(&self.session, &question).await?;
                let mut text = answer.text;
                if !answer.sources.is_empty() {
                    let sources: Vec<String> = answer
                        .sources
                        .iter()
                        .map(|s| format!("#{} ({:.2})", s.passage.index + 1, s.score))
                        .collect();
                    let _ = write!(text, "\n  [sources: {}]", sources.join(", "));
                }
                text
            }
            Command::Load(path) => self.load(&path).await?,
            Command::Reset => {
                self.engine.reset(&self.session).await;
                self.spans.clear(&self.session.id().to_string());
                "Session cleared. Load a document to start again.".to_string()
            }
            Command::Persona(persona) => {
                let message = match &persona {
                    Some(p) => format!("Persona set: {p}"),
                    None => "Persona cleared.".to_string(),
                };
                self.session.set_system_instruction(persona).await;
                message
            }
            Command::History => self.render_history().await,
            Command::Trace => self.render_trace(),
        };
        Ok(Reply::Print(text))
    }

    async fn render_history(&self) -> String {
        let history = self.session.history().await;
        if history.is_empty() {
            return "No conversation yet.".to_string();
        }
        let mut out = String::new();
        for turn in history {
            let speaker = match turn.role {
                Role::User => "You",
                Role::Assistant => "Assistant",
            };
            let _ = writeln!(out, "[{}] {speaker}: {}", turn.at.format("%H:%M:%S"), turn.content);
        }
        out.trim_end().to_string()
    }

    fn render_trace(&self) -> String {
        let spans = self.spans.spans(&self.session.id().to_string());
        if spans.is_empty() {
            return "Nothing traced yet.".to_string();
        }
        let mut out = String::new();
        for span in &spans[spans.len().saturating_sub(20)..] {
            let _ = writeln!(out, "{:<20} {:>10.1} ms", span.name, span.duration_ms());
        }
        out.trim_end().to_string()
    }

    /// Run until `/exit`, Ctrl-C or Ctrl-D.
    pub async fn run(&self) -> Result<()> {
        let mut editor = DefaultEditor::new()?;
        println!("{}", self.session.greeting());

        loop {
            let line = match editor.readline(PROMPT) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            };
            let _ = editor.add_history_entry(line.as_str());

            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(e) => {
                    eprintln!("{e}");
                    continue;
                }
            };

            match self.handle(command).await {
                Ok(Reply::Exit) => break,
                Ok(Reply::Print(text)) if text.is_empty() => {}
                Ok(Reply::Print(text)) => println!("{text}\n"),
                Err(e) => {
                    warn!(error = %e, "command failed");
                    eprintln!("Error: {e:#}\n");
                }
            }
        }
        Ok(())
    }
}
