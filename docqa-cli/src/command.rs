//! Parsing of REPL input lines.

use std::path::PathBuf;

use anyhow::{Result, bail};

pub const HELP: &str = "\
Commands:
  /load <path>      load a .pdf, .txt or .md file (replaces the current one)
  /reset            forget the document and the conversation
  /persona [text]   set the assistant's persona, or clear it
  /history          show the conversation so far
  /trace            show timings of recent operations
  /help             show this help
  /exit             quit
Anything else is asked as a question about the loaded document.";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Load(PathBuf),
    Reset,
    Persona(Option<String>),
    History,
    Trace,
    Help,
    Exit,
    Empty,
}

impl Command {
    /// Parse a line. Lines starting with `/` are commands; anything else is a question.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Command::Empty);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Ask(line.to_string()));
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            "load" if argument.is_empty() => bail!("usage: /load <path>"),
            "load" => Ok(Command::Load(PathBuf::from(argument))),
            "reset" => Ok(Command::Reset),
            "persona" => Ok(Command::Persona((!argument.is_empty()).then(|| argument.to_string()))),
            "history" => Ok(Command::History),
            "trace" => Ok(Command::Trace),
            "help" | "?" => Ok(Command::Help),
            "exit" | "quit" => Ok(Command::Exit),
            other => bail!("unknown command '/{other}', type /help for the list"),
        }
    }
}
