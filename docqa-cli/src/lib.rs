//! Terminal front end for docqa.

pub mod cli;
pub mod command;
pub mod providers;
pub mod repl;

pub use cli::{Cli, Provider};
pub use command::Command;
pub use repl::{Reply, Repl};
