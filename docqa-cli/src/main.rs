use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use docqa_cli::{Cli, Repl, providers};
use docqa_rag::RagEngine;
use docqa_telemetry::SpanStore;

const SPANS_PER_SESSION: usize = 200;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let spans = Arc::new(SpanStore::with_capacity(SPANS_PER_SESSION));
    docqa_telemetry::init_with_capture("docqa", spans.clone(), cli.json_logs)?;

    let config = cli.rag_config()?;
    let (embedder, generator) = providers::backends(cli.provider)?;
    let engine = RagEngine::builder().config(config).embedder(embedder).generator(generator).build()?;

    let repl = Repl::new(engine, cli.session(), spans);

    if let Some(path) = &cli.file {
        match repl.load(path).await {
            Ok(message) => println!("{message}"),
            Err(e) => eprintln!("Error: {e:#}"),
        }
    }

    repl.run().await
}
