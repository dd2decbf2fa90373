//! ragpipe CLI
//!
//! Upload a document to a RAG service, run every stage and report timings.

use anyhow::Result;
use clap::Parser;
use ragpipe_core::error::exit_codes;
use ragpipe_core::RagPipeError;

mod app;
mod commands;
mod output;
mod progress;

use app::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<RagPipeError>()
            .map(RagPipeError::exit_code)
            .unwrap_or(exit_codes::GENERAL_ERROR);
        std::process::exit(code);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let url = cli.url.as_deref();
    match cli.command {
        Commands::Models => commands::models::run(url, cli.format).await,
        Commands::Reset => commands::reset::run(url).await,
        Commands::Run(args) => commands::run::run(args, url, cli.format).await,
        Commands::Config(args) => commands::config::run(args, url, cli.format),
    }
}
