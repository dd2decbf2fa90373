//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ragpipe")]
#[command(
    author,
    version,
    about = "Run and benchmark a RAG pipeline against a remote service"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Service base URL (overrides config)
    #[arg(long, global = true, env = "RAGPIPE_URL")]
    pub url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List models offered by the service
    Models,

    /// Clear remote documents and vectors
    Reset,

    /// Upload a document, ingest it and answer queries
    Run(RunArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Document to upload (PDF or text)
    pub file: PathBuf,

    /// Question to ask; repeat for several
    #[arg(short, long = "query", required = true)]
    pub queries: Vec<String>,

    /// Number of reranked chunks to use as context
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Use the blocking generation endpoint only
    #[arg(long)]
    pub no_stream: bool,

    /// Hide the retrieved chunk list
    #[arg(long)]
    pub no_sources: bool,

    #[arg(long)]
    pub chunking_model: Option<String>,

    #[arg(long)]
    pub embedding_model: Option<String>,

    #[arg(long)]
    pub reranker_model: Option<String>,

    #[arg(long)]
    pub generation_model: Option<String>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Set a value, e.g. `models.generation_model llama3.1:8b`
    Set { key: String, value: String },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Cli,
    Json,
}
