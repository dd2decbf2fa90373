//! Config command

use crate::app::{ConfigAction, ConfigArgs, OutputFormat};
use anyhow::Result;
use ragpipe_core::Config;

pub fn run(args: ConfigArgs, url: Option<&str>, format: OutputFormat) -> Result<()> {
    match args.action {
        ConfigAction::Path => {
            println!("{}", Config::default_path().display());
        }
        ConfigAction::Show => {
            let config = super::load_config(url)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
                OutputFormat::Cli => print_config(&config),
            }
        }
        ConfigAction::Set { key, value } => {
            let path = Config::default_path();
            let mut config = Config::read_from(&path)?;
            config.set(&key, &value)?;
            config.save_to(&path)?;
            println!("Set {} = {}", key, value);
        }
    }
    Ok(())
}

fn print_config(config: &Config) {
    let timeout = config
        .service
        .timeout_secs
        .map(|s| format!("{}s", s))
        .unwrap_or_else(|| "none".to_string());

    println!("service.url              {}", config.service.url);
    println!("service.timeout_secs     {}", timeout);
    for key in [
        "chunking_model",
        "embedding_model",
        "reranker_model",
        "generation_model",
    ] {
        let value = config.models.get(key).unwrap_or_default();
        let value = if value.is_empty() { "(from service)" } else { value };
        println!("models.{:<18}{}", key, value);
    }
    println!("retrieval.top_k          {}", config.retrieval.top_k);
    println!("generation.streaming     {}", config.generation.streaming);
}
