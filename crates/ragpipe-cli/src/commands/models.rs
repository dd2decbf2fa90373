//! Models command

use crate::app::OutputFormat;
use anyhow::Result;
use ragpipe_core::StageClient;

pub async fn run(url: Option<&str>, format: OutputFormat) -> Result<()> {
    let config = super::load_config(url)?;
    let client = super::client(&config)?;
    let catalog = client.list_models().await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        OutputFormat::Cli => {
            if catalog.all.is_empty() {
                println!("No models available at {}", client.base_url());
                return Ok(());
            }
            println!("Embedding models:");
            for name in &catalog.embedding {
                println!("  {}", marked(name, &config.models.embedding_model));
            }
            println!();
            println!("Generation models:");
            for name in &catalog.generation {
                println!("  {}", marked(name, &config.models.generation_model));
            }
        }
    }
    Ok(())
}

fn marked(name: &str, selected: &str) -> String {
    if name == selected {
        format!("{} (selected)", name)
    } else {
        name.to_string()
    }
}
