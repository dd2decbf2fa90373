//! Reset command

use anyhow::Result;
use ragpipe_core::StageClient;

pub async fn run(url: Option<&str>) -> Result<()> {
    let config = super::load_config(url)?;
    let client = super::client(&config)?;
    client.reset().await?;
    println!("Cleared documents and vectors at {}", client.base_url());
    Ok(())
}
