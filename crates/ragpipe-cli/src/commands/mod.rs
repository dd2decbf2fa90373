//! CLI command handlers

pub mod config;
pub mod models;
pub mod reset;
pub mod run;

use anyhow::Result;
use ragpipe_core::{Config, HttpStageClient};

/// Load config and apply the global `--url` override
pub(crate) fn load_config(url: Option<&str>) -> Result<Config> {
    let mut config = Config::load()?;
    if let Some(url) = url {
        config.service.url = url.to_string();
    }
    Ok(config)
}

pub(crate) fn client(config: &Config) -> Result<HttpStageClient> {
    Ok(HttpStageClient::new(&config.service)?)
}
