//! Subcommands and the setup they share.

pub mod analyze;
pub mod jobs;
pub mod process;
pub mod templates;

use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use docmatch::{create_model, load_config, Config, Database, Pipeline};

const DEFAULT_CONFIG_FILE: &str = "docmatch.json";

/// Explicit path, else `./docmatch.json` if it exists, else built-in defaults.
pub fn resolve_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path) => {
            load_config(path).with_context(|| format!("Failed to load config from {path}"))
        }
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            load_config(DEFAULT_CONFIG_FILE).context("Failed to load ./docmatch.json")
        }
        None => Ok(Config::default()),
    }
}

pub fn open_database(config: &Config) -> anyhow::Result<Database> {
    let path = config.database.resolved_path();
    Database::open(&path).with_context(|| format!("Failed to open database at {}", path.display()))
}

/// Everything needed to run documents; requires a usable AI configuration.
pub fn build_pipeline(config_path: Option<&str>) -> anyhow::Result<Pipeline> {
    let config = resolve_config(config_path)?;
    let db = open_database(&config)?;
    let model = create_model(&config.ai).context("Failed to set up the language model")?;
    Ok(Pipeline::from_config(&config, db, model))
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
