//! Configuration file loading
//!
//! A TOML file can supply the database path and any decode option; flags given on
//! the command line take precedence.

use anyhow::{Context, Result};
use candump_decoder::DecodeConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration (loaded from a TOML file)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// DBC file, when not given on the command line
    #[serde(default)]
    pub database: Option<PathBuf>,

    #[serde(flatten)]
    pub decode: DecodeConfig,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
