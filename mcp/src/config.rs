//! Configuration loading for mcp-meraki.
//!
//! Settings are layered (later sources win):
//!
//! 1. **JSON file** via `--config <path>`, or else via the `MERAKI_MCP_CONFIG`
//!    environment variable
//! 2. **Environment variables**: `MERAKI_API_KEY`, `MERAKI_BASE_URL`,
//!    `SELENT_API_KEY`, `SELENT_API_BASE_URL`, `QDRANT_URL`,
//!    `QDRANT_COLLECTION`, `QDRANT_MODEL`, `QDRANT_API_KEY`
//! 3. **CLI flags** (`--log-level`)
//!
//! `MERAKI_API_KEY` accepts several keys: `"key1,key2"` or
//! `"name1:key1,name2:key2"`. At least one of the Meraki and backup keys
//! must be set. See `config.example.json` for the file format.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::util::expand_tilde;

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_QDRANT_COLLECTION: &str = "meraki_api_collection";
pub const DEFAULT_QDRANT_MODEL: &str = "BAAI/bge-small-en-v1.5";

/// CLI arguments parsed by `clap`.
#[derive(Parser, Debug, Default)]
#[command(name = "mcp-meraki", version, about = "MCP server for the Meraki Dashboard API")]
pub struct Cli {
    /// Path to config file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level or filter directive when RUST_LOG is unset (e.g. "debug")
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Raw JSON config file structure. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub meraki_api_key: Option<String>,
    pub meraki_base_url: Option<String>,
    pub selent_api_key: Option<String>,
    pub selent_api_base_url: Option<String>,
    pub qdrant_url: Option<String>,
    pub qdrant_collection: Option<String>,
    pub qdrant_model: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub log_level: Option<String>,
}

/// Vector search backend settings.
#[derive(Debug, Clone, PartialEq)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Validated configuration.
#[derive(Debug)]
pub struct Config {
    /// Raw multi-key string, parsed by `CredentialSet`.
    pub meraki_api_key: Option<String>,
    pub meraki_base_url: String,
    pub selent_api_key: Option<String>,
    pub selent_base_url: String,
    /// `None` selects keyword search.
    pub qdrant: Option<QdrantConfig>,
    pub log_level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("No API key configured: set MERAKI_API_KEY and/or SELENT_API_KEY")]
    NoApiKeys,
}

/// Load configuration from the process environment.
pub fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    load_with_env(cli, |name| std::env::var(name).ok())
}

/// Load configuration with an injectable environment lookup.
pub fn load_with_env(
    cli: &Cli,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .or_else(|| env("MERAKI_MCP_CONFIG"));
    let file = match path {
        Some(path) => load_file(&expand_tilde(&path))?,
        None => FileConfig::default(),
    };

    // Empty values count as unset.
    let var = |name: &str| env(name).filter(|v| !v.trim().is_empty());
    let pick = |name: &str, from_file: Option<String>| {
        var(name).or(from_file.filter(|v| !v.trim().is_empty()))
    };

    let meraki_api_key = pick("MERAKI_API_KEY", file.meraki_api_key);
    let selent_api_key = pick("SELENT_API_KEY", file.selent_api_key);
    if meraki_api_key.is_none() && selent_api_key.is_none() {
        return Err(ConfigError::NoApiKeys);
    }

    let qdrant = pick("QDRANT_URL", file.qdrant_url).map(|url| QdrantConfig {
        url,
        collection: pick("QDRANT_COLLECTION", file.qdrant_collection)
            .unwrap_or_else(|| DEFAULT_QDRANT_COLLECTION.into()),
        model: pick("QDRANT_MODEL", file.qdrant_model)
            .unwrap_or_else(|| DEFAULT_QDRANT_MODEL.into()),
        api_key: pick("QDRANT_API_KEY", file.qdrant_api_key),
    });

    Ok(Config {
        meraki_api_key,
        meraki_base_url: pick("MERAKI_BASE_URL", file.meraki_base_url)
            .unwrap_or_else(|| crate::client::DEFAULT_BASE_URL.into()),
        selent_api_key,
        selent_base_url: pick("SELENT_API_BASE_URL", file.selent_api_base_url)
            .unwrap_or_else(|| crate::backup::DEFAULT_BASE_URL.into()),
        qdrant,
        log_level: cli
            .log_level
            .clone()
            .or(file.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.into()),
    })
}

fn load_file(path: &str) -> Result<FileConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}
