//! # mcp-meraki
//!
//! MCP (Model Context Protocol) server for the Meraki Dashboard API. Runs as
//! a stdio JSON-RPC server, designed to be launched by an AI agent host.
//! Several Dashboard API keys can be configured at once; each call is routed
//! to the key that can reach the requested organization.
//!
//! ## Architecture
//!
//! ```text
//! main.rs          - entry point, logging, config loading, MCP server launch
//! config.rs        - JSON file / env-var configuration loading
//! credentials.rs   - multi-key MERAKI_API_KEY parsing
//! client.rs        - Dashboard HTTP client (retries, pagination)
//! catalog.rs       - static endpoint catalog and request preparation
//! organizations.rs - organization → key directory
//! keys.rs          - key registry, client pool, key resolution
//! cache.rs         - TTL cache for read-only responses
//! search.rs        - endpoint search (keyword, Qdrant vector)
//! backup.rs        - Selent backup/restore/compliance client
//! mcp.rs           - MCP JSON-RPC protocol handler (stdio)
//! tools/           - tool definitions and handlers
//! ```
//!
//! ## Tools
//!
//! - **Key management** (several keys only): `list_api_keys`,
//!   `get_key_organizations`, `set_default_key`, `discover_all_organizations`,
//!   `find_organization_by_name`
//! - **Dynamic API**: `search_meraki_api_endpoints`,
//!   `get_meraki_endpoint_parameters`, `execute_meraki_api_endpoint`
//! - **Common endpoints**: `get_organizations`, `get_device_status`,
//!   `get_network_clients`, `get_switch_port_config`, ...
//! - **Analysis**: `analyze_network_topology`, `analyze_device_health`,
//!   `generate_network_inventory_report`
//! - **Backup** (backup key only): `selent_backup`, `selent_restore`, ...

mod backup;
mod cache;
mod catalog;
mod client;
mod config;
mod credentials;
mod keys;
mod mcp;
mod organizations;
mod search;
mod tools;
mod util;

use clap::Parser;
use tracing::{info, warn};

use backup::BackupClient;
use cache::ResponseCache;
use config::{Cli, Config};
use credentials::CredentialSet;
use keys::KeyRegistry;
use search::{EndpointSearch, KeywordSearch, VectorSearch};
use tools::ToolContext;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match config::load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("mcp-meraki: configuration error: {e}");
            std::process::exit(1);
        }
    };

    // stdout carries the protocol, so logs go to stderr.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = match build_context(&config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("mcp-meraki: configuration error: {e}");
            std::process::exit(1);
        }
    };

    mcp::run_stdio(ctx).await;
}

fn build_context(config: &Config) -> Result<ToolContext, String> {
    let keys = match &config.meraki_api_key {
        Some(raw) => {
            let credentials = CredentialSet::parse(raw).map_err(|e| e.to_string())?;
            info!(
                "{} Meraki API key(s) configured: {}",
                credentials.len(),
                credentials.available()
            );
            Some(KeyRegistry::new(credentials, &config.meraki_base_url))
        }
        None => {
            info!("Meraki tools disabled (MERAKI_API_KEY not set)");
            None
        }
    };

    let backup = match &config.selent_api_key {
        Some(key) => {
            Some(BackupClient::new(&config.selent_base_url, key).map_err(|e| e.to_string())?)
        }
        None => {
            info!("Backup tools disabled (SELENT_API_KEY not set)");
            None
        }
    };

    let search: Box<dyn EndpointSearch> = match &config.qdrant {
        Some(qdrant) => match VectorSearch::new(
            &qdrant.url,
            &qdrant.collection,
            &qdrant.model,
            qdrant.api_key.clone(),
        ) {
            Ok(vector) => {
                info!(
                    "Endpoint search: Qdrant collection '{}' at {}",
                    qdrant.collection, qdrant.url
                );
                Box::new(vector)
            }
            Err(e) => {
                warn!("Qdrant search unavailable, using keyword search: {e}");
                Box::new(KeywordSearch::new())
            }
        },
        None => Box::new(KeywordSearch::new()),
    };

    Ok(ToolContext {
        keys,
        search,
        fallback_search: KeywordSearch::new(),
        cache: ResponseCache::default(),
        backup,
    })
}
