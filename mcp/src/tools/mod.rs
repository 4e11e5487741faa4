//! MCP tool definitions and handlers.
//!
//! Each tool is defined as a JSON schema and handled by an async function
//! dispatched from [`handle_tool_call`].
//!
//! ## Tool categories
//!
//! **Key management** ([`keys`], listed only with more than one API key):
//! - `list_api_keys`, `get_key_organizations`, `set_default_key`
//! - `discover_all_organizations`, `find_organization_by_name`
//!
//! **Dynamic API** ([`api`]): search the endpoint catalog, describe an
//! endpoint's parameters, execute any catalog endpoint.
//!
//! **Common endpoints** ([`common`]): one tool per frequently used read.
//!
//! **Analysis** ([`analysis`]): multi-call reports (topology, device health,
//! inventory).
//!
//! **Backup** ([`backup`], listed only when the backup API key is set).

pub mod analysis;
pub mod api;
pub mod backup;
pub mod common;
pub mod keys;

use serde_json::{json, Value};

use crate::backup::BackupClient;
use crate::cache::ResponseCache;
use crate::keys::{KeyError, KeyRegistry};
use crate::search::{EndpointSearch, KeywordSearch};

/// Everything a tool handler may need.
pub struct ToolContext {
    /// Present when `MERAKI_API_KEY` is configured.
    pub keys: Option<KeyRegistry>,
    pub search: Box<dyn EndpointSearch>,
    /// Used when `search` is a remote backend and it fails.
    pub fallback_search: KeywordSearch,
    pub cache: ResponseCache,
    /// Present when `SELENT_API_KEY` is configured.
    pub backup: Option<BackupClient>,
}

impl ToolContext {
    fn registry(&self) -> Result<&KeyRegistry, ToolResult> {
        self.keys
            .as_ref()
            .ok_or_else(|| {
                ToolResult::error("Meraki API key not configured (set MERAKI_API_KEY)".into())
            })
    }

    fn backup_client(&self) -> Result<&BackupClient, ToolResult> {
        self.backup
            .as_ref()
            .ok_or_else(|| {
                ToolResult::error("Backup service not configured (set SELENT_API_KEY)".into())
            })
    }
}

/// Tool definitions visible for this configuration.
pub fn all_tool_definitions(ctx: &ToolContext) -> Vec<Value> {
    let mut tools = Vec::new();
    if let Some(registry) = &ctx.keys {
        if registry.is_multi_key() {
            tools.extend(keys::definitions());
        }
        tools.extend(api::definitions());
        tools.extend(common::definitions());
        tools.extend(analysis::definitions());
    }
    if ctx.backup.is_some() {
        tools.extend(backup::definitions());
    }
    tools
}

/// Handle a tool call and return MCP content.
pub async fn handle_tool_call(name: &str, args: &Value, ctx: &ToolContext) -> ToolResult {
    let listed = all_tool_definitions(ctx)
        .iter()
        .any(|t| t.get("name").and_then(Value::as_str) == Some(name));
    if !listed {
        return ToolResult::error(format!("Unknown tool: {name}"));
    }

    match name {
        "list_api_keys" => keys::handle_list_api_keys(ctx).await,
        "get_key_organizations" => keys::handle_get_key_organizations(args, ctx).await,
        "set_default_key" => keys::handle_set_default_key(args, ctx).await,
        "discover_all_organizations" => keys::handle_discover_all(ctx).await,
        "find_organization_by_name" => keys::handle_find_organization(args, ctx).await,
        "search_meraki_api_endpoints" => api::handle_search(args, ctx).await,
        "get_meraki_endpoint_parameters" => api::handle_parameters(args),
        "execute_meraki_api_endpoint" => api::handle_execute(args, ctx).await,
        "analyze_network_topology" => analysis::handle_network_topology(args, ctx).await,
        "analyze_device_health" => analysis::handle_device_health(args, ctx).await,
        "generate_network_inventory_report" => analysis::handle_inventory_report(args, ctx).await,
        "selent_backup" => backup::handle_backup(ctx).await,
        "selent_get_backup_status" => backup::handle_backup_status(args, ctx).await,
        "selent_restore" => backup::handle_restore(args, ctx).await,
        "selent_get_restore_status" => backup::handle_restore_status(args, ctx).await,
        "selent_get_compliance_types" => backup::handle_compliance_types(ctx).await,
        "selent_run_compliance_check" => backup::handle_compliance_check(args, ctx).await,
        _ => match common::find(name) {
            Some(tool) => common::handle(tool, args, ctx).await,
            None => ToolResult::error(format!("Unknown tool: {name}")),
        },
    }
}

/// Result of an MCP tool call, ready to be serialized into a JSON-RPC response.
#[derive(Debug)]
pub struct ToolResult {
    /// MCP content blocks (a single `{"type":"text","text":"..."}` entry).
    pub content: Vec<Value>,
    /// Maps to `isError` in the MCP response.
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(value: Value) -> Self {
        Self::text(serde_json::to_string_pretty(&value).unwrap_or_default())
    }

    /// Pre-rendered text, e.g. a cached response.
    pub fn text(text: String) -> Self {
        Self {
            content: vec![json!({ "type": "text", "text": text })],
            is_error: false,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            content: vec![json!({ "type": "text", "text": message })],
            is_error: true,
        }
    }

    /// Structured error body, pretty-printed.
    pub fn failure(value: Value) -> Self {
        Self {
            is_error: true,
            ..Self::success(value)
        }
    }

    /// Text of the first content block.
    #[cfg(test)]
    pub fn text_content(&self) -> &str {
        self.content
            .first()
            .and_then(|c| c.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

/// Key resolution failure with its remediation hint.
fn key_failure(err: &KeyError, registry: &KeyRegistry) -> ToolResult {
    ToolResult::failure(key_error_body(err, registry))
}

fn key_error_body(err: &KeyError, registry: &KeyRegistry) -> Value {
    let mut body = json!({ "error": err.to_string() });
    if let Some(hint) = err.hint() {
        body["suggestion"] = json!(hint);
    }
    if matches!(err, KeyError::KeyNotFound { .. }) {
        body["available_keys"] = json!(registry.credentials().ids().collect::<Vec<_>>());
    }
    body
}

// --- Argument helpers ---

/// Non-empty string argument.
fn str_arg<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn required_str<'a>(args: &'a Value, name: &str) -> Result<&'a str, ToolResult> {
    str_arg(args, name)
        .ok_or_else(|| ToolResult::error(format!("Missing required parameter: {name}")))
}

/// String argument that also accepts a JSON number (port ids, VLAN ids).
fn id_arg(args: &Value, name: &str) -> Option<String> {
    match args.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn bool_arg(args: &Value, name: &str, default: bool) -> bool {
    args.get(name).and_then(Value::as_bool).unwrap_or(default)
}

/// Schema fragment for the optional `key_id` routing argument.
fn key_id_property() -> Value {
    json!({
        "type": "string",
        "description": "API key id to use (see list_api_keys). Omit to route by organization or use the default key."
    })
}

/// Seconds since the Unix epoch, for report timestamps.
fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::credentials::CredentialSet;

    pub fn context(
        base_url: &str,
        keys: Option<&str>,
        backup: Option<BackupClient>,
    ) -> ToolContext {
        ToolContext {
            keys: keys.map(|k| KeyRegistry::new(CredentialSet::parse(k).unwrap(), base_url)),
            search: Box::new(KeywordSearch::new()),
            fallback_search: KeywordSearch::new(),
            cache: ResponseCache::default(),
            backup,
        }
    }

    pub fn body(result: &ToolResult) -> Value {
        serde_json::from_str(result.text_content()).unwrap()
    }
}
