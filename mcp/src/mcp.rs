//! MCP (Model Context Protocol) JSON-RPC handler.
//!
//! Implements the [MCP specification](https://spec.modelcontextprotocol.io/)
//! over stdio: JSON-RPC 2.0 requests are read from stdin (one per line) and
//! responses are written to stdout. Logs go to stderr.
//!
//! ## Supported methods
//!
//! | Method              | Description                      |
//! |---------------------|----------------------------------|
//! | `initialize`        | Handshake, returns capabilities  |
//! | `tools/list`        | List available tool definitions  |
//! | `tools/call`        | Execute a tool and return result |
//! | `ping`              | Liveness check                   |
//!
//! Notifications (`notifications/initialized`, `notifications/cancelled`) are
//! acknowledged silently.

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::tools::{self, ToolContext};

const SERVER_NAME: &str = "mcp-meraki";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Run the MCP server on stdio, processing JSON-RPC requests until EOF.
pub async fn run_stdio(ctx: ToolContext) {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    info!(
        "{SERVER_NAME} {SERVER_VERSION} ready ({} tools)",
        tools::all_tool_definitions(&ctx).len()
    );

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                error!("stdin read error: {e}");
                break;
            }
        }

        if let Some(response) = handle_message(line.trim(), &ctx).await {
            write_response(&mut stdout, &response).await;
        }
    }
    info!("stdin closed, shutting down");
}

/// Handle one input line. Returns the response to write, if any.
async fn handle_message(line: &str, ctx: &ToolContext) -> Option<Value> {
    if line.is_empty() {
        return None;
    }

    let request: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!("Unparseable request: {e}");
            return Some(json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": {
                    "code": -32700,
                    "message": format!("Parse error: {e}")
                }
            }));
        }
    };

    let id = request.get("id").cloned();
    let method = request.get("method").and_then(Value::as_str).unwrap_or("");

    // Notifications (no id): acknowledge silently
    if id.is_none() {
        match method {
            "notifications/initialized" | "notifications/cancelled" => {}
            _ => debug!("Ignoring notification: {method}"),
        }
        return None;
    }

    let response = match method {
        "initialize" => handle_initialize(&request),
        "tools/list" => handle_tools_list(ctx),
        "tools/call" => handle_tools_call(&request, ctx).await,
        "ping" => json!({ "jsonrpc": "2.0", "result": {} }),
        _ => json!({
            "jsonrpc": "2.0",
            "error": {
                "code": -32601,
                "message": format!("Method not found: {method}")
            }
        }),
    };

    Some(inject_id(response, id))
}

/// Handle `initialize`: protocol version, capabilities, and server info.
fn handle_initialize(request: &Value) -> Value {
    if let Some(client) = request.pointer("/params/clientInfo/name").and_then(Value::as_str) {
        info!("Client connected: {client}");
    }
    json!({
        "jsonrpc": "2.0",
        "result": {
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            }
        }
    })
}

fn handle_tools_list(ctx: &ToolContext) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": {
            "tools": tools::all_tool_definitions(ctx)
        }
    })
}

/// Handle `tools/call`: dispatch to the matching tool handler.
async fn handle_tools_call(request: &Value, ctx: &ToolContext) -> Value {
    let params = request.get("params").cloned().unwrap_or(json!({}));
    let name = params.get("name").and_then(Value::as_str).unwrap_or("");
    let args = params.get("arguments").cloned().unwrap_or(json!({}));

    debug!("tools/call {name}");
    let result = tools::handle_tool_call(name, &args, ctx).await;
    if result.is_error {
        debug!("{name} returned an error result");
    }

    let mut response_result = json!({
        "content": result.content
    });
    if result.is_error {
        response_result["isError"] = json!(true);
    }

    json!({
        "jsonrpc": "2.0",
        "result": response_result
    })
}

/// Inject the request `id` into a response object.
fn inject_id(mut response: Value, id: Option<Value>) -> Value {
    if let Some(id) = id {
        response["id"] = id;
    }
    response
}

/// Write a JSON-RPC response to stdout (one line, flushed immediately).
async fn write_response(stdout: &mut tokio::io::Stdout, response: &Value) {
    let mut output = serde_json::to_string(response).unwrap_or_default();
    output.push('\n');
    if let Err(e) = stdout.write_all(output.as_bytes()).await {
        error!("stdout write error: {e}");
    }
    if let Err(e) = stdout.flush().await {
        error!("stdout flush error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::context;

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let ctx = context("http://127.0.0.1:9", Some("abc"), None);
        let response = handle_message(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"clientInfo":{"name":"test"}}}"#,
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(response["result"]["serverInfo"]["name"], "mcp-meraki");
        assert_eq!(response["result"]["capabilities"]["tools"]["listChanged"], false);
    }

    #[tokio::test]
    async fn parse_errors_and_unknown_methods() {
        let ctx = context("http://127.0.0.1:9", Some("abc"), None);
        let parse = handle_message("{not json", &ctx).await.unwrap();
        assert_eq!(parse["error"]["code"], -32700);
        assert!(parse["id"].is_null());

        let unknown = handle_message(
            r#"{"jsonrpc":"2.0","id":"x","method":"resources/list"}"#,
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(unknown["error"]["code"], -32601);
        assert_eq!(unknown["id"], "x");
    }

    #[tokio::test]
    async fn notifications_and_blank_lines_get_no_response() {
        let ctx = context("http://127.0.0.1:9", Some("abc"), None);
        assert!(handle_message("", &ctx).await.is_none());
        assert!(handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, &ctx)
            .await
            .is_none());
        assert!(handle_message(r#"{"jsonrpc":"2.0","method":"notifications/other"}"#, &ctx)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn ping_and_tools_list() {
        let ctx = context("http://127.0.0.1:9", Some("abc"), None);
        let ping = handle_message(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#, &ctx)
            .await
            .unwrap();
        assert_eq!(ping["result"], json!({}));

        let list = handle_message(r#"{"jsonrpc":"2.0","id":8,"method":"tools/list"}"#, &ctx)
            .await
            .unwrap();
        let tools = list["result"]["tools"].as_array().unwrap();
        assert!(tools.iter().any(|t| t["name"] == "search_meraki_api_endpoints"));
    }

    #[tokio::test]
    async fn tools_call_marks_errors() {
        let ctx = context("http://127.0.0.1:9", Some("abc"), None);
        let response = handle_message(
            r#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"no_such_tool","arguments":{}}}"#,
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(response["result"]["isError"], true);
        assert_eq!(response["result"]["content"][0]["text"], "Unknown tool: no_such_tool");

        let ok = handle_message(
            r#"{"jsonrpc":"2.0","id":10,"method":"tools/call","params":{"name":"get_meraki_endpoint_parameters","arguments":{"section":"devices","method":"getDevice"}}}"#,
            &ctx,
        )
        .await
        .unwrap();
        assert!(ok["result"].get("isError").is_none());
    }
}
