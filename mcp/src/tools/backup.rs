//! Backup, restore and compliance tools (listed only with a backup API key).

use serde_json::{json, Value};
use tracing::warn;

use super::{required_str, str_arg, ToolContext, ToolResult};
use crate::backup::{BackupError, RestoreRequest};

const RESTORE_EXAMPLE: &str =
    "selent_restore(backup_id='backup-123', component_id='Q2XX-XXXX-XXXX', component_type='device', network_id='L_123456789', component_model='MX68')";

pub fn definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "selent_backup",
            "description": "Start a backup of the whole organization. Backups run asynchronously and take 1-2 minutes; poll selent_get_backup_status with the returned backup_id.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }
        }),
        json!({
            "name": "selent_get_backup_status",
            "description": "Status of a backup (RUNNING, SUCCESS, FAILED) with component statistics and an interpretation.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "backup_id": { "type": "string", "description": "Backup id returned by selent_backup" }
                },
                "required": ["backup_id"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "selent_restore",
            "description": "Restore a device or network from a backup. Device restores require component_model (use get_device_status to look it up).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "backup_id": { "type": "string", "description": "Backup to restore from" },
                    "component_id": { "type": "string", "description": "Device serial (e.g. \"Q2XX-XXXX-XXXX\") or network id (e.g. \"L_123456789\")" },
                    "component_type": { "type": "string", "enum": ["device", "network"], "description": "\"device\" or \"network\"" },
                    "network_id": { "type": "string", "description": "Target network for a device restore (optional)" },
                    "component_model": { "type": "string", "description": "Exact device model, e.g. \"MX68\". Required for device restores." }
                },
                "required": ["backup_id", "component_id", "component_type"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "selent_get_restore_status",
            "description": "Status of a restore (RUNNING, SUCCESS, FAILED, ERROR) with an interpretation and per-component breakdown.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "restore_id": { "type": "string", "description": "Restore id returned by selent_restore" }
                },
                "required": ["restore_id"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "selent_get_compliance_types",
            "description": "List the available compliance check types.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }
        }),
        json!({
            "name": "selent_run_compliance_check",
            "description": "Run a compliance check of the given type, optionally scoped to one network.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "compliance_type": { "type": "string", "description": "One of the types from selent_get_compliance_types" },
                    "network_id": { "type": "string", "description": "Limit the check to this network" }
                },
                "required": ["compliance_type"],
                "additionalProperties": false
            }
        }),
    ]
}

/// Error body shared by every backup tool.
fn usage_error(message: String, example: &str) -> Value {
    json!({ "error": true, "message": message, "example": example })
}

fn service_failure(err: &BackupError, example: &str) -> ToolResult {
    warn!("Backup service call failed: {err}");
    let mut body = err.to_json();
    if !example.is_empty() {
        body["example"] = json!(example);
    }
    ToolResult::failure(body)
}

fn seconds(value: &Value) -> String {
    format!("{:.1} seconds", value.as_f64().unwrap_or(0.0))
}

pub async fn handle_backup(ctx: &ToolContext) -> ToolResult {
    let client = match ctx.backup_client() {
        Ok(c) => c,
        Err(e) => return e,
    };
    let response = match client.create_backup().await {
        Ok(r) => r,
        Err(e) => return service_failure(&e, "selent_backup()"),
    };

    let backup_id = response.data.get("id").and_then(Value::as_str).unwrap_or("unknown");
    ToolResult::success(json!({
        "error": false,
        "backup_id": backup_id,
        "status": response.data.get("status").and_then(Value::as_str).unwrap_or("RUNNING"),
        "message": format!("Backup operation initiated successfully. ID: {backup_id}"),
        "estimated_duration": "1-2 minutes",
        "next_steps": [
            format!("Use selent_get_backup_status('{backup_id}') to monitor progress"),
            "Status will change from 'RUNNING' to 'SUCCESS' or 'FAILED'",
            "Backup runs asynchronously in the background",
        ],
    }))
}

pub async fn handle_backup_status(args: &Value, ctx: &ToolContext) -> ToolResult {
    let client = match ctx.backup_client() {
        Ok(c) => c,
        Err(e) => return e,
    };
    let backup_id = match required_str(args, "backup_id") {
        Ok(b) => b,
        Err(e) => return e,
    };
    let response = match client.backup_status(backup_id).await {
        Ok(r) => r,
        Err(e) => return service_failure(&e, &format!("selent_get_backup_status('{backup_id}')")),
    };

    let status = response.data.get("status").and_then(Value::as_str).unwrap_or("UNKNOWN");
    let structure = response.data.get("structure").cloned().unwrap_or_else(|| json!({}));
    let stats = structure.get("statistics").cloned().unwrap_or_else(|| json!({}));
    let execution_time = seconds(&stats["execution_time_seconds"]);
    let interpretation = backup_interpretation(status, &stats);

    ToolResult::success(json!({
        "error": false,
        "backup_id": backup_id,
        "status": status,
        "progress_details": structure,
        "component_counts": stats,
        "execution_time": execution_time,
        "interpretation": interpretation,
    }))
}

fn backup_interpretation(status: &str, stats: &Value) -> Value {
    let count = |key: &str| stats.get(key).and_then(Value::as_u64).unwrap_or(0);
    match status {
        "RUNNING" => json!({
            "message": "Backup is currently in progress",
            "action": "Wait and check again in 30-60 seconds",
            "typical_duration": "1-2 minutes total",
        }),
        "SUCCESS" => json!({
            "message": "Backup completed successfully",
            "summary": format!(
                "Backed up {} components in {}",
                count("total_components"),
                seconds(&stats["execution_time_seconds"])
            ),
            "success_rate": format!(
                "{}/{} components successful",
                count("successful_components"),
                count("total_components")
            ),
        }),
        "FAILED" => json!({
            "message": "Backup failed",
            "action": "Check logs or retry backup creation",
        }),
        other => json!({
            "message": format!("Unknown status: {other}"),
            "action": "Check backup ID or contact support",
        }),
    }
}

pub async fn handle_restore(args: &Value, ctx: &ToolContext) -> ToolResult {
    let client = match ctx.backup_client() {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (backup_id, component_id, component_type) = match (
        required_str(args, "backup_id"),
        required_str(args, "component_id"),
        required_str(args, "component_type"),
    ) {
        (Ok(b), Ok(c), Ok(t)) => (b, c, t),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return e,
    };
    let network_id = str_arg(args, "network_id");
    let component_model = str_arg(args, "component_model");

    if !matches!(component_type, "device" | "network") {
        return ToolResult::failure(usage_error(
            format!("Invalid component_type '{component_type}'. Must be 'device' or 'network'."),
            RESTORE_EXAMPLE,
        ));
    }
    if component_type == "device" && component_model.is_none() {
        let mut body = usage_error(
            "component_model is required when restoring a device. Device restores will fail without the correct model specified.".into(),
            RESTORE_EXAMPLE,
        );
        body["note"] = json!("The component_model must match the actual device model (e.g., 'MX68', 'MS220-8P', 'MR33')");
        body["how_to_get_model"] = json!("Use get_device_status(serial) to fetch device information including the model field");
        return ToolResult::failure(body);
    }

    let request = RestoreRequest {
        component_id: component_id.to_string(),
        backup_id: backup_id.to_string(),
        component_type: component_type.to_string(),
        component_model: component_model.map(String::from),
        network_id: network_id.map(String::from),
    };
    let response = match client.restore(&request).await {
        Ok(r) => r,
        Err(e) => return service_failure(&e, RESTORE_EXAMPLE),
    };

    let restore_id = response.data.get("id").and_then(Value::as_str).unwrap_or("unknown");
    let mut guidance = json!({
        "component_restored": format!("{component_type} {component_id}"),
        "backup_source": backup_id,
        "next_steps": [
            "Verify the restore completed successfully",
            "Check the component configuration in Dashboard",
            "Test connectivity if restoring a device",
        ],
    });
    if component_type == "device" {
        guidance["device_notes"] = json!([
            "Device may need to reboot to apply restored configuration",
            "Check device status in Meraki Dashboard",
            "Verify network connectivity after restore",
        ]);
    } else {
        guidance["network_notes"] = json!([
            "All network settings have been restored",
            "Devices in the network may inherit updated settings",
            "Check network-wide policies and configurations",
        ]);
    }

    ToolResult::success(json!({
        "error": false,
        "restore_id": restore_id,
        "status": response.data.get("status").and_then(Value::as_str).unwrap_or("RUNNING"),
        "component_type": component_type,
        "component_id": component_id,
        "backup_id": backup_id,
        "message": format!("Restore operation initiated successfully. ID: {restore_id}"),
        "guidance": guidance,
    }))
}

pub async fn handle_restore_status(args: &Value, ctx: &ToolContext) -> ToolResult {
    let client = match ctx.backup_client() {
        Ok(c) => c,
        Err(e) => return e,
    };
    let restore_id = match required_str(args, "restore_id") {
        Ok(r) => r,
        Err(e) => return e,
    };
    let response = match client.restore_status(restore_id).await {
        Ok(r) => r,
        Err(e) => return service_failure(&e, &format!("selent_get_restore_status('{restore_id}')")),
    };

    let data = &response.data;
    let field = |key: &str| data.get(key).and_then(Value::as_str).unwrap_or("unknown");
    let status = data.get("status").and_then(Value::as_str).unwrap_or("UNKNOWN");
    let structure = data.get("structure").cloned().unwrap_or_else(|| json!({}));

    ToolResult::success(json!({
        "error": false,
        "restore_id": restore_id,
        "status": status,
        "component_type": field("component_type"),
        "component_id": field("component_id"),
        "backup_id": field("backup_id"),
        "execution_time": seconds(&structure["execution_time_seconds"]),
        "interpretation": restore_interpretation(
            status,
            field("component_type"),
            field("component_id"),
            &structure,
        ),
        "progress_details": structure,
    }))
}

fn restore_interpretation(status: &str, kind: &str, id: &str, structure: &Value) -> Value {
    match status {
        "RUNNING" => json!({
            "message": format!("Restore of {kind} {id} is currently in progress"),
            "action": "Wait and check again in 30-60 seconds",
            "typical_duration": "1-2 minutes for most components",
        }),
        "SUCCESS" => json!({
            "message": format!("{} {id} restored successfully", capitalize(kind)),
            "summary": format!("Restore operation completed for {kind} {id}"),
            "next_steps": [
                "Verify the component configuration in Dashboard",
                "Test connectivity if a device was restored",
                "Check that settings have been applied correctly",
            ],
        }),
        "FAILED" => json!({
            "message": format!("Restore of {kind} {id} failed"),
            "action": "Check logs or retry restore operation",
            "troubleshooting": [
                "Verify the component still exists in the organization",
                "Check if the backup contains the required data",
                "Ensure the target network exists (for device restores)",
            ],
        }),
        "ERROR" => {
            let breakdown: Vec<String> = structure
                .get("components")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .map(|c| {
                    let name = c.get("component").and_then(Value::as_str).unwrap_or("unknown");
                    let state = c.get("status").and_then(Value::as_str).unwrap_or("unknown");
                    format!("{name}: {state}")
                })
                .collect();
            let mut interpretation = json!({
                "message": format!("Restore of {kind} {id} encountered errors"),
                "action": "Check component-level status for details",
                "component_status": breakdown,
            });
            if !breakdown.is_empty() {
                interpretation["summary"] =
                    json!(format!("Component breakdown: {}", breakdown.join(", ")));
            }
            interpretation
        }
        other => json!({
            "message": format!("Unknown restore status: {other}"),
            "action": "Check restore ID or contact support",
        }),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub async fn handle_compliance_types(ctx: &ToolContext) -> ToolResult {
    let client = match ctx.backup_client() {
        Ok(c) => c,
        Err(e) => return e,
    };
    match client.compliance_types().await {
        Ok(response) => ToolResult::success(json!(response)),
        Err(e) => service_failure(&e, "selent_get_compliance_types()"),
    }
}

pub async fn handle_compliance_check(args: &Value, ctx: &ToolContext) -> ToolResult {
    let client = match ctx.backup_client() {
        Ok(c) => c,
        Err(e) => return e,
    };
    let compliance_type = match required_str(args, "compliance_type") {
        Ok(t) => t,
        Err(e) => return e,
    };
    match client
        .run_compliance_check(compliance_type, str_arg(args, "network_id"))
        .await
    {
        Ok(response) => ToolResult::success(json!(response)),
        Err(e) => service_failure(&e, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::super::handle_tool_call;
    use super::super::test_support::{body, context};
    use super::*;
    use crate::backup::BackupClient;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backup_context(server_uri: &str) -> crate::tools::ToolContext {
        let backup = BackupClient::new(server_uri, "bk").unwrap();
        context("http://127.0.0.1:9", None, Some(backup))
    }

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("device"), "Device");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn success_interpretation_uses_statistics() {
        let stats = json!({"total_components": 12, "successful_components": 11, "execution_time_seconds": 73.34});
        let interpretation = backup_interpretation("SUCCESS", &stats);
        assert_eq!(interpretation["summary"], "Backed up 12 components in 73.3 seconds");
        assert_eq!(interpretation["success_rate"], "11/12 components successful");
        assert_eq!(
            backup_interpretation("PAUSED", &json!({}))["message"],
            "Unknown status: PAUSED"
        );
    }

    #[test]
    fn error_interpretation_lists_components() {
        let structure = json!({"components": [
            {"component": "vlans", "status": "SUCCESS"},
            {"component": "ssids", "status": "FAILED"}
        ]});
        let interpretation = restore_interpretation("ERROR", "network", "L_1", &structure);
        assert_eq!(interpretation["component_status"], json!(["vlans: SUCCESS", "ssids: FAILED"]));
        assert_eq!(interpretation["summary"], "Component breakdown: vlans: SUCCESS, ssids: FAILED");

        let empty = restore_interpretation("ERROR", "network", "L_1", &json!({}));
        assert!(empty.get("summary").is_none());
    }

    #[tokio::test]
    async fn backup_returns_id_and_next_steps() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp/backups"))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({"id": "b-1", "status": "RUNNING"})),
            )
            .mount(&server)
            .await;

        let ctx = backup_context(&server.uri());
        let result = handle_tool_call("selent_backup", &json!({}), &ctx).await;
        assert!(!result.is_error);
        let parsed = body(&result);
        assert_eq!(parsed["backup_id"], "b-1");
        assert_eq!(parsed["estimated_duration"], "1-2 minutes");
        assert!(parsed["next_steps"][0].as_str().unwrap().contains("b-1"));
    }

    #[tokio::test]
    async fn backup_status_failure_carries_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mcp/backups/missing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Backup not found"})),
            )
            .mount(&server)
            .await;

        let ctx = backup_context(&server.uri());
        let result = handle_tool_call(
            "selent_get_backup_status",
            &json!({"backup_id": "missing"}),
            &ctx,
        )
        .await;
        assert!(result.is_error);
        let parsed = body(&result);
        assert_eq!(parsed["status"], 404);
        assert_eq!(parsed["payload"]["detail"], "Backup not found");
        assert_eq!(parsed["example"], "selent_get_backup_status('missing')");
    }

    #[tokio::test]
    async fn restore_validates_component_type_and_model() {
        let ctx = backup_context("http://127.0.0.1:9");
        let bad_type = handle_tool_call(
            "selent_restore",
            &json!({"backup_id": "b", "component_id": "c", "component_type": "switch"}),
            &ctx,
        )
        .await;
        assert!(bad_type.is_error);
        assert!(body(&bad_type)["message"]
            .as_str()
            .unwrap()
            .contains("Invalid component_type 'switch'"));

        let no_model = handle_tool_call(
            "selent_restore",
            &json!({"backup_id": "b", "component_id": "Q1", "component_type": "device", "component_model": ""}),
            &ctx,
        )
        .await;
        assert!(no_model.is_error);
        let parsed = body(&no_model);
        assert!(parsed["how_to_get_model"].is_string());
        assert!(parsed["note"].is_string());
    }

    #[tokio::test]
    async fn network_restore_omits_empty_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp/restores"))
            .and(body_json(json!({
                "component_id": "L_1",
                "backup_id": "b-1",
                "component_type": "network"
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"id": "r-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = backup_context(&server.uri());
        let result = handle_tool_call(
            "selent_restore",
            &json!({
                "backup_id": "b-1",
                "component_id": "L_1",
                "component_type": "network",
                "network_id": "",
                "component_model": ""
            }),
            &ctx,
        )
        .await;
        assert!(!result.is_error, "{}", result.text_content());
        let parsed = body(&result);
        assert_eq!(parsed["restore_id"], "r-1");
        assert_eq!(parsed["status"], "RUNNING");
        assert!(parsed["guidance"]["network_notes"].is_array());
        assert!(parsed["guidance"].get("device_notes").is_none());
    }

    #[tokio::test]
    async fn restore_status_reports_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mcp/restores/r-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "SUCCESS",
                "component_type": "device",
                "component_id": "Q1",
                "backup_id": "b-1",
                "structure": {"execution_time_seconds": 12}
            })))
            .mount(&server)
            .await;

        let ctx = backup_context(&server.uri());
        let result = handle_tool_call(
            "selent_get_restore_status",
            &json!({"restore_id": "r-1"}),
            &ctx,
        )
        .await;
        let parsed = body(&result);
        assert_eq!(parsed["execution_time"], "12.0 seconds");
        assert_eq!(parsed["interpretation"]["message"], "Device Q1 restored successfully");
        assert_eq!(parsed["backup_id"], "b-1");
    }

    #[tokio::test]
    async fn compliance_types_pass_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mcp/compliance/types"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["PCI", "HIPAA"])))
            .mount(&server)
            .await;

        let ctx = backup_context(&server.uri());
        let result = handle_tool_call("selent_get_compliance_types", &json!({}), &ctx).await;
        let parsed = body(&result);
        assert_eq!(parsed["status"], 200);
        assert_eq!(parsed["data"], json!(["PCI", "HIPAA"]));
    }
}
