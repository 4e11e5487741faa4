//! Direct tools for frequently used Dashboard reads.
//!
//! Each tool is a row in [`COMMON_TOOLS`]: a fixed catalog endpoint plus the
//! arguments that feed its path parameters. Output is
//! `{method, <ids>, timespan?, count?, <payload>}`.

use serde_json::{json, Map, Value};
use tracing::warn;

use super::{id_arg, key_failure, key_id_property, str_arg, ToolContext, ToolResult};

/// Default client lookback for `get_network_clients`: 30 days.
const CLIENTS_TIMESPAN: u64 = 2_592_000;

/// Tool argument feeding a Dashboard parameter.
pub struct Input {
    pub arg: &'static str,
    pub param: &'static str,
    pub description: &'static str,
}

pub struct CommonTool {
    pub name: &'static str,
    pub description: &'static str,
    pub section: &'static str,
    pub method: &'static str,
    pub inputs: &'static [Input],
    /// Key the response is placed under.
    pub payload: &'static str,
    /// Add `count` for list responses.
    pub counted: bool,
    /// Tools that take a `timespan` argument, with its default.
    pub timespan: Option<u64>,
}

const ORGANIZATION_ID: Input = Input {
    arg: "organization_id",
    param: "organizationId",
    description: "Organization id, e.g. \"123456\"",
};
const NETWORK_ID: Input = Input {
    arg: "network_id",
    param: "networkId",
    description: "Network id, e.g. \"N_12345\"",
};
const SERIAL: Input = Input {
    arg: "serial",
    param: "serial",
    description: "Device serial number, e.g. \"Q2XX-XXXX-XXXX\"",
};
const PORT_ID: Input = Input {
    arg: "port_id",
    param: "portId",
    description: "Switch port id, e.g. \"1\" or \"24\"",
};

pub static COMMON_TOOLS: &[CommonTool] = &[
    CommonTool {
        name: "get_organizations",
        description: "Get all organizations accessible by the API key, with id, name and url.",
        section: "organizations",
        method: "getOrganizations",
        inputs: &[],
        payload: "organizations",
        counted: true,
        timespan: None,
    },
    CommonTool {
        name: "get_organization_devices",
        description: "Get all devices in an organization (serial, model, name, networkId).",
        section: "organizations",
        method: "getOrganizationDevices",
        inputs: &[ORGANIZATION_ID],
        payload: "devices",
        counted: true,
        timespan: None,
    },
    CommonTool {
        name: "get_organization_networks",
        description: "Get all networks in an organization (networkId, name, productTypes, timezone).",
        section: "organizations",
        method: "getOrganizationNetworks",
        inputs: &[ORGANIZATION_ID],
        payload: "networks",
        counted: true,
        timespan: None,
    },
    CommonTool {
        name: "get_device_status",
        description: "Get a device's status and basic information (model, name, network, LAN/WAN addresses).",
        section: "devices",
        method: "getDevice",
        inputs: &[SERIAL],
        payload: "device",
        counted: false,
        timespan: None,
    },
    CommonTool {
        name: "get_network_clients",
        description: "Get clients seen on a network. Default timespan is 30 days (2592000 seconds).",
        section: "networks",
        method: "getNetworkClients",
        inputs: &[NETWORK_ID],
        payload: "clients",
        counted: true,
        timespan: Some(CLIENTS_TIMESPAN),
    },
    CommonTool {
        name: "get_switch_port_config",
        description: "Get a switch port's configuration (VLAN, access policy, PoE).",
        section: "switch",
        method: "getDeviceSwitchPort",
        inputs: &[SERIAL, PORT_ID],
        payload: "configuration",
        counted: false,
        timespan: None,
    },
    CommonTool {
        name: "get_network_settings",
        description: "Get network-wide settings such as the local and remote status pages.",
        section: "networks",
        method: "getNetworkSettings",
        inputs: &[NETWORK_ID],
        payload: "settings",
        counted: false,
        timespan: None,
    },
    CommonTool {
        name: "get_firewall_rules",
        description: "Get the Layer 3 firewall rules of a network's appliance.",
        section: "appliance",
        method: "getNetworkApplianceFirewallL3FirewallRules",
        inputs: &[NETWORK_ID],
        payload: "rules",
        counted: false,
        timespan: None,
    },
    CommonTool {
        name: "get_organization_uplinks_statuses",
        description: "Get uplink status for every device in an organization.",
        section: "organizations",
        method: "getOrganizationUplinksStatuses",
        inputs: &[ORGANIZATION_ID],
        payload: "uplinks",
        counted: true,
        timespan: None,
    },
    CommonTool {
        name: "get_network_topology",
        description: "Get the link layer topology of a network (devices and their connections).",
        section: "networks",
        method: "getNetworkTopologyLinkLayer",
        inputs: &[NETWORK_ID],
        payload: "topology",
        counted: false,
        timespan: None,
    },
];

pub fn find(name: &str) -> Option<&'static CommonTool> {
    COMMON_TOOLS.iter().find(|t| t.name == name)
}

pub fn definitions() -> Vec<Value> {
    COMMON_TOOLS.iter().map(definition).collect()
}

fn definition(tool: &CommonTool) -> Value {
    let mut properties = Map::new();
    for input in tool.inputs {
        properties.insert(
            input.arg.into(),
            json!({ "type": "string", "description": input.description }),
        );
    }
    if let Some(default) = tool.timespan {
        properties.insert(
            "timespan".into(),
            json!({
                "type": "integer",
                "description": format!("Time range in seconds (default {default})")
            }),
        );
    }
    properties.insert("key_id".into(), key_id_property());
    let required: Vec<&str> = tool.inputs.iter().map(|i| i.arg).collect();

    json!({
        "name": tool.name,
        "description": tool.description,
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        }
    })
}

pub async fn handle(tool: &CommonTool, args: &Value, ctx: &ToolContext) -> ToolResult {
    let registry = match ctx.registry() {
        Ok(r) => r,
        Err(e) => return e,
    };

    let mut ids = Map::new();
    let mut params = Map::new();
    for input in tool.inputs {
        let Some(value) = id_arg(args, input.arg) else {
            return ToolResult::error(format!("Missing required parameter: {}", input.arg));
        };
        ids.insert(input.arg.into(), json!(value));
        params.insert(input.param.into(), json!(value));
    }
    let timespan = tool
        .timespan
        .map(|default| args.get("timespan").and_then(Value::as_u64).unwrap_or(default));
    if let Some(timespan) = timespan {
        params.insert("timespan".into(), json!(timespan));
    }

    let organization_id = params.get("organizationId").and_then(Value::as_str);
    let client = match registry
        .resolve(str_arg(args, "key_id"), organization_id)
        .await
    {
        Ok((_, client)) => client,
        Err(e) => return key_failure(&e, registry),
    };

    match client.invoke(tool.section, tool.method, &params).await {
        Ok(payload) => {
            let mut result = ids;
            result.insert("method".into(), json!(tool.method));
            if let Some(timespan) = timespan {
                result.insert("timespan".into(), json!(timespan));
            }
            if tool.counted {
                let count = payload.as_array().map_or(0, Vec::len);
                result.insert("count".into(), json!(count));
            }
            result.insert(tool.payload.into(), payload);
            ToolResult::success(Value::Object(result))
        }
        Err(e) => {
            warn!("{} failed: {e}", tool.name);
            let mut body = ids;
            body.insert("error".into(), json!("API call failed"));
            body.insert("message".into(), json!(e.to_string()));
            ToolResult::failure(Value::Object(body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::handle_tool_call;
    use super::super::test_support::{body, context};
    use super::*;
    use crate::catalog;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn every_tool_maps_to_a_catalog_endpoint() {
        for tool in COMMON_TOOLS {
            let endpoint = catalog::find(tool.section, tool.method)
                .unwrap_or_else(|| panic!("{} has no endpoint", tool.name));
            let mut path_params = endpoint.path_params();
            path_params.sort_unstable();
            let mut inputs: Vec<&str> = tool.inputs.iter().map(|i| i.param).collect();
            inputs.sort_unstable();
            assert_eq!(path_params, inputs, "{}", tool.name);
        }
    }

    #[test]
    fn definitions_require_inputs() {
        let def = definition(find("get_switch_port_config").unwrap());
        assert_eq!(def["inputSchema"]["required"], json!(["serial", "port_id"]));
        assert!(def["inputSchema"]["properties"]["key_id"].is_object());

        let def = definition(find("get_network_clients").unwrap());
        assert!(def["inputSchema"]["properties"]["timespan"].is_object());
    }

    #[tokio::test]
    async fn network_clients_uses_default_timespan() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/networks/N_1/clients"))
            .and(query_param("timespan", "2592000"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"mac": "aa"}, {"mac": "bb"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let ctx = context(&server.uri(), Some("abc"), None);
        let result =
            handle_tool_call("get_network_clients", &json!({"network_id": "N_1"}), &ctx).await;
        assert!(!result.is_error, "{}", result.text_content());
        let parsed = body(&result);
        assert_eq!(parsed["method"], "getNetworkClients");
        assert_eq!(parsed["network_id"], "N_1");
        assert_eq!(parsed["timespan"], 2_592_000);
        assert_eq!(parsed["count"], 2);
        assert_eq!(parsed["clients"][1]["mac"], "bb");
    }

    #[tokio::test]
    async fn switch_port_failure_echoes_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devices/Q1/switch/ports/4"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"errors": ["Port not found"]})),
            )
            .mount(&server)
            .await;

        let ctx = context(&server.uri(), Some("abc"), None);
        let result = handle_tool_call(
            "get_switch_port_config",
            &json!({"serial": "Q1", "port_id": 4}),
            &ctx,
        )
        .await;
        assert!(result.is_error);
        let parsed = body(&result);
        assert_eq!(parsed["error"], "API call failed");
        assert_eq!(parsed["serial"], "Q1");
        assert_eq!(parsed["port_id"], "4");
        assert!(parsed["message"].as_str().unwrap().contains("Port not found"));
    }

    #[tokio::test]
    async fn missing_input_is_reported() {
        let ctx = context("http://127.0.0.1:9", Some("abc"), None);
        let result = handle_tool_call("get_device_status", &json!({}), &ctx).await;
        assert!(result.is_error);
        assert_eq!(result.text_content(), "Missing required parameter: serial");
    }

    #[tokio::test]
    async fn single_object_payload_has_no_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devices/Q1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"serial": "Q1", "model": "MS220-8P"})),
            )
            .mount(&server)
            .await;

        let ctx = context(&server.uri(), Some("abc"), None);
        let result = handle_tool_call("get_device_status", &json!({"serial": "Q1"}), &ctx).await;
        let parsed = body(&result);
        assert_eq!(parsed["device"]["model"], "MS220-8P");
        assert!(parsed.get("count").is_none());
    }
}
