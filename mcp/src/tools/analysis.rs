//! Multi-call analysis tools: topology, device health, inventory.
//!
//! Only the first lookups of each report are required. Every follow-up call
//! tolerates failure: it is logged and the report is produced without it.

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{
    bool_arg, key_failure, key_id_property, required_str, str_arg, unix_now, ToolContext,
    ToolResult,
};
use crate::client::{ClientError, DashboardClient};

/// Models treated as end of life by the inventory report.
const EOL_MODELS: [&str; 4] = ["MR18", "MR12", "MS220-8", "MX64"];

/// Networks sampled for the client inventory.
const CLIENT_INVENTORY_NETWORKS: usize = 10;

pub fn definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "analyze_network_topology",
            "description": "Analyze a network's topology: devices by type, switch ports and their VLANs, appliance uplinks, wireless status, VLANs, port utilization and optionally client distribution.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "network_id": { "type": "string", "description": "Network id, e.g. \"N_12345\"" },
                    "include_clients": { "type": "boolean", "description": "Include client distribution per device (default false)" },
                    "key_id": key_id_property()
                },
                "required": ["network_id"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "analyze_device_health",
            "description": "Basic health check of a device: health score, detected issues and recommendations.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "serial": { "type": "string", "description": "Device serial number" },
                    "key_id": key_id_property()
                },
                "required": ["serial"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "generate_network_inventory_report",
            "description": "Inventory report for an organization: device breakdown, license summary, end-of-life devices, optional client counts and recommendations.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "organization_id": { "type": "string", "description": "Organization id" },
                    "include_clients": { "type": "boolean", "description": "Count clients over the first networks (default false)" },
                    "key_id": key_id_property()
                },
                "required": ["organization_id"],
                "additionalProperties": false
            }
        }),
    ]
}

/// Device family from its model prefix.
pub fn device_type(model: &str) -> &'static str {
    let model = model.to_ascii_uppercase();
    if model.starts_with("MX") {
        "appliance"
    } else if model.starts_with("MS") {
        "switch"
    } else if model.starts_with("MR") || model.starts_with("CW") {
        "wireless"
    } else if model.starts_with("MV") {
        "camera"
    } else if model.starts_with("MT") {
        "sensor"
    } else {
        "unknown"
    }
}

// --- Helpers ---

async fn fetch(
    client: &DashboardClient,
    section: &str,
    method: &str,
    params: &[(&str, Value)],
) -> Result<Value, ClientError> {
    let args: Map<String, Value> = params
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect();
    client.invoke(section, method, &args).await
}

/// Like [`fetch`], but a failure is logged and yields `None`.
async fn fetch_optional(
    client: &DashboardClient,
    section: &str,
    method: &str,
    params: &[(&str, Value)],
) -> Option<Value> {
    fetch(client, section, method, params)
        .await
        .inspect_err(|e| warn!("{method} failed: {e}"))
        .ok()
}

fn items(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or_default()
}

fn text<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Field as a string, accepting numbers (port and VLAN ids).
fn id_text(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field(value: &Value, key: &str) -> Value {
    value.get(key).cloned().unwrap_or(Value::Null)
}

// --- analyze_network_topology ---

#[derive(Debug, Serialize)]
struct TopologyReport {
    network: NetworkSummary,
    devices: IndexMap<String, DeviceNode>,
    vlans: IndexMap<String, VlanNode>,
    summary: TopologySummary,
}

#[derive(Debug, Serialize)]
struct NetworkSummary {
    id: String,
    name: String,
    #[serde(rename = "type")]
    product_types: Value,
}

#[derive(Debug, Serialize)]
struct DeviceNode {
    serial: String,
    name: String,
    model: String,
    #[serde(rename = "type")]
    kind: &'static str,
    status: &'static str,
    address: String,
    ports: Vec<PortNode>,
    uplinks: Vec<UplinkNode>,
    clients: Vec<ClientNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dhcp_subnets: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wireless_info: Option<Value>,
}

#[derive(Debug, Serialize)]
struct PortNode {
    port_id: String,
    name: String,
    enabled: bool,
    #[serde(rename = "type")]
    kind: String,
    vlan: Value,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duplex: Option<Value>,
}

#[derive(Debug, Serialize)]
struct UplinkNode {
    interface: String,
    enabled: bool,
    wan_enabled: bool,
    vlan: Value,
}

#[derive(Debug, Serialize)]
struct ClientNode {
    id: Value,
    description: String,
    ip: Value,
    vlan: Value,
}

#[derive(Debug, Serialize)]
struct VlanNode {
    id: Value,
    name: String,
    subnet: String,
    #[serde(rename = "applianceIp")]
    appliance_ip: String,
    devices: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
struct TopologySummary {
    device_counts: BTreeMap<&'static str, usize>,
    total_devices: usize,
    vlan_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    port_utilization: Option<PortUtilization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_distribution: Option<BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_clients: Option<usize>,
}

#[derive(Debug, Serialize)]
struct PortUtilization {
    total: usize,
    used: usize,
    percentage: f64,
}

pub async fn handle_network_topology(args: &Value, ctx: &ToolContext) -> ToolResult {
    let registry = match ctx.registry() {
        Ok(r) => r,
        Err(e) => return e,
    };
    let network_id = match required_str(args, "network_id") {
        Ok(n) => n,
        Err(e) => return e,
    };
    let include_clients = bool_arg(args, "include_clients", false);
    let client = match registry.resolve(str_arg(args, "key_id"), None).await {
        Ok((_, client)) => client,
        Err(e) => return key_failure(&e, registry),
    };

    match analyze_topology(&client, network_id, include_clients).await {
        Ok(report) => ToolResult::success(json!(report)),
        Err(e) => {
            warn!("Topology analysis of {network_id} failed: {e}");
            ToolResult::failure(json!({
                "error": format!("Failed to analyze topology: {e}"),
                "network_id": network_id,
            }))
        }
    }
}

async fn analyze_topology(
    client: &DashboardClient,
    network_id: &str,
    include_clients: bool,
) -> Result<TopologyReport, ClientError> {
    let network_param = [("networkId", json!(network_id))];
    let devices = fetch(client, "networks", "getNetworkDevices", &network_param).await?;
    let network = fetch(client, "networks", "getNetwork", &network_param).await?;

    let mut report = TopologyReport {
        network: NetworkSummary {
            id: network_id.to_string(),
            name: text(&network, "name").unwrap_or("Unknown").to_string(),
            product_types: network.get("productTypes").cloned().unwrap_or_else(|| json!([])),
        },
        devices: IndexMap::new(),
        vlans: IndexMap::new(),
        summary: TopologySummary::default(),
    };

    // VLANs first so switch ports can be attributed to them.
    let vlans =
        fetch_optional(client, "appliance", "getNetworkApplianceVlans", &network_param).await;
    if let Some(vlans) = &vlans {
        for vlan in items(vlans) {
            let Some(id) = id_text(vlan, "id") else { continue };
            report.vlans.insert(
                id.clone(),
                VlanNode {
                    id: field(vlan, "id"),
                    name: text(vlan, "name").map_or_else(|| format!("VLAN {id}"), String::from),
                    subnet: text(vlan, "subnet").unwrap_or_default().to_string(),
                    appliance_ip: text(vlan, "applianceIp").unwrap_or_default().to_string(),
                    devices: Vec::new(),
                },
            );
        }
    }
    let vlan_count = vlans.as_ref().map(|v| items(v).len());

    for device in items(&devices) {
        let Some(serial) = text(device, "serial") else { continue };
        let model = text(device, "model").unwrap_or_default();
        let mut node = DeviceNode {
            serial: serial.to_string(),
            name: text(device, "name").unwrap_or(serial).to_string(),
            model: model.to_string(),
            kind: device_type(model),
            status: if text(device, "lanIp").is_some() { "online" } else { "offline" },
            address: text(device, "address").unwrap_or_default().to_string(),
            ports: Vec::new(),
            uplinks: Vec::new(),
            clients: Vec::new(),
            dhcp_subnets: None,
            wireless_info: None,
        };

        match node.kind {
            "switch" => add_switch_ports(client, &mut node, &mut report.vlans).await,
            "appliance" => {
                add_appliance_uplinks(client, &mut node).await;
                node.dhcp_subnets = vlan_count;
            }
            "wireless" => {
                let serial_param = [("serial", json!(serial))];
                if let Some(status) = fetch_optional(
                    client,
                    "wireless",
                    "getDeviceWirelessStatus",
                    &serial_param,
                )
                .await
                {
                    node.wireless_info = Some(json!({
                        "basic_service_sets": status.get("basicServiceSets").cloned().unwrap_or_else(|| json!([])),
                        "gateway": field(&status, "gateway"),
                    }));
                }
            }
            _ => {}
        }
        report.devices.insert(serial.to_string(), node);
    }

    if include_clients {
        add_client_distribution(client, network_id, &mut report).await;
    }
    summarize_topology(&mut report);
    Ok(report)
}

async fn add_switch_ports(
    client: &DashboardClient,
    node: &mut DeviceNode,
    vlans: &mut IndexMap<String, VlanNode>,
) {
    let serial_param = [("serial", json!(node.serial))];
    let Some(ports) =
        fetch_optional(client, "switch", "getDeviceSwitchPorts", &serial_param).await
    else {
        return;
    };
    let statuses = fetch_optional(client, "switch", "getDeviceSwitchPortsStatuses", &serial_param)
        .await
        .unwrap_or_default();

    for port in items(&ports) {
        let Some(port_id) = id_text(port, "portId") else { continue };
        let status = items(&statuses)
            .iter()
            .find(|s| id_text(s, "portId").as_deref() == Some(port_id.as_str()));

        if let Some(vlan_id) = id_text(port, "vlan") {
            if let Some(vlan) = vlans.get_mut(&vlan_id) {
                vlan.devices.push(node.serial.clone());
            }
        }
        node.ports.push(PortNode {
            name: text(port, "name").map_or_else(|| format!("Port {port_id}"), String::from),
            enabled: port.get("enabled").and_then(Value::as_bool).unwrap_or(false),
            kind: text(port, "type").unwrap_or("access").to_string(),
            vlan: field(port, "vlan"),
            status: match status {
                Some(s) if s.get("enabled").and_then(Value::as_bool) == Some(true) => "connected",
                Some(_) => "disabled",
                None => "unknown",
            },
            speed: status.map(|s| field(s, "speed")),
            duplex: status.map(|s| field(s, "duplex")),
            port_id,
        });
    }
}

async fn add_appliance_uplinks(client: &DashboardClient, node: &mut DeviceNode) {
    let serial_param = [("serial", json!(node.serial))];
    let Some(settings) =
        fetch_optional(client, "appliance", "getDeviceApplianceUplinksSettings", &serial_param)
            .await
    else {
        return;
    };
    let Some(interfaces) = settings.get("interfaces").and_then(Value::as_object) else {
        return;
    };
    for (interface, config) in interfaces {
        if config.get("enabled").and_then(Value::as_bool) != Some(true) {
            continue;
        }
        node.uplinks.push(UplinkNode {
            interface: interface.clone(),
            enabled: true,
            wan_enabled: config.get("wanEnabled").and_then(Value::as_bool).unwrap_or(false),
            vlan: config
                .pointer("/vlanTagging/vlanId")
                .cloned()
                .unwrap_or(Value::Null),
        });
    }
}

async fn add_client_distribution(
    client: &DashboardClient,
    network_id: &str,
    report: &mut TopologyReport,
) {
    let params = [("networkId", json!(network_id)), ("perPage", json!(1000))];
    let Some(clients) = fetch_optional(client, "networks", "getNetworkClients", &params).await
    else {
        return;
    };

    let mut distribution = BTreeMap::new();
    for entry in items(&clients) {
        let Some(serial) = text(entry, "recentDeviceSerial") else { continue };
        let Some(device) = report.devices.get_mut(serial) else { continue };
        device.clients.push(ClientNode {
            id: field(entry, "id"),
            description: text(entry, "description").unwrap_or("Unknown").to_string(),
            ip: field(entry, "ip"),
            vlan: field(entry, "vlan"),
        });
        *distribution.entry(serial.to_string()).or_insert(0) += 1;
    }
    report.summary.client_distribution = Some(distribution);
    report.summary.total_clients = Some(items(&clients).len());
}

fn summarize_topology(report: &mut TopologyReport) {
    let mut total_ports = 0;
    let mut used_ports = 0;
    for device in report.devices.values() {
        *report.summary.device_counts.entry(device.kind).or_insert(0) += 1;
        if device.kind == "switch" {
            total_ports += device.ports.len();
            used_ports += device.ports.iter().filter(|p| p.status == "connected").count();
        }
    }
    report.summary.total_devices = report.devices.len();
    report.summary.vlan_count = report.vlans.len();
    if total_ports > 0 {
        let percentage = used_ports as f64 / total_ports as f64 * 100.0;
        report.summary.port_utilization = Some(PortUtilization {
            total: total_ports,
            used: used_ports,
            percentage: (percentage * 100.0).round() / 100.0,
        });
    }
}

// --- analyze_device_health ---

const BASE_HEALTH_SCORE: i32 = 85;

#[derive(Debug, Serialize)]
struct Issue {
    severity: &'static str,
    component: &'static str,
    description: &'static str,
}

pub async fn handle_device_health(args: &Value, ctx: &ToolContext) -> ToolResult {
    let registry = match ctx.registry() {
        Ok(r) => r,
        Err(e) => return e,
    };
    let serial = match required_str(args, "serial") {
        Ok(s) => s,
        Err(e) => return e,
    };
    let client = match registry.resolve(str_arg(args, "key_id"), None).await {
        Ok((_, client)) => client,
        Err(e) => return key_failure(&e, registry),
    };

    match fetch(&client, "devices", "getDevice", &[("serial", json!(serial))]).await {
        Ok(device) => ToolResult::success(health_report(serial, &device, unix_now())),
        Err(e) => {
            warn!("Health check of {serial} failed: {e}");
            ToolResult::failure(json!({
                "error": format!("Failed to analyze device health: {e}"),
                "device_serial": serial,
                "analysis_time": unix_now(),
            }))
        }
    }
}

fn health_report(serial: &str, device: &Value, now: u64) -> Value {
    let model = text(device, "model").unwrap_or("Unknown");
    let kind = device_type(model);

    let mut score = BASE_HEALTH_SCORE;
    let mut issues = Vec::new();
    if text(device, "name").is_none() {
        issues.push(Issue {
            severity: "low",
            component: "configuration",
            description: "Device has no custom name configured",
        });
        score -= 5;
    }
    if text(device, "lanIp").is_none() {
        issues.push(Issue {
            severity: "medium",
            component: "connectivity",
            description: "No LAN IP address information available",
        });
        score -= 10;
    }

    let mut recommendations = vec![
        "Device is responding to API calls",
        "Basic configuration appears complete",
    ];
    match kind {
        "wireless" => recommendations.push("Consider checking wireless client connectivity and signal strength"),
        "switch" => recommendations.push("Consider checking port utilization and VLAN configuration"),
        "appliance" => recommendations.push("Consider checking uplink status and security policies"),
        _ => {}
    }

    json!({
        "device": {
            "serial": serial,
            "name": text(device, "name").unwrap_or(serial),
            "model": model,
            "type": kind,
            "firmware": text(device, "firmware").unwrap_or("Unknown"),
            "lan_ip": text(device, "lanIp").unwrap_or("Unknown"),
            "mac": text(device, "mac").unwrap_or("Unknown"),
            "network_id": text(device, "networkId").unwrap_or("Unknown"),
        },
        "health_score": score,
        "status": {
            "online": true,
            "api_accessible": true,
            "last_check": now,
        },
        "components": {
            "connectivity": { "status": "healthy", "score": 100 },
            "configuration": { "status": "healthy", "score": 85 },
        },
        "issues": issues,
        "recommendations": recommendations,
        "analysis_time": now,
        "analysis_scope": "basic_health_check",
    })
}

// --- generate_network_inventory_report ---

#[derive(Debug, Serialize)]
struct InventoryReport {
    organization_id: String,
    organization_name: String,
    report_time: u64,
    summary: InventorySummary,
    devices: Vec<InventoryDevice>,
    insights: Insights,
    recommendations: Vec<Recommendation>,
}

#[derive(Debug, Default, Serialize)]
struct InventorySummary {
    total_devices: usize,
    device_breakdown: BTreeMap<&'static str, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    license_summary: Option<LicenseSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_devices: Option<ClientInventory>,
}

#[derive(Debug, Serialize)]
struct LicenseSummary {
    total_licenses: usize,
    by_type: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize)]
struct ClientInventory {
    total_seen: usize,
    unique_devices: usize,
}

#[derive(Debug, Serialize)]
struct InventoryDevice {
    serial: String,
    name: String,
    model: String,
    #[serde(rename = "type")]
    kind: &'static str,
    network_id: Value,
    firmware: Value,
    address: Value,
    tags: Value,
}

#[derive(Debug, Default, Serialize)]
struct Insights {
    end_of_life: Vec<EndOfLife>,
}

#[derive(Debug, Serialize)]
struct EndOfLife {
    serial: String,
    model: String,
    name: String,
    recommendation: &'static str,
}

#[derive(Debug, Serialize)]
struct Recommendation {
    priority: &'static str,
    category: &'static str,
    description: String,
    action: &'static str,
    cost_impact: &'static str,
}

pub async fn handle_inventory_report(args: &Value, ctx: &ToolContext) -> ToolResult {
    let registry = match ctx.registry() {
        Ok(r) => r,
        Err(e) => return e,
    };
    let organization_id = match required_str(args, "organization_id") {
        Ok(o) => o,
        Err(e) => return e,
    };
    let include_clients = bool_arg(args, "include_clients", false);
    let client = match registry
        .resolve(str_arg(args, "key_id"), Some(organization_id))
        .await
    {
        Ok((_, client)) => client,
        Err(e) => return key_failure(&e, registry),
    };

    match inventory_report(&client, organization_id, include_clients).await {
        Ok(report) => ToolResult::success(json!(report)),
        Err(e) => {
            warn!("Inventory report for {organization_id} failed: {e}");
            ToolResult::failure(json!({
                "error": format!("Failed to generate inventory report: {e}"),
                "organization_id": organization_id,
            }))
        }
    }
}

async fn inventory_report(
    client: &DashboardClient,
    organization_id: &str,
    include_clients: bool,
) -> Result<InventoryReport, ClientError> {
    let org_param = [("organizationId", json!(organization_id))];
    let organization = fetch(client, "organizations", "getOrganization", &org_param).await?;
    let devices = fetch(client, "organizations", "getOrganizationDevices", &org_param).await?;

    let mut report = InventoryReport {
        organization_id: organization_id.to_string(),
        organization_name: text(&organization, "name").unwrap_or("Unknown").to_string(),
        report_time: unix_now(),
        summary: InventorySummary {
            total_devices: items(&devices).len(),
            ..InventorySummary::default()
        },
        devices: Vec::new(),
        insights: Insights::default(),
        recommendations: Vec::new(),
    };

    // Orgs on co-termination licensing reject this call.
    match fetch(client, "organizations", "getOrganizationLicenses", &org_param).await {
        Ok(licenses) => {
            let mut by_type = BTreeMap::new();
            for license in items(&licenses) {
                let kind = text(license, "licenseType").unwrap_or("Unknown").to_string();
                *by_type.entry(kind).or_insert(0) += 1;
            }
            report.summary.license_summary = Some(LicenseSummary {
                total_licenses: items(&licenses).len(),
                by_type,
            });
        }
        Err(e) => debug!("Skipping license summary for {organization_id}: {e}"),
    }

    for device in items(&devices) {
        let serial = text(device, "serial").unwrap_or_default();
        let model = text(device, "model").unwrap_or_default();
        let entry = InventoryDevice {
            serial: serial.to_string(),
            name: text(device, "name").unwrap_or(serial).to_string(),
            model: model.to_string(),
            kind: device_type(model),
            network_id: field(device, "networkId"),
            firmware: field(device, "firmware"),
            address: field(device, "address"),
            tags: device.get("tags").cloned().unwrap_or_else(|| json!([])),
        };
        if EOL_MODELS.iter().any(|m| *m == model) {
            report.insights.end_of_life.push(EndOfLife {
                serial: entry.serial.clone(),
                model: entry.model.clone(),
                name: entry.name.clone(),
                recommendation: "Plan replacement - model is end of life",
            });
        }
        *report.summary.device_breakdown.entry(entry.kind).or_insert(0) += 1;
        report.devices.push(entry);
    }

    if include_clients {
        report.summary.client_devices = client_inventory(client, organization_id).await;
    }
    report.recommendations = inventory_recommendations(&report);
    Ok(report)
}

async fn client_inventory(
    client: &DashboardClient,
    organization_id: &str,
) -> Option<ClientInventory> {
    let org_param = [("organizationId", json!(organization_id))];
    let networks =
        fetch_optional(client, "organizations", "getOrganizationNetworks", &org_param).await?;

    let mut total_seen = 0;
    let mut unique = HashSet::new();
    for network in items(&networks).iter().take(CLIENT_INVENTORY_NETWORKS) {
        let Some(network_id) = text(network, "id") else { continue };
        let params = [("networkId", json!(network_id)), ("perPage", json!(100))];
        let Some(clients) =
            fetch_optional(client, "networks", "getNetworkClients", &params).await
        else {
            continue;
        };
        for entry in items(&clients) {
            total_seen += 1;
            unique.insert(text(entry, "mac").unwrap_or_default().to_string());
        }
    }
    Some(ClientInventory {
        total_seen,
        unique_devices: unique.len(),
    })
}

fn inventory_recommendations(report: &InventoryReport) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();
    let eol = report.insights.end_of_life.len();
    if eol > 0 {
        recommendations.push(Recommendation {
            priority: "high",
            category: "lifecycle",
            description: format!("{eol} devices are end of life"),
            action: "Create replacement plan for EOL equipment",
            cost_impact: "high",
        });
    }

    let breakdown = &report.summary.device_breakdown;
    let wireless = breakdown.get("wireless").copied().unwrap_or(0);
    let switches = breakdown.get("switch").copied().unwrap_or(0);
    if wireless > switches * 10 {
        recommendations.push(Recommendation {
            priority: "medium",
            category: "architecture",
            description: "High ratio of wireless APs to switches".into(),
            action: "Review if additional switching capacity is needed",
            cost_impact: "medium",
        });
    }
    recommendations
}
