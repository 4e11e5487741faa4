//! Static catalog of Meraki Dashboard API (v1) endpoints.
//!
//! Each [`Endpoint`] maps a `section.method` pair (the operation ids used by
//! the Dashboard API docs) to an HTTP verb, a path template and the extra
//! query/body parameters it accepts. Path parameters come from the `{name}`
//! placeholders in the template and are always required.
//!
//! The tools layer uses this table to:
//! - list sections and methods (search fallback, error suggestions),
//! - describe parameters (`get_meraki_endpoint_parameters`),
//! - turn a flat argument map into a concrete request ([`Endpoint::prepare`]).

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::client::ClientError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
        }
    }

    /// Whether extra parameters travel in the query string (vs. a JSON body).
    fn uses_query(self) -> bool {
        matches!(self, HttpVerb::Get | HttpVerb::Delete)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Body,
}

impl ParamLocation {
    fn as_str(self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Body => "body",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    pub fn json_type(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        }
    }
}

/// A non-path parameter accepted by an endpoint.
#[derive(Debug)]
pub struct Param {
    pub name: &'static str,
    pub location: ParamLocation,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct Endpoint {
    pub section: &'static str,
    pub method: &'static str,
    pub verb: HttpVerb,
    pub path: &'static str,
    pub summary: &'static str,
    pub params: &'static [Param],
}

/// Reserved argument: how many pages to fetch (`"all"` or a positive integer).
pub const TOTAL_PAGES_PARAM: &str = "total_pages";

/// Page budget for list endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pages {
    Limit(u32),
    All,
}

/// A request ready to be sent by the dashboard client.
#[derive(Debug)]
pub struct PreparedRequest {
    pub verb: HttpVerb,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub pages: Pages,
}

impl Endpoint {
    /// Names of the `{placeholders}` in the path template, in order.
    pub fn path_params(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        let mut rest = self.path;
        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start + 1..].find('}') else {
                break;
            };
            out.push(&rest[start + 1..start + 1 + len]);
            rest = &rest[start + 2 + len..];
        }
        out
    }

    /// Path params followed by required query/body params.
    pub fn required_params(&self) -> Vec<&'static str> {
        let mut required = self.path_params();
        required.extend(self.params.iter().filter(|p| p.required).map(|p| p.name));
        required
    }

    /// `"section.method"`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.section, self.method)
    }

    /// JSON description of every parameter, path params first.
    pub fn parameter_schema(&self) -> Value {
        let mut params = Map::new();
        for name in self.path_params() {
            params.insert(
                name.to_string(),
                json!({
                    "required": true,
                    "type": "string",
                    "location": ParamLocation::Path.as_str(),
                }),
            );
        }
        for p in self.params {
            let mut entry = json!({
                "required": p.required,
                "type": p.kind.json_type(),
                "location": p.location.as_str(),
            });
            if !p.description.is_empty() {
                entry["description"] = json!(p.description);
            }
            params.insert(p.name.to_string(), entry);
        }
        Value::Object(params)
    }

    /// Build a concrete request from a flat argument map.
    ///
    /// Null and empty-string values count as absent. Path params are
    /// substituted (percent-encoded); every other argument goes to the query
    /// string for GET/DELETE or to the JSON body for POST/PUT. Arguments the
    /// catalog does not list are forwarded as-is.
    pub fn prepare(&self, args: &Map<String, Value>) -> Result<PreparedRequest, ClientError> {
        let present = |name: &str| args.get(name).filter(|v| is_present(v));

        let missing: Vec<String> = self
            .required_params()
            .into_iter()
            .filter(|name| present(*name).is_none())
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(ClientError::MissingParams(missing));
        }

        let path_params = self.path_params();
        let mut path = self.path.to_string();
        for name in &path_params {
            // Presence checked above.
            let value = present(*name).map(scalar_to_string).unwrap_or_default();
            path = path.replace(&format!("{{{name}}}"), &urlencoding::encode(&value));
        }

        let pages = match present(TOTAL_PAGES_PARAM) {
            None => Pages::Limit(1),
            Some(v) => parse_pages(v)?,
        };

        let mut query = Vec::new();
        let mut body = Map::new();
        for (name, value) in args {
            if !is_present(value)
                || name == TOTAL_PAGES_PARAM
                || path_params.iter().any(|p| *p == name.as_str())
            {
                continue;
            }
            if self.verb.uses_query() {
                match value {
                    Value::Array(items) => {
                        for item in items {
                            query.push((format!("{name}[]"), scalar_to_string(item)));
                        }
                    }
                    other => query.push((name.clone(), scalar_to_string(other))),
                }
            } else {
                body.insert(name.clone(), value.clone());
            }
        }

        let body = if self.verb.uses_query() {
            None
        } else {
            Some(Value::Object(body))
        };

        Ok(PreparedRequest {
            verb: self.verb,
            path,
            query,
            body,
            pages,
        })
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_pages(value: &Value) -> Result<Pages, ClientError> {
    match value {
        Value::String(s) if s.eq_ignore_ascii_case("all") => Ok(Pages::All),
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| ClientError::InvalidParam {
                name: TOTAL_PAGES_PARAM.into(),
                reason: format!("expected \"all\" or a positive integer, got '{s}'"),
            })
            .and_then(pages_from_int),
        Value::Number(n) => n.as_i64().map_or_else(
            || {
                Err(ClientError::InvalidParam {
                    name: TOTAL_PAGES_PARAM.into(),
                    reason: format!("expected an integer, got {n}"),
                })
            },
            pages_from_int,
        ),
        other => Err(ClientError::InvalidParam {
            name: TOTAL_PAGES_PARAM.into(),
            reason: format!("expected \"all\" or a positive integer, got {other}"),
        }),
    }
}

fn pages_from_int(n: i64) -> Result<Pages, ClientError> {
    match n {
        -1 => Ok(Pages::All),
        n if n >= 1 => Ok(Pages::Limit(u32::try_from(n).unwrap_or(u32::MAX))),
        n => Err(ClientError::InvalidParam {
            name: TOTAL_PAGES_PARAM.into(),
            reason: format!("must be -1, \"all\" or >= 1, got {n}"),
        }),
    }
}

// --- Lookup ---

pub fn find(section: &str, method: &str) -> Option<&'static Endpoint> {
    ENDPOINTS
        .iter()
        .find(|e| e.section == section && e.method == method)
}

pub fn all() -> &'static [Endpoint] {
    ENDPOINTS
}

/// Section names in catalog order.
pub fn sections() -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for e in ENDPOINTS {
        if !out.contains(&e.section) {
            out.push(e.section);
        }
    }
    out
}

pub fn methods_in(section: &str) -> Vec<&'static str> {
    ENDPOINTS
        .iter()
        .filter(|e| e.section == section)
        .map(|e| e.method)
        .collect()
}

pub fn list_sections_and_methods() -> IndexMap<&'static str, Vec<&'static str>> {
    let mut out: IndexMap<&'static str, Vec<&'static str>> = IndexMap::new();
    for e in ENDPOINTS {
        out.entry(e.section).or_default().push(e.method);
    }
    out
}

// --- Table ---

const fn query(name: &'static str, kind: ParamKind, description: &'static str) -> Param {
    Param {
        name,
        location: ParamLocation::Query,
        kind,
        required: false,
        description,
    }
}

const fn query_required(name: &'static str, kind: ParamKind, description: &'static str) -> Param {
    Param {
        name,
        location: ParamLocation::Query,
        kind,
        required: true,
        description,
    }
}

const fn body(name: &'static str, kind: ParamKind, description: &'static str) -> Param {
    Param {
        name,
        location: ParamLocation::Body,
        kind,
        required: false,
        description,
    }
}

const fn body_required(name: &'static str, kind: ParamKind, description: &'static str) -> Param {
    Param {
        name,
        location: ParamLocation::Body,
        kind,
        required: true,
        description,
    }
}

const fn ep(
    section: &'static str,
    method: &'static str,
    verb: HttpVerb,
    path: &'static str,
    summary: &'static str,
    params: &'static [Param],
) -> Endpoint {
    Endpoint {
        section,
        method,
        verb,
        path,
        summary,
        params,
    }
}

use HttpVerb::{Delete, Get, Post, Put};
use ParamKind::{Array, Boolean, Integer, Number, Object, String as Str};

const PER_PAGE: Param = query("perPage", Integer, "Entries per page");
const STARTING_AFTER: Param =
    query("startingAfter", Str, "Pagination token: start after this entry");
const ENDING_BEFORE: Param =
    query("endingBefore", Str, "Pagination token: end before this entry");
const T0: Param = query("t0", Str, "Beginning of the timespan (ISO 8601)");
const T1: Param = query("t1", Str, "End of the timespan (ISO 8601)");
const TIMESPAN: Param =
    query("timespan", Number, "Timespan in seconds (max 2592000 = 30 days)");

#[rustfmt::skip]
static ENDPOINTS: &[Endpoint] = &[
    // organizations
    ep("organizations", "getOrganizations", Get, "/organizations",
        "List the organizations that the user has privileges on",
        &[PER_PAGE, STARTING_AFTER, ENDING_BEFORE]),
    ep("organizations", "getOrganization", Get, "/organizations/{organizationId}",
        "Return an organization", &[]),
    ep("organizations", "updateOrganization", Put, "/organizations/{organizationId}",
        "Update an organization",
        &[body("name", Str, "Organization name"),
          body("management", Object, "Management settings"),
          body("api", Object, "API access settings")]),
    ep("organizations", "getOrganizationNetworks", Get, "/organizations/{organizationId}/networks",
        "List the networks in an organization",
        &[query("configTemplateId", Str, "Only networks bound to this template"),
          query("isBoundToConfigTemplate", Boolean, "Filter by template binding"),
          query("tags", Array, "Only networks with these tags"),
          query("tagsFilterType", Str, "withAnyTags or withAllTags"),
          PER_PAGE, STARTING_AFTER, ENDING_BEFORE]),
    ep("organizations", "createOrganizationNetwork", Post, "/organizations/{organizationId}/networks",
        "Create a network",
        &[body_required("name", Str, "Network name"),
          body_required("productTypes", Array, "Product types (appliance, switch, wireless, ...)"),
          body("tags", Array, "Network tags"),
          body("timeZone", Str, "Time zone (tz database name)"),
          body("notes", Str, "Free-form notes")]),
    ep("organizations", "getOrganizationDevices", Get, "/organizations/{organizationId}/devices",
        "List the devices in an organization",
        &[PER_PAGE, STARTING_AFTER, ENDING_BEFORE,
          query("networkIds", Array, "Filter by network ids"),
          query("productTypes", Array, "Filter by product types"),
          query("tags", Array, "Filter by tags"),
          query("model", Str, "Filter by model"),
          query("serial", Str, "Filter by serial")]),
    ep("organizations", "getOrganizationDevicesStatuses", Get, "/organizations/{organizationId}/devices/statuses",
        "List the status of every device in an organization",
        &[PER_PAGE, STARTING_AFTER, ENDING_BEFORE,
          query("networkIds", Array, "Filter by network ids"),
          query("serials", Array, "Filter by serials"),
          query("statuses", Array, "online, alerting, offline, dormant"),
          query("productTypes", Array, "Filter by product types")]),
    ep("organizations", "getOrganizationDevicesAvailabilities", Get, "/organizations/{organizationId}/devices/availabilities",
        "List the availability information for devices in an organization",
        &[PER_PAGE, STARTING_AFTER, ENDING_BEFORE,
          query("networkIds", Array, "Filter by network ids"),
          query("productTypes", Array, "Filter by product types")]),
    ep("organizations", "getOrganizationUplinksStatuses", Get, "/organizations/{organizationId}/uplinks/statuses",
        "List the uplink status of every Meraki MX, MG and Z series device",
        &[PER_PAGE, STARTING_AFTER, ENDING_BEFORE,
          query("networkIds", Array, "Filter by network ids"),
          query("serials", Array, "Filter by serials")]),
    ep("organizations", "getOrganizationInventoryDevices", Get, "/organizations/{organizationId}/inventory/devices",
        "Return the device inventory for an organization",
        &[PER_PAGE, STARTING_AFTER, ENDING_BEFORE,
          query("usedState", Str, "used or unused"),
          query("search", Str, "Search by serial, MAC or model")]),
    ep("organizations", "getOrganizationLicensesOverview", Get, "/organizations/{organizationId}/licenses/overview",
        "Return an overview of the license state for an organization", &[]),
    ep("organizations", "getOrganizationLicenses", Get, "/organizations/{organizationId}/licenses",
        "List the licenses for an organization",
        &[PER_PAGE, STARTING_AFTER, ENDING_BEFORE,
          query("deviceSerial", Str, "Filter by device serial"),
          query("state", Str, "active, expired, expiring, recentlyQueued, unused, unusedActive")]),
    ep("organizations", "getOrganizationAdmins", Get, "/organizations/{organizationId}/admins",
        "List the dashboard administrators in this organization", &[]),
    ep("organizations", "getOrganizationFirmwareUpgrades", Get, "/organizations/{organizationId}/firmware/upgrades",
        "Get firmware upgrade information for an organization",
        &[query("status", Array, "Filter by upgrade status"),
          query("productTypes", Array, "Filter by product types")]),
    ep("organizations", "getOrganizationConfigurationChanges", Get, "/organizations/{organizationId}/configurationChanges",
        "View the change log for your organization",
        &[T0, T1, TIMESPAN, PER_PAGE, STARTING_AFTER, ENDING_BEFORE,
          query("networkId", Str, "Filter by network"),
          query("adminId", Str, "Filter by admin")]),
    ep("organizations", "getOrganizationSensorReadingsLatest", Get, "/organizations/{organizationId}/sensor/readings/latest",
        "Return the latest available reading for each metric from each sensor",
        &[PER_PAGE, STARTING_AFTER, ENDING_BEFORE,
          query("networkIds", Array, "Filter by network ids"),
          query("serials", Array, "Filter by sensor serials"),
          query("metrics", Array, "Metrics to include")]),
    ep("organizations", "getOrganizationApplianceUplinkStatuses", Get, "/organizations/{organizationId}/appliance/uplink/statuses",
        "List the uplink status of every MX in the organization",
        &[PER_PAGE, STARTING_AFTER, ENDING_BEFORE,
          query("networkIds", Array, "Filter by network ids"),
          query("serials", Array, "Filter by serials")]),
    // networks
    ep("networks", "getNetwork", Get, "/networks/{networkId}", "Return a network", &[]),
    ep("networks", "updateNetwork", Put, "/networks/{networkId}", "Update a network",
        &[body("name", Str, "Network name"),
          body("timeZone", Str, "Time zone (tz database name)"),
          body("tags", Array, "Network tags"),
          body("notes", Str, "Free-form notes")]),
    ep("networks", "deleteNetwork", Delete, "/networks/{networkId}", "Delete a network", &[]),
    ep("networks", "getNetworkDevices", Get, "/networks/{networkId}/devices",
        "List the devices in a network", &[]),
    ep("networks", "getNetworkClients", Get, "/networks/{networkId}/clients",
        "List the clients that have used this network in the timespan",
        &[T0, TIMESPAN, PER_PAGE, STARTING_AFTER, ENDING_BEFORE,
          query("statuses", Array, "Online or Offline"),
          query("ip", Str, "Filter by IP"),
          query("mac", Str, "Filter by MAC"),
          query("vlan", Str, "Filter by VLAN"),
          query("recentDeviceConnections", Array, "Wired or Wireless")]),
    ep("networks", "getNetworkClient", Get, "/networks/{networkId}/clients/{clientId}",
        "Return the client associated with the given identifier", &[]),
    ep("networks", "getNetworkSettings", Get, "/networks/{networkId}/settings",
        "Return the settings for a network", &[]),
    ep("networks", "updateNetworkSettings", Put, "/networks/{networkId}/settings",
        "Update the settings for a network",
        &[body("localStatusPageEnabled", Boolean, "Enable the local device status pages"),
          body("remoteStatusPageEnabled", Boolean, "Enable access to the status page from the LAN"),
          body("securePort", Object, "SecureConnect settings")]),
    ep("networks", "getNetworkTopologyLinkLayer", Get, "/networks/{networkId}/topology/linkLayer",
        "List the LLDP and CDP information for all discovered devices and connections", &[]),
    ep("networks", "getNetworkEvents", Get, "/networks/{networkId}/events",
        "List the events for the network",
        &[query("productType", Str, "Required for multi-product networks"),
          query("includedEventTypes", Array, "Event types to include"),
          query("excludedEventTypes", Array, "Event types to exclude"),
          query("deviceSerial", Str, "Filter by device serial"),
          PER_PAGE, STARTING_AFTER, ENDING_BEFORE]),
    ep("networks", "getNetworkAlertsSettings", Get, "/networks/{networkId}/alerts/settings",
        "Return the alert configuration for this network", &[]),
    ep("networks", "getNetworkFirmwareUpgrades", Get, "/networks/{networkId}/firmwareUpgrades",
        "Get firmware upgrade information for a network", &[]),
    ep("networks", "getNetworkTraffic", Get, "/networks/{networkId}/traffic",
        "Return the traffic analysis data for this network",
        &[T0, TIMESPAN, query("deviceType", Str, "combined, wireless, switch or appliance")]),
    ep("networks", "getNetworkHealthAlerts", Get, "/networks/{networkId}/health/alerts",
        "Return all global alerts on this network", &[]),
    // devices
    ep("devices", "getDevice", Get, "/devices/{serial}", "Return a single device", &[]),
    ep("devices", "updateDevice", Put, "/devices/{serial}", "Update the attributes of a device",
        &[body("name", Str, "Device name"),
          body("tags", Array, "Device tags"),
          body("lat", Number, "Latitude"),
          body("lng", Number, "Longitude"),
          body("address", Str, "Physical address"),
          body("notes", Str, "Free-form notes")]),
    ep("devices", "getDeviceClients", Get, "/devices/{serial}/clients",
        "List the clients of a device, up to a maximum of a month ago", &[T0, TIMESPAN]),
    ep("devices", "getDeviceLldpCdp", Get, "/devices/{serial}/lldpCdp",
        "List LLDP and CDP information for a device", &[]),
    ep("devices", "getDeviceLossAndLatencyHistory", Get, "/devices/{serial}/lossAndLatencyHistory",
        "Get the uplink loss percentage and latency in milliseconds",
        &[query_required("ip", Str, "Destination IP used for the probes"),
          T0, T1, TIMESPAN,
          query("resolution", Integer, "Time resolution in seconds"),
          query("uplink", Str, "wan1, wan2, wan3, cellular")]),
    ep("devices", "getDeviceManagementInterface", Get, "/devices/{serial}/managementInterface",
        "Return the management interface settings for a device", &[]),
    ep("devices", "rebootDevice", Post, "/devices/{serial}/reboot", "Reboot a device", &[]),
    ep("devices", "blinkDeviceLeds", Post, "/devices/{serial}/blinkLeds",
        "Blink the LEDs on a device",
        &[body("duration", Integer, "Duration in seconds (5-120)"),
          body("period", Integer, "Period in milliseconds"),
          body("duty", Integer, "Duty cycle as a percent")]),
    // switch
    ep("switch", "getDeviceSwitchPorts", Get, "/devices/{serial}/switch/ports",
        "List the switch ports for a switch", &[]),
    ep("switch", "getDeviceSwitchPort", Get, "/devices/{serial}/switch/ports/{portId}",
        "Return a switch port", &[]),
    ep("switch", "updateDeviceSwitchPort", Put, "/devices/{serial}/switch/ports/{portId}",
        "Update a switch port",
        &[body("name", Str, "Port name"),
          body("tags", Array, "Port tags"),
          body("enabled", Boolean, "Port enabled"),
          body("type", Str, "access, trunk or stack"),
          body("vlan", Integer, "Native VLAN (trunk) or access VLAN"),
          body("voiceVlan", Integer, "Voice VLAN"),
          body("allowedVlans", Str, "Allowed VLANs on a trunk port"),
          body("poeEnabled", Boolean, "PoE enabled")]),
    ep("switch", "getDeviceSwitchPortsStatuses", Get, "/devices/{serial}/switch/ports/statuses",
        "Return the status for all the ports of a switch", &[T0, TIMESPAN]),
    ep("switch", "cycleDeviceSwitchPorts", Post, "/devices/{serial}/switch/ports/cycle",
        "Cycle a set of switch ports",
        &[body_required("ports", Array, "Ports to cycle, e.g. [\"1\", \"2-5\"]")]),
    ep("switch", "getDeviceSwitchRoutingInterfaces", Get, "/devices/{serial}/switch/routing/interfaces",
        "List layer 3 interfaces for a switch", &[]),
    ep("switch", "getNetworkSwitchStp", Get, "/networks/{networkId}/switch/stp",
        "Return the STP settings of a network", &[]),
    ep("switch", "getNetworkSwitchAccessPolicies", Get, "/networks/{networkId}/switch/accessPolicies",
        "List the access policies for a switch network", &[]),
    ep("switch", "getNetworkSwitchSettings", Get, "/networks/{networkId}/switch/settings",
        "Return switch network settings", &[]),
    // appliance
    ep("appliance", "getNetworkApplianceFirewallL3FirewallRules", Get, "/networks/{networkId}/appliance/firewall/l3FirewallRules",
        "Return the L3 firewall rules for an MX network", &[]),
    ep("appliance", "updateNetworkApplianceFirewallL3FirewallRules", Put, "/networks/{networkId}/appliance/firewall/l3FirewallRules",
        "Update the L3 firewall rules of an MX network",
        &[body("rules", Array, "Ordered list of firewall rules"),
          body("syslogDefaultRule", Boolean, "Log the special default rule")]),
    ep("appliance", "getNetworkApplianceFirewallL7FirewallRules", Get, "/networks/{networkId}/appliance/firewall/l7FirewallRules",
        "List the MX L7 firewall rules for an MX network", &[]),
    ep("appliance", "getNetworkApplianceVlans", Get, "/networks/{networkId}/appliance/vlans",
        "List the VLANs for an MX network", &[]),
    ep("appliance", "getNetworkApplianceVlan", Get, "/networks/{networkId}/appliance/vlans/{vlanId}",
        "Return a VLAN", &[]),
    ep("appliance", "getNetworkApplianceSettings", Get, "/networks/{networkId}/appliance/settings",
        "Return the appliance settings for a network", &[]),
    ep("appliance", "getNetworkApplianceSecurityIntrusion", Get, "/networks/{networkId}/appliance/security/intrusion",
        "Returns all supported intrusion settings for an MX network", &[]),
    ep("appliance", "getNetworkApplianceSecurityMalware", Get, "/networks/{networkId}/appliance/security/malware",
        "Returns all supported malware settings for an MX network", &[]),
    ep("appliance", "getNetworkApplianceContentFiltering", Get, "/networks/{networkId}/appliance/contentFiltering",
        "Return the content filtering settings for an MX network", &[]),
    ep("appliance", "getNetworkApplianceVpnSiteToSiteVpn", Get, "/networks/{networkId}/appliance/vpn/siteToSiteVpn",
        "Return the site-to-site VPN settings of a network", &[]),
    ep("appliance", "getDeviceApplianceUplinksSettings", Get, "/devices/{serial}/appliance/uplinks/settings",
        "Return the uplink settings for an MX appliance", &[]),
    ep("appliance", "getDeviceAppliancePerformance", Get, "/devices/{serial}/appliance/performance",
        "Return the performance score for a single MX", &[T0, T1, TIMESPAN]),
    // wireless
    ep("wireless", "getNetworkWirelessSsids", Get, "/networks/{networkId}/wireless/ssids",
        "List the MR SSIDs in a network", &[]),
    ep("wireless", "getNetworkWirelessSsid", Get, "/networks/{networkId}/wireless/ssids/{number}",
        "Return a single MR SSID", &[]),
    ep("wireless", "updateNetworkWirelessSsid", Put, "/networks/{networkId}/wireless/ssids/{number}",
        "Update the attributes of an MR SSID",
        &[body("name", Str, "SSID name"),
          body("enabled", Boolean, "SSID enabled"),
          body("authMode", Str, "Association control method"),
          body("encryptionMode", Str, "psk or wep"),
          body("psk", Str, "Passkey"),
          body("wpaEncryptionMode", Str, "WPA encryption mode")]),
    ep("wireless", "getNetworkWirelessSettings", Get, "/networks/{networkId}/wireless/settings",
        "Return the wireless settings for a network", &[]),
    ep("wireless", "getNetworkWirelessRfProfiles", Get, "/networks/{networkId}/wireless/rfProfiles",
        "List RF profiles for this network", &[]),
    ep("wireless", "getNetworkWirelessConnectionStats", Get, "/networks/{networkId}/wireless/connectionStats",
        "Aggregated connectivity info for this network",
        &[T0, T1, TIMESPAN,
          query("band", Str, "2.4, 5 or 6"),
          query("ssid", Integer, "SSID number"),
          query("vlan", Integer, "VLAN"),
          query("apTag", Str, "AP tag")]),
    ep("wireless", "getNetworkWirelessClientsConnectionStats", Get, "/networks/{networkId}/wireless/clients/connectionStats",
        "Aggregated connectivity info for this network, grouped by clients",
        &[T0, T1, TIMESPAN,
          query("band", Str, "2.4, 5 or 6"),
          query("ssid", Integer, "SSID number")]),
    ep("wireless", "getNetworkWirelessChannelUtilizationHistory", Get, "/networks/{networkId}/wireless/channelUtilizationHistory",
        "Return AP channel utilization over time",
        &[T0, T1, TIMESPAN,
          query("resolution", Integer, "Sample resolution in seconds"),
          query("deviceSerial", Str, "Filter by AP serial"),
          query("band", Str, "2.4, 5 or 6")]),
    ep("wireless", "getDeviceWirelessStatus", Get, "/devices/{serial}/wireless/status",
        "Return the SSID statuses of an access point", &[]),
    // camera
    ep("camera", "getDeviceCameraVideoLink", Get, "/devices/{serial}/camera/videoLink",
        "Returns video link to the specified camera",
        &[query("timestamp", Str, "Point in time for the link (ISO 8601)")]),
    ep("camera", "getDeviceCameraSense", Get, "/devices/{serial}/camera/sense",
        "Returns sense settings for a given camera", &[]),
    ep("camera", "getNetworkCameraQualityRetentionProfiles", Get, "/networks/{networkId}/camera/qualityRetentionProfiles",
        "List the quality retention profiles for this network", &[]),
    // sensor
    ep("sensor", "getDeviceSensorRelationships", Get, "/devices/{serial}/sensor/relationships",
        "List the sensor roles for a given sensor or camera device", &[]),
    ep("sensor", "getNetworkSensorAlertsProfiles", Get, "/networks/{networkId}/sensor/alerts/profiles",
        "Lists all sensor alert profiles for a network", &[]),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn operation_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for e in all() {
            assert!(seen.insert(e.qualified_name()), "duplicate {}", e.qualified_name());
        }
    }

    #[test]
    fn path_params_follow_template_order() {
        let e = find("switch", "getDeviceSwitchPort").unwrap();
        assert_eq!(e.path_params(), vec!["serial", "portId"]);
        assert!(find("organizations", "getOrganizations")
            .unwrap()
            .path_params()
            .is_empty());
    }

    #[test]
    fn required_params_include_path_and_required_extras() {
        let e = find("devices", "getDeviceLossAndLatencyHistory").unwrap();
        assert_eq!(e.required_params(), vec!["serial", "ip"]);
    }

    #[test]
    fn prepare_substitutes_and_encodes_path() {
        let e = find("switch", "getDeviceSwitchPort").unwrap();
        let req = e
            .prepare(&args(json!({ "serial": "Q2XX/1", "portId": 4 })))
            .unwrap();
        assert_eq!(req.path, "/devices/Q2XX%2F1/switch/ports/4");
        assert!(req.query.is_empty());
        assert!(req.body.is_none());
        assert_eq!(req.pages, Pages::Limit(1));
    }

    #[test]
    fn prepare_reports_every_missing_param() {
        let e = find("switch", "getDeviceSwitchPort").unwrap();
        let err = e.prepare(&args(json!({ "serial": "" }))).unwrap_err();
        match err {
            ClientError::MissingParams(names) => assert_eq!(names, vec!["serial", "portId"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn get_params_go_to_query_with_array_brackets() {
        let e = find("organizations", "getOrganizationDevices").unwrap();
        let req = e
            .prepare(&args(json!({
                "organizationId": "123",
                "perPage": 50,
                "productTypes": ["switch", "wireless"],
                "model": null,
            })))
            .unwrap();
        assert_eq!(req.path, "/organizations/123/devices");
        assert!(req.query.contains(&("perPage".into(), "50".into())));
        assert!(req.query.contains(&("productTypes[]".into(), "switch".into())));
        assert!(req.query.contains(&("productTypes[]".into(), "wireless".into())));
        assert!(!req.query.iter().any(|(k, _)| k == "model"));
    }

    #[test]
    fn put_params_go_to_body() {
        let e = find("devices", "updateDevice").unwrap();
        let req = e
            .prepare(&args(json!({ "serial": "Q1", "name": "core", "tags": ["a"] })))
            .unwrap();
        assert!(req.query.is_empty());
        assert_eq!(req.body.unwrap(), json!({ "name": "core", "tags": ["a"] }));
    }

    #[test]
    fn total_pages_is_parsed_and_not_forwarded() {
        let e = find("organizations", "getOrganizations").unwrap();
        let req = e.prepare(&args(json!({ "total_pages": "all" }))).unwrap();
        assert_eq!(req.pages, Pages::All);
        assert!(req.query.is_empty());

        let req = e.prepare(&args(json!({ "total_pages": 3 }))).unwrap();
        assert_eq!(req.pages, Pages::Limit(3));

        assert!(e.prepare(&args(json!({ "total_pages": 0 }))).is_err());
    }

    #[test]
    fn sections_are_listed_once_in_order() {
        let sections = sections();
        assert_eq!(sections[0], "organizations");
        assert!(sections.contains(&"wireless"));
        let listing = list_sections_and_methods();
        assert_eq!(listing.len(), sections.len());
        assert!(listing["devices"].contains(&"getDevice"));
        assert_eq!(methods_in("camera").len(), 3);
    }

    #[test]
    fn parameter_schema_marks_path_params_required() {
        let schema = find("networks", "getNetworkClients").unwrap().parameter_schema();
        assert_eq!(schema["networkId"]["required"], json!(true));
        assert_eq!(schema["networkId"]["location"], json!("path"));
        assert_eq!(schema["timespan"]["required"], json!(false));
        assert_eq!(schema["timespan"]["type"], json!("number"));
    }
}
