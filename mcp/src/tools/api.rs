//! Dynamic API tools: search the catalog, describe an endpoint, execute it.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::{
    id_arg, key_error_body, key_id_property, required_str, str_arg, ToolContext, ToolResult,
};
use crate::cache::ResponseCache;
use crate::catalog;
use crate::client::ClientError;
use crate::search::{EndpointSearch, SearchHit, DEFAULT_LIMIT, DEFAULT_MIN_SCORE};

const USAGE: &str =
    "Use execute_meraki_api_endpoint with section='<section>' and method='<method>' to call an endpoint";

/// Convenience arguments that map straight onto Dashboard path parameters.
const ROUTING_ARGS: [&str; 4] = ["serial", "portId", "networkId", "organizationId"];

pub fn definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "search_meraki_api_endpoints",
            "description": "Find Meraki Dashboard API endpoints from a natural-language query, e.g. \"get my organizations\", \"switch port config\", \"firewall rules\", \"network clients\". Returns the best match with its required parameters, plus other candidates.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What you want to do, in plain words"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of matches (default 5)"
                    },
                    "min_score": {
                        "type": "number",
                        "description": "Minimum relevance score between 0 and 1 (default 0.3)"
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "get_meraki_endpoint_parameters",
            "description": "Describe the required and optional parameters of a Meraki API endpoint. Use after search_meraki_api_endpoints and before execute_meraki_api_endpoint.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "section": {
                        "type": "string",
                        "description": "API section, e.g. \"organizations\", \"devices\", \"networks\", \"switch\", \"appliance\", \"wireless\""
                    },
                    "method": {
                        "type": "string",
                        "description": "Method name, e.g. \"getOrganizations\", \"getDevice\", \"getNetworkClients\""
                    }
                },
                "required": ["section", "method"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "execute_meraki_api_endpoint",
            "description": "Call any Meraki Dashboard API endpoint. Common ids have their own arguments; anything else goes in kwargs. The API key is chosen from key_id, then organizationId, then the default key. Results of get* methods are cached for 5 minutes.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "section": { "type": "string", "description": "API section, e.g. \"switch\"" },
                    "method": { "type": "string", "description": "Method name, e.g. \"getDeviceSwitchPort\"" },
                    "serial": { "type": "string", "description": "Device serial number" },
                    "portId": { "type": "string", "description": "Switch port id, e.g. \"4\"" },
                    "networkId": { "type": "string", "description": "Network id" },
                    "organizationId": { "type": "string", "description": "Organization id (also selects the API key)" },
                    "key_id": key_id_property(),
                    "kwargs": {
                        "type": ["object", "string"],
                        "description": "Additional parameters as an object or a JSON string, e.g. {\"timespan\": 3600, \"perPage\": 50}. Use \"total_pages\": \"all\" to fetch every page."
                    }
                },
                "required": ["section", "method"],
                "additionalProperties": false
            }
        }),
    ]
}

// --- search_meraki_api_endpoints ---

pub async fn handle_search(args: &Value, ctx: &ToolContext) -> ToolResult {
    let query = match required_str(args, "query") {
        Ok(q) => q,
        Err(e) => return e,
    };
    let limit = args
        .get("limit")
        .and_then(Value::as_u64)
        .map_or(DEFAULT_LIMIT, |l| l.clamp(1, 50) as usize);
    let min_score = args
        .get("min_score")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_MIN_SCORE);

    let (strategy, hits) = match ctx.search.search(query, limit, min_score).await {
        Ok(hits) => (ctx.search.name(), hits),
        Err(e) => {
            warn!("{} search failed, falling back to keyword search: {e}", ctx.search.name());
            let hits = ctx
                .fallback_search
                .search(query, limit, min_score)
                .await
                .unwrap_or_default();
            (ctx.fallback_search.name(), hits)
        }
    };

    let direct_match = hits.first().map(|hit| {
        json!({
            "section": hit.endpoint.section,
            "method": hit.endpoint.method,
            "description": hit.endpoint.summary,
            "required_params": hit.endpoint.required_params(),
            "confidence": round3(hit.score),
        })
    });
    let matches = if hits.is_empty() {
        fallback_matches(query)
    } else {
        group_hits(&hits)
    };

    ToolResult::success(json!({
        "query": query,
        "strategy": strategy,
        "direct_match": direct_match,
        "matches": matches,
        "usage": USAGE,
    }))
}

fn round3(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

fn group_hits(hits: &[SearchHit]) -> IndexMap<&'static str, Vec<&'static str>> {
    let mut grouped: IndexMap<&'static str, Vec<&'static str>> = IndexMap::new();
    for hit in hits {
        grouped
            .entry(hit.endpoint.section)
            .or_default()
            .push(hit.endpoint.method);
    }
    grouped
}

/// Substring match over section and method names, at most 8 per section.
fn fallback_matches(query: &str) -> IndexMap<&'static str, Vec<&'static str>> {
    let lowered = query.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    let mut matches = IndexMap::new();
    if words.is_empty() {
        return matches;
    }

    for (section, methods) in catalog::list_sections_and_methods() {
        let mut found: Vec<&'static str> = Vec::new();
        if words.iter().any(|w| section.contains(w)) {
            found.extend(methods.iter().take(8));
        }
        for method in &methods {
            let lower = method.to_lowercase();
            if words.iter().any(|w| lower.contains(w)) && !found.contains(method) {
                found.push(*method);
            }
        }
        if !found.is_empty() {
            found.truncate(8);
            matches.insert(section, found);
        }
    }
    matches
}

// --- get_meraki_endpoint_parameters ---

pub fn handle_parameters(args: &Value) -> ToolResult {
    let section = match required_str(args, "section") {
        Ok(s) => s,
        Err(e) => return e,
    };
    let method = match required_str(args, "method") {
        Ok(m) => m,
        Err(e) => return e,
    };
    let Some(endpoint) = catalog::find(section, method) else {
        return ToolResult::failure(json!({
            "error": format!("Endpoint not found: {section}.{method}"),
            "suggestion": "Use search_meraki_api_endpoints to find available endpoints",
        }));
    };

    let required = endpoint.required_params();
    let example_args: Vec<String> = required
        .iter()
        .map(|p| format!("{p}='<{p}>'"))
        .collect();
    let mut example = format!("execute_meraki_api_endpoint(section='{section}', method='{method}'");
    for arg in &example_args {
        example.push_str(", ");
        example.push_str(arg);
    }
    example.push(')');

    ToolResult::success(json!({
        "section": section,
        "method": method,
        "http_method": endpoint.verb.as_str(),
        "path": endpoint.path,
        "description": endpoint.summary,
        "required": required,
        "parameters": endpoint.parameter_schema(),
        "usage_example": example,
    }))
}

// --- execute_meraki_api_endpoint ---

/// Extra parameters from `kwargs`: a JSON object, or a string holding one.
/// Anything else is logged and ignored.
fn parse_kwargs(raw: Option<&Value>) -> Map<String, Value> {
    match raw {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) if !s.trim().is_empty() => {
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    warn!("Ignoring kwargs: expected a JSON object, got {other}");
                    Map::new()
                }
                Err(e) => {
                    warn!("Ignoring invalid kwargs JSON: {e}");
                    Map::new()
                }
            }
        }
        _ => Map::new(),
    }
}

fn not_found(section: &str, method: &str) -> ToolResult {
    let sections = catalog::sections();
    if !sections.iter().any(|s| *s == section) {
        return ToolResult::failure(json!({
            "error": format!("Section '{section}' not found"),
            "available_sections": sections.iter().take(10).collect::<Vec<_>>(),
            "suggestion": "Use search_meraki_api_endpoints to find the correct section",
        }));
    }
    ToolResult::failure(json!({
        "error": format!("Method '{method}' not found in section '{section}'"),
        "available_methods": catalog::methods_in(section).into_iter().take(20).collect::<Vec<_>>(),
        "suggestion": "Use search_meraki_api_endpoints to find the correct method",
    }))
}

pub async fn handle_execute(args: &Value, ctx: &ToolContext) -> ToolResult {
    let registry = match ctx.registry() {
        Ok(r) => r,
        Err(e) => return e,
    };
    let section = match required_str(args, "section") {
        Ok(s) => s,
        Err(e) => return e,
    };
    let method = match required_str(args, "method") {
        Ok(m) => m,
        Err(e) => return e,
    };
    let Some(endpoint) = catalog::find(section, method) else {
        return not_found(section, method);
    };

    let mut params = Map::new();
    for name in ROUTING_ARGS {
        if let Some(value) = id_arg(args, name) {
            params.insert(name.to_string(), json!(value));
        }
    }
    let extra = parse_kwargs(args.get("kwargs"));
    params.extend(extra.clone());
    params.retain(|_, v| !matches!(v, Value::Null) && v.as_str() != Some(""));

    // kwargs may carry a numeric organization id; routing needs it as a string.
    let organization_id = match params.get("organizationId") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    if let Some(org) = &organization_id {
        params.insert("organizationId".to_string(), json!(org));
    }

    let provided: Vec<&str> = ROUTING_ARGS
        .into_iter()
        .filter(|name| params.contains_key(*name))
        .collect();

    let request = match endpoint.prepare(&params) {
        Ok(r) => r,
        Err(e @ ClientError::MissingParams(_)) | Err(e @ ClientError::InvalidParam { .. }) => {
            return ToolResult::failure(json!({
                "error": e.to_string(),
                "section": section,
                "method": method,
                "provided_params": provided,
                "additional_params_provided": extra,
                "suggestion": "Use get_meraki_endpoint_parameters to see all required parameters",
            }));
        }
        Err(e) => return ToolResult::error(e.to_string()),
    };

    let (key_id, client) = match registry
        .resolve(str_arg(args, "key_id"), organization_id.as_deref())
        .await
    {
        Ok(resolved) => resolved,
        Err(e) => {
            let mut body = key_error_body(&e, registry);
            body["section"] = json!(section);
            body["method"] = json!(method);
            body["provided_params"] = json!(provided);
            return ToolResult::failure(body);
        }
    };

    let cache_key = ResponseCache::is_cacheable(method)
        .then(|| ResponseCache::key(&key_id, section, method, &Value::Object(params.clone())));
    if let Some(key) = &cache_key {
        if let Some(cached) = ctx.cache.get(key).await {
            info!("Cache hit for {section}.{method}");
            return ToolResult::text(cached);
        }
    }

    match client.execute(request).await {
        Ok(value) => {
            let rendered = serde_json::to_string_pretty(&value).unwrap_or_default();
            if let Some(key) = cache_key {
                ctx.cache.insert(key, rendered.clone()).await;
            }
            ToolResult::text(rendered)
        }
        Err(e) => {
            warn!("API call {section}.{method} via {key_id} failed: {e}");
            let mut body = json!({
                "error": format!("API call failed: {e}"),
                "section": section,
                "method": method,
                "key_id": key_id,
                "provided_params": provided,
            });
            if !extra.is_empty() {
                body["additional_params"] = json!(extra);
            }
            if let Some(status) = e.status() {
                body["status"] = json!(status);
            }
            ToolResult::failure(body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::handle_tool_call;
    use super::super::test_support::{body, context};
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn kwargs_accepts_object_or_json_string() {
        let obj = parse_kwargs(Some(&json!({"timespan": 3600})));
        assert_eq!(obj["timespan"], 3600);
        let text = parse_kwargs(Some(&json!("{\"perPage\": 50}")));
        assert_eq!(text["perPage"], 50);
        assert!(parse_kwargs(Some(&json!("{not json"))).is_empty());
        assert!(parse_kwargs(Some(&json!("[1,2]"))).is_empty());
        assert!(parse_kwargs(None).is_empty());
    }

    #[test]
    fn fallback_matches_caps_methods_per_section() {
        let matches = fallback_matches("organization");
        let orgs = &matches["organizations"];
        assert!(orgs.len() <= 8);
        assert!(!orgs.is_empty());
        assert!(fallback_matches("   ").is_empty());
    }

    #[tokio::test]
    async fn search_returns_direct_match() {
        let ctx = context("http://127.0.0.1:9", Some("abc"), None);
        let result = handle_tool_call(
            "search_meraki_api_endpoints",
            &json!({"query": "get organizations"}),
            &ctx,
        )
        .await;
        let parsed = body(&result);
        assert_eq!(parsed["direct_match"]["method"], "getOrganizations");
        assert_eq!(parsed["strategy"], "keyword");
        assert!(parsed["usage"].is_string());
    }

    #[tokio::test]
    async fn search_without_hits_uses_substring_fallback() {
        let ctx = context("http://127.0.0.1:9", Some("abc"), None);
        let result = handle_tool_call(
            "search_meraki_api_endpoints",
            &json!({"query": "lldp", "min_score": 0.99}),
            &ctx,
        )
        .await;
        let parsed = body(&result);
        assert!(parsed["direct_match"].is_null());
        assert_eq!(parsed["matches"]["devices"], json!(["getDeviceLldpCdp"]));
    }

    #[test]
    fn parameters_describe_endpoint() {
        let result =
            handle_parameters(&json!({"section": "switch", "method": "getDeviceSwitchPort"}));
        let parsed = body(&result);
        assert_eq!(parsed["required"], json!(["serial", "portId"]));
        assert_eq!(parsed["http_method"], "GET");
        assert!(parsed["usage_example"].as_str().unwrap().contains("portId='<portId>'"));

        let missing = handle_parameters(&json!({"section": "switch", "method": "nope"}));
        assert!(missing.is_error);
        assert_eq!(body(&missing)["error"], "Endpoint not found: switch.nope");
    }

    #[tokio::test]
    async fn execute_unknown_section_lists_sections() {
        let ctx = context("http://127.0.0.1:9", Some("abc"), None);
        let result = handle_tool_call(
            "execute_meraki_api_endpoint",
            &json!({"section": "bogus", "method": "getThing"}),
            &ctx,
        )
        .await;
        assert!(result.is_error);
        let parsed = body(&result);
        assert_eq!(parsed["error"], "Section 'bogus' not found");
        assert!(parsed["available_sections"].as_array().unwrap().len() <= 10);

        let result = handle_tool_call(
            "execute_meraki_api_endpoint",
            &json!({"section": "camera", "method": "getThing"}),
            &ctx,
        )
        .await;
        assert_eq!(body(&result)["available_methods"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn execute_reports_missing_params() {
        let ctx = context("http://127.0.0.1:9", Some("abc"), None);
        let result = handle_tool_call(
            "execute_meraki_api_endpoint",
            &json!({"section": "switch", "method": "getDeviceSwitchPort", "serial": "Q1"}),
            &ctx,
        )
        .await;
        assert!(result.is_error);
        let parsed = body(&result);
        assert_eq!(parsed["error"], "Missing required parameters: portId");
        assert_eq!(parsed["provided_params"], json!(["serial"]));
    }

    #[tokio::test]
    async fn execute_with_unknown_organization_fails_after_discovery() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/organizations"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "1", "name": "A"}])),
            )
            .expect(2)
            .mount(&server)
            .await;

        let ctx = context(&server.uri(), Some("acme:secret1,secret2"), None);
        let result = handle_tool_call(
            "execute_meraki_api_endpoint",
            &json!({
                "section": "organizations",
                "method": "getOrganizationDevices",
                "organizationId": "999"
            }),
            &ctx,
        )
        .await;
        assert!(result.is_error);
        let parsed = body(&result);
        assert!(parsed["error"].as_str().unwrap().contains("No API key found"));
        assert_eq!(parsed["provided_params"], json!(["organizationId"]));
    }

    #[tokio::test]
    async fn execute_routes_by_organization_and_caches_reads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/organizations"))
            .and(header("Authorization", "Bearer secret1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "1", "name": "A"}])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/organizations"))
            .and(header("Authorization", "Bearer secret2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "2", "name": "B"}])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/organizations/2/devices"))
            .and(header("Authorization", "Bearer secret2"))
            .and(query_param("perPage", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"serial": "Q1"}])))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = context(&server.uri(), Some("acme:secret1,secret2"), None);
        let args = json!({
            "section": "organizations",
            "method": "getOrganizationDevices",
            "organizationId": "2",
            "kwargs": "{\"perPage\": 50}"
        });
        let first = handle_tool_call("execute_meraki_api_endpoint", &args, &ctx).await;
        assert!(!first.is_error, "{}", first.text_content());
        assert_eq!(body(&first), json!([{"serial": "Q1"}]));

        let second = handle_tool_call("execute_meraki_api_endpoint", &args, &ctx).await;
        assert_eq!(second.text_content(), first.text_content());
        assert_eq!(ctx.cache.len().await, 1);
    }

    #[tokio::test]
    async fn execute_routes_numeric_organization_from_kwargs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/organizations"))
            .and(header("Authorization", "Bearer secret1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "1", "name": "A"}])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/organizations"))
            .and(header("Authorization", "Bearer secret2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "2", "name": "B"}])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/organizations/2/devices"))
            .and(header("Authorization", "Bearer secret2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"serial": "Q2"}])))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = context(&server.uri(), Some("acme:secret1,secret2"), None);
        let args = json!({
            "section": "organizations",
            "method": "getOrganizationDevices",
            "kwargs": {"organizationId": 2}
        });
        let result = handle_tool_call("execute_meraki_api_endpoint", &args, &ctx).await;
        assert!(!result.is_error, "{}", result.text_content());
        assert_eq!(body(&result), json!([{"serial": "Q2"}]));
    }

    #[tokio::test]
    async fn execute_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devices/Q1"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"errors": ["Device not found"]})),
            )
            .mount(&server)
            .await;

        let ctx = context(&server.uri(), Some("abc"), None);
        let result = handle_tool_call(
            "execute_meraki_api_endpoint",
            &json!({"section": "devices", "method": "getDevice", "serial": "Q1", "key_id": "key_1"}),
            &ctx,
        )
        .await;
        assert!(result.is_error);
        let parsed = body(&result);
        assert_eq!(parsed["status"], 404);
        assert!(parsed["error"].as_str().unwrap().contains("Device not found"));
        assert_eq!(ctx.cache.len().await, 0);
    }
}
