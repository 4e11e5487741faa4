//! Key management tools (multi-key mode only).

use serde_json::{json, Value};

use super::{bool_arg, key_failure, required_str, ToolContext, ToolResult};

pub fn definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "list_api_keys",
            "description": "List configured Meraki API keys (ids and names only, never the secrets), which one is the default, and how many organizations each has discovered.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }
        }),
        json!({
            "name": "get_key_organizations",
            "description": "List the organizations reachable with one API key. Discovers them on first use.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "key_id": {
                        "type": "string",
                        "description": "API key id, e.g. \"customer_a\" or \"key_1\""
                    }
                },
                "required": ["key_id"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "set_default_key",
            "description": "Set the API key used by calls that give neither key_id nor organizationId.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "key_id": {
                        "type": "string",
                        "description": "API key id to make the default"
                    }
                },
                "required": ["key_id"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "discover_all_organizations",
            "description": "Discover and cache the organizations of every configured API key, so organizationId alone routes calls to the right key.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }
        }),
        json!({
            "name": "find_organization_by_name",
            "description": "Find organizations by name across all API keys. Returns the organization id and the key that can reach it.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Organization name or part of it"
                    },
                    "fuzzy": {
                        "type": "boolean",
                        "description": "Case-insensitive partial match (default true). false requires the exact name."
                    }
                },
                "required": ["name"],
                "additionalProperties": false
            }
        }),
    ]
}

pub async fn handle_list_api_keys(ctx: &ToolContext) -> ToolResult {
    let registry = match ctx.registry() {
        Ok(r) => r,
        Err(e) => return e,
    };
    let keys = registry.list_keys().await;
    ToolResult::success(json!({
        "count": keys.len(),
        "keys": keys,
        "note": "Use get_key_organizations(key_id) to see organizations for a specific key"
    }))
}

pub async fn handle_get_key_organizations(args: &Value, ctx: &ToolContext) -> ToolResult {
    let registry = match ctx.registry() {
        Ok(r) => r,
        Err(e) => return e,
    };
    let key_id = match required_str(args, "key_id") {
        Ok(k) => k,
        Err(e) => return e,
    };
    match registry.key_info(key_id).await {
        Ok(info) => ToolResult::success(json!(info)),
        Err(e) => key_failure(&e, registry),
    }
}

pub async fn handle_set_default_key(args: &Value, ctx: &ToolContext) -> ToolResult {
    let registry = match ctx.registry() {
        Ok(r) => r,
        Err(e) => return e,
    };
    let key_id = match required_str(args, "key_id") {
        Ok(k) => k,
        Err(e) => return e,
    };
    if let Err(e) = registry.set_default(key_id).await {
        return key_failure(&e, registry);
    }
    let key_name = registry
        .credentials()
        .get(key_id)
        .map(|c| c.display_name.clone())
        .unwrap_or_default();
    ToolResult::success(json!({
        "success": true,
        "message": format!("Default key set to: {key_id}"),
        "key_name": key_name,
        "note": "All subsequent API calls without key_id will use this key"
    }))
}

pub async fn handle_discover_all(ctx: &ToolContext) -> ToolResult {
    let registry = match ctx.registry() {
        Ok(r) => r,
        Err(e) => return e,
    };
    let results = registry.discover_all().await;
    let total: usize = results.values().map(|o| o.organization_count).sum();
    ToolResult::success(json!({
        "total_keys": results.len(),
        "total_organizations": total,
        "results": results,
        "note": "Organizations cached. You can now use organizationId in execute_meraki_api_endpoint without specifying key_id"
    }))
}

pub async fn handle_find_organization(args: &Value, ctx: &ToolContext) -> ToolResult {
    let registry = match ctx.registry() {
        Ok(r) => r,
        Err(e) => return e,
    };
    let name = match required_str(args, "name") {
        Ok(n) => n,
        Err(e) => return e,
    };
    let fuzzy = bool_arg(args, "fuzzy", true);

    let matches = registry.find_organizations(name, fuzzy).await;
    let mut result = json!({
        "query": name,
        "fuzzy_match": fuzzy,
        "match_count": matches.len(),
        "matches": matches,
    });
    match matches.as_slice() {
        [] => {
            result["suggestion"] = json!(
                "No organizations found. Run discover_all_organizations first, check the spelling, or use fuzzy=true"
            );
        }
        [only] => {
            result["usage"] = json!(format!(
                "Use organizationId='{}' in API calls. The key '{}' is selected automatically",
                only.id, only.key_id
            ));
        }
        many => {
            result["note"] = json!(format!(
                "Multiple matches found ({}). Use the specific organizationId for the one you want",
                many.len()
            ));
        }
    }
    ToolResult::success(result)
}

#[cfg(test)]
mod tests {
    use super::super::handle_tool_call;
    use super::super::test_support::{body, context};
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_orgs(server: &MockServer, secret: &str, orgs: Value) {
        Mock::given(method("GET"))
            .and(path("/organizations"))
            .and(header("Authorization", format!("Bearer {secret}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(orgs))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn list_keys_hides_secrets() {
        let ctx = context("http://127.0.0.1:9", Some("acme:secret1,secret2"), None);
        let result = handle_tool_call("list_api_keys", &json!({}), &ctx).await;
        assert!(!result.is_error);
        assert!(!result.text_content().contains("secret1"));
        let parsed = body(&result);
        assert_eq!(parsed["count"], 2);
        assert_eq!(parsed["keys"][0]["key_id"], "acme");
        assert_eq!(parsed["keys"][0]["is_default"], true);
        assert_eq!(parsed["keys"][1]["name"], "API Key 2");
    }

    #[tokio::test]
    async fn set_default_key_validates() {
        let ctx = context("http://127.0.0.1:9", Some("acme:secret1,secret2"), None);
        let ok = handle_tool_call("set_default_key", &json!({"key_id": "key_2"}), &ctx).await;
        assert!(!ok.is_error);
        assert_eq!(body(&ok)["key_name"], "API Key 2");

        let bad = handle_tool_call("set_default_key", &json!({"key_id": "zzz"}), &ctx).await;
        assert!(bad.is_error);
        let parsed = body(&bad);
        assert_eq!(parsed["available_keys"], json!(["acme", "key_2"]));
    }

    #[tokio::test]
    async fn discover_all_reports_totals() {
        let server = MockServer::start().await;
        mount_orgs(
            &server,
            "secret1",
            json!([{"id": "1", "name": "A"}, {"id": "2", "name": "B"}]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/organizations"))
            .and(header("Authorization", "Bearer secret2"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"errors": ["Invalid API key"]})),
            )
            .mount(&server)
            .await;

        let ctx = context(&server.uri(), Some("acme:secret1,secret2"), None);
        let result = handle_tool_call("discover_all_organizations", &json!({}), &ctx).await;
        let parsed = body(&result);
        assert_eq!(parsed["total_keys"], 2);
        assert_eq!(parsed["total_organizations"], 2);
        assert_eq!(parsed["results"]["acme"]["status"], "success");
        assert_eq!(parsed["results"]["key_2"]["status"], "failed");
    }

    #[tokio::test]
    async fn find_organization_gives_usage_for_single_match() {
        let server = MockServer::start().await;
        mount_orgs(&server, "secret1", json!([{"id": "236620", "name": "Organization X"}])).await;
        mount_orgs(&server, "secret2", json!([{"id": "7", "name": "Other"}])).await;

        let ctx = context(&server.uri(), Some("org_x:secret1,secret2"), None);
        let result = handle_tool_call(
            "find_organization_by_name",
            &json!({"name": "organization x"}),
            &ctx,
        )
        .await;
        let parsed = body(&result);
        assert_eq!(parsed["match_count"], 1);
        assert_eq!(parsed["matches"][0]["key_id"], "org_x");
        assert!(parsed["usage"].as_str().unwrap().contains("236620"));

        let none = handle_tool_call(
            "find_organization_by_name",
            &json!({"name": "organization x", "fuzzy": false}),
            &ctx,
        )
        .await;
        assert_eq!(body(&none)["match_count"], 0);
    }
}
