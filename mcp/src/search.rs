//! Natural-language lookup over the endpoint catalog.
//!
//! Two strategies sit behind [`EndpointSearch`]:
//!
//! - [`KeywordSearch`] scores every catalog entry with a Jaccard overlap
//!   between the query words and keywords derived from the section and the
//!   camelCase method name, weighted towards common read endpoints.
//! - [`VectorSearch`] asks a Qdrant collection (server-side inference) for
//!   the nearest `section`/`method` payloads and maps them back onto the
//!   catalog.
//!
//! Both return hits sorted by descending score, filtered by `min_score` and
//! truncated to `limit`.

use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::{self, Endpoint};

pub const DEFAULT_LIMIT: usize = 5;
pub const DEFAULT_MIN_SCORE: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub endpoint: &'static Endpoint,
    pub score: f64,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Vector search request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Vector search returned HTTP {status}: {message}")]
    Backend { status: u16, message: String },
}

#[async_trait]
pub trait EndpointSearch: Send + Sync {
    /// Short strategy name, reported in tool output.
    fn name(&self) -> &'static str;

    async fn search(
        &self,
        query: &str,
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<SearchHit>, SearchError>;
}

/// Sort by descending score (catalog order on ties), threshold, truncate.
fn rank(mut hits: Vec<SearchHit>, limit: usize, min_score: f64) -> Vec<SearchHit> {
    hits.retain(|h| h.score > 0.0 && h.score >= min_score);
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(limit);
    hits
}

// --- Keyword strategy ---

struct Pattern {
    endpoint: &'static Endpoint,
    keywords: HashSet<String>,
    weight: f64,
}

/// Keyword / Jaccard search over the static catalog.
#[derive(Default)]
pub struct KeywordSearch {
    patterns: OnceLock<Vec<Pattern>>,
}

impl KeywordSearch {
    pub fn new() -> Self {
        Self::default()
    }

    fn patterns(&self) -> &[Pattern] {
        self.patterns.get_or_init(|| {
            let patterns: Vec<Pattern> = catalog::all()
                .iter()
                .map(|endpoint| Pattern {
                    endpoint,
                    keywords: keywords_for(endpoint.section, endpoint.method),
                    weight: method_weight(endpoint.method),
                })
                .collect();
            info!("Initialized {} search patterns", patterns.len());
            patterns
        })
    }

    /// Score every endpoint against `query`, unranked.
    pub fn score_all(&self, query: &str) -> Vec<SearchHit> {
        let words = query_words(query);
        self.patterns()
            .iter()
            .map(|p| SearchHit {
                endpoint: p.endpoint,
                score: score(&words, &p.keywords, p.weight),
            })
            .collect()
    }
}

#[async_trait]
impl EndpointSearch for KeywordSearch {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<SearchHit>, SearchError> {
        Ok(rank(self.score_all(query), limit, min_score))
    }
}

fn query_words(query: &str) -> HashSet<String> {
    query
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

fn score(words: &HashSet<String>, keywords: &HashSet<String>, weight: f64) -> f64 {
    let intersection = words.intersection(keywords).count();
    let union = words.union(keywords).count();
    if union == 0 {
        return 0.0;
    }
    let jaccard = intersection as f64 / union as f64;
    let exact_bonus = (intersection as f64 * 0.1).min(0.3);
    (jaccard * weight + exact_bonus).min(1.0)
}

/// Split a camelCase identifier into lowercase words. Digits stay attached
/// to the word before them (`L3Firewall` → `l3`, `firewall`).
pub fn split_camel_case(ident: &str) -> Vec<String> {
    let chars: Vec<char> = ident.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        if c.is_alphanumeric() {
            current.push(c.to_ascii_lowercase());
        } else if !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn keywords_for(section: &str, method: &str) -> HashSet<String> {
    let mut keywords: Vec<&str> = vec![section];
    keywords.extend_from_slice(match section {
        "organizations" => &["org", "orgs", "organization"][..],
        "appliance" => &["mx", "security", "firewall"],
        "switch" => &["ms", "switching", "port", "ports"],
        "wireless" => &["mr", "wifi", "wireless", "access"],
        "camera" => &["mv", "cameras", "video"],
        "sensor" => &["mt", "sensors", "environmental"],
        "networks" => &["network", "net"],
        "devices" => &["device", "hardware"],
        _ => &[],
    });

    let words = split_camel_case(method);
    let has = |candidates: &[&str]| {
        words
            .iter()
            .any(|w| candidates.iter().any(|c| *c == w.as_str()))
    };

    let mut extra: Vec<&str> = Vec::new();
    if has(&["get"]) {
        extra.extend(["show", "list", "fetch", "retrieve"]);
    } else if has(&["update"]) {
        extra.extend(["modify", "change", "edit", "set"]);
    } else if has(&["create"]) {
        extra.extend(["add", "new", "make"]);
    } else if has(&["delete"]) {
        extra.extend(["remove", "destroy"]);
    }
    if has(&["firewall", "rules"]) {
        extra.extend(["security", "l3", "layer3", "policy"]);
    }
    if has(&["client", "clients"]) {
        extra.extend(["connected", "devices", "users"]);
    }
    if has(&["port", "ports"]) {
        extra.extend(["interface", "config", "configuration", "settings"]);
    }
    if has(&["vpn"]) {
        extra.extend(["tunnel", "connection", "site"]);
    }
    if has(&["ssid"]) {
        extra.extend(["network", "wifi", "wireless"]);
    }

    keywords
        .into_iter()
        .chain(extra)
        .map(String::from)
        .chain(words.iter().cloned())
        .collect()
}

fn method_weight(method: &str) -> f64 {
    let lower = method.to_lowercase();
    let is_get = method.starts_with("get");
    match method {
        "getOrganizations" | "getDevice" | "getNetworkClients" => 1.0,
        _ if is_get && lower.contains("organization") => 0.9,
        _ if is_get && (lower.contains("network") || lower.contains("device")) => 0.8,
        _ if is_get => 0.7,
        _ if method.starts_with("update") => 0.6,
        _ if method.starts_with("create") => 0.5,
        _ if method.starts_with("delete") => 0.4,
        _ => 0.3,
    }
}

// --- Vector strategy ---

/// Qdrant-backed search. The collection stores one point per endpoint
/// with `section` and `method` in its payload.
pub struct VectorSearch {
    http: reqwest::Client,
    url: String,
    collection: String,
    model: String,
    api_key: Option<String>,
}

impl VectorSearch {
    pub fn new(
        url: &str,
        collection: &str,
        model: &str,
        api_key: Option<String>,
    ) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            model: model.to_string(),
            api_key,
        })
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Deserialize)]
struct QueryResult {
    #[serde(default)]
    points: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f64,
    #[serde(default)]
    payload: Option<PointPayload>,
}

#[derive(Deserialize)]
struct PointPayload {
    section: String,
    method: MethodRef,
}

/// Collections store the method either as a plain name or as an object
/// carrying `name` alongside its parameter schema.
#[derive(Deserialize)]
#[serde(untagged)]
enum MethodRef {
    Name(String),
    Described { name: String },
}

impl MethodRef {
    fn name(&self) -> &str {
        match self {
            MethodRef::Name(name) | MethodRef::Described { name } => name,
        }
    }
}

#[async_trait]
impl EndpointSearch for VectorSearch {
    fn name(&self) -> &'static str {
        "vector"
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let body = json!({
            "query": { "text": query, "model": self.model },
            "limit": limit,
            "score_threshold": min_score,
            "with_payload": true,
        });
        let mut request = self
            .http
            .post(format!(
                "{}/collections/{}/points/query",
                self.url, self.collection
            ))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SearchError::Backend {
                status: status.as_u16(),
                message,
            });
        }
        let parsed: QueryResponse = resp.json().await?;

        let hits = parsed
            .result
            .points
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload?;
                match catalog::find(&payload.section, payload.method.name()) {
                    Some(endpoint) => Some(SearchHit {
                        endpoint,
                        score: point.score,
                    }),
                    None => {
                        debug!(
                            "Dropping vector hit {}.{} (not in catalog)",
                            payload.section,
                            payload.method.name()
                        );
                        None
                    }
                }
            })
            .collect();
        Ok(rank(hits, limit, min_score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn camel_case_keeps_digits_with_word() {
        assert_eq!(
            split_camel_case("getNetworkApplianceFirewallL3FirewallRules"),
            vec!["get", "network", "appliance", "firewall", "l3", "firewall", "rules"]
        );
        assert_eq!(split_camel_case("getDeviceLldpCdp"), vec!["get", "device", "lldp", "cdp"]);
        assert_eq!(split_camel_case("getAPIKeys"), vec!["get", "api", "keys"]);
    }

    #[test]
    fn weights_favour_common_reads() {
        assert_eq!(method_weight("getOrganizations"), 1.0);
        assert_eq!(method_weight("getOrganizationDevices"), 0.9);
        assert_eq!(method_weight("getNetworkSettings"), 0.8);
        assert_eq!(method_weight("getDeviceLldpCdp"), 0.8);
        assert_eq!(method_weight("updateDevice"), 0.6);
        assert_eq!(method_weight("deleteNetwork"), 0.4);
        assert_eq!(method_weight("rebootDevice"), 0.3);
    }

    #[test]
    fn score_is_capped_jaccard_plus_bonus() {
        let words: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let keywords: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(score(&words, &keywords, 1.0), 1.0);
        let none: HashSet<String> = HashSet::new();
        assert_eq!(score(&none, &none, 1.0), 0.0);
    }

    #[tokio::test]
    async fn keyword_search_finds_organizations() {
        let search = KeywordSearch::new();
        let hits = search.search("get organizations", 5, 0.3).await.unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].endpoint.method, "getOrganizations");
    }

    #[tokio::test]
    async fn keyword_results_are_sorted_thresholded_and_truncated() {
        let search = KeywordSearch::new();
        let hits = search.search("list network clients", 3, 0.2).await.unwrap();
        assert!(hits.len() <= 3);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(hits.iter().all(|h| h.score >= 0.2));

        let none = search.search("zzz qqq", 5, 0.3).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn vector_search_maps_payloads_to_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/meraki/points/query"))
            .and(header("api-key", "qk"))
            .and(body_partial_json(json!({"with_payload": true, "limit": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"points": [
                    {"id": 1, "score": 0.91, "payload": {"section": "organizations", "method": {"name": "getOrganizations"}}},
                    {"id": 2, "score": 0.80, "payload": {"section": "ghost", "method": "getNothing"}},
                    {"id": 3, "score": 0.75, "payload": {"section": "devices", "method": "getDevice"}}
                ]},
                "status": "ok"
            })))
            .mount(&server)
            .await;

        let search =
            VectorSearch::new(&server.uri(), "meraki", "BAAI/bge-small-en-v1.5", Some("qk".into()))
                .unwrap();
        let hits = search.search("my orgs", 2, 0.5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].endpoint.method, "getOrganizations");
        assert_eq!(hits[1].endpoint.method, "getDevice");
    }

    #[tokio::test]
    async fn vector_backend_errors_surface() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("collection missing"))
            .mount(&server)
            .await;
        let search = VectorSearch::new(&server.uri(), "meraki", "m", None).unwrap();
        let err = search.search("x", 5, 0.3).await.unwrap_err();
        assert!(matches!(err, SearchError::Backend { status: 404, .. }));
    }
}
