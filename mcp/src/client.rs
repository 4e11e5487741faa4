//! HTTP client for the Meraki Dashboard API.
//!
//! [`DashboardClient`] wraps `reqwest::Client` for a single API key and
//! executes [`catalog`](crate::catalog) endpoints. All responses are returned
//! as `serde_json::Value`; the tools layer handles formatting for the agent.
//!
//! ## Rate limits
//!
//! A 429 is retried after the `Retry-After` delay (1 s when absent), a 5xx
//! after 1 s, up to [`MAX_RETRIES`] times. Any other non-2xx is returned as
//! [`ClientError::Api`] with the message taken from the Dashboard `errors`
//! array when present.
//!
//! ## Pagination
//!
//! List endpoints honour the reserved `total_pages` argument by following
//! `Link: <...>; rel=next` headers and concatenating the JSON arrays.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LINK, RETRY_AFTER};
use reqwest::{Method, StatusCode, Url};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{self, Endpoint, HttpVerb, Pages, PreparedRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.meraki.com/api/v1";

/// Retries after the first attempt, for 429 and 5xx responses.
pub const MAX_RETRIES: u32 = 3;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Dashboard API client bound to one API key.
#[derive(Clone)]
pub struct DashboardClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    identity: String,
    retry_delay: Duration,
}

impl std::fmt::Debug for DashboardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardClient")
            .field("base_url", &self.base_url)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl DashboardClient {
    /// Build a client for `key_id`. Performs no I/O.
    pub fn new(base_url: &str, api_key: &str, key_id: &str) -> Result<Self, ClientError> {
        let identity = format!("MerakiMcp/{} {}", env!("CARGO_PKG_VERSION"), key_id);

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .user_agent(identity.clone())
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            identity,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Caller identity sent as `User-Agent`.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[cfg(test)]
    pub(crate) fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Look up `section.method` in the catalog and execute it.
    pub async fn invoke(
        &self,
        section: &str,
        method: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, ClientError> {
        let endpoint =
            catalog::find(section, method).ok_or_else(|| ClientError::UnknownEndpoint {
                section: section.to_string(),
                method: method.to_string(),
            })?;
        self.call(endpoint, args).await
    }

    /// Execute a catalog endpoint with a flat argument map.
    pub async fn call(
        &self,
        endpoint: &Endpoint,
        args: &Map<String, Value>,
    ) -> Result<Value, ClientError> {
        let request = endpoint.prepare(args)?;
        debug!(
            "{} {} ({})",
            request.verb.as_str(),
            request.path,
            endpoint.qualified_name()
        );
        self.execute(request).await
    }

    /// Send a prepared request, retrying and paginating as needed.
    pub async fn execute(&self, request: PreparedRequest) -> Result<Value, ClientError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, request.path))
            .map_err(|e| ClientError::Protocol(format!("Invalid request URL: {e}")))?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &request.query {
                pairs.append_pair(name, value);
            }
        }

        let mut items = Vec::new();
        let mut fetched = 0u32;
        loop {
            let (value, next) = self
                .send_with_retry(request.verb, url, request.body.as_ref())
                .await?;
            fetched += 1;

            let page = match value {
                Value::Array(page) => page,
                // Non-list payloads are never paginated.
                other if fetched == 1 => return Ok(other),
                other => {
                    return Err(ClientError::Protocol(format!(
                        "Expected a JSON array on page {fetched}, got {other}"
                    )))
                }
            };
            items.extend(page);

            let more = match request.pages {
                Pages::All => true,
                Pages::Limit(n) => fetched < n,
            };
            match next {
                Some(next) if more => url = next,
                _ => return Ok(Value::Array(items)),
            }
        }
    }

    async fn send_with_retry(
        &self,
        verb: HttpVerb,
        url: Url,
        body: Option<&Value>,
    ) -> Result<(Value, Option<Url>), ClientError> {
        let method = match verb {
            HttpVerb::Get => Method::GET,
            HttpVerb::Post => Method::POST,
            HttpVerb::Put => Method::PUT,
            HttpVerb::Delete => Method::DELETE,
        };

        let mut attempt = 0;
        loop {
            let mut builder = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(&self.api_key);
            if let Some(body) = body {
                builder = builder.json(body);
            }
            let resp = builder.send().await?;
            let status = resp.status();

            let retryable =
                status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < MAX_RETRIES {
                let wait = if status == StatusCode::TOO_MANY_REQUESTS {
                    retry_after(resp.headers()).unwrap_or(self.retry_delay)
                } else {
                    self.retry_delay
                };
                attempt += 1;
                warn!(
                    "{} {} returned {status}, retry {attempt}/{MAX_RETRIES} in {:?}",
                    method,
                    url.path(),
                    wait
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            let next = next_link(resp.headers());
            let value = Self::handle_response(resp).await?;
            return Ok((value, next));
        }
    }

    async fn handle_response(resp: reqwest::Response) -> Result<Value, ClientError> {
        let status = resp.status();
        let body = resp.text().await?;

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&body)
                .map_err(|e| ClientError::Protocol(format!("Invalid JSON from dashboard: {e}")))
        } else {
            Err(ClientError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            })
        }
    }
}

/// Pull a readable message out of a Dashboard error body.
///
/// The API answers `{"errors": ["..."]}`; some gateways answer
/// `{"error": "..."}`. Anything else is returned raw.
fn error_message(body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    if let Some(errors) = parsed.get("errors").and_then(Value::as_array) {
        let messages: Vec<&str> = errors.iter().filter_map(Value::as_str).collect();
        if !messages.is_empty() {
            return messages.join("; ");
        }
    }
    parsed
        .get("error")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| body.to_string())
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Target of the `rel=next` entry of a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<Url> {
    let raw = headers.get(LINK)?.to_str().ok()?;
    raw.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| matches!(p.trim(), "rel=next" | "rel=\"next\""));
        if !is_next {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}

/// Errors returned by [`DashboardClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Meraki API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParams(Vec<String>),
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },
    #[error("Unknown endpoint {section}.{method}")]
    UnknownEndpoint { section: String, method: String },
}

impl ClientError {
    /// HTTP status of an API error, if the dashboard answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
