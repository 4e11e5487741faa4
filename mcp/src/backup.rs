//! HTTP client for the Selent backup, restore and compliance service.
//!
//! Authentication is an `x-api-key` header. Successful responses come back
//! as [`ServiceResponse`] (`{status, data}`); non-2xx responses become
//! [`BackupError::Http`] with the decoded body kept as `payload`.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_BASE_URL: &str = "https://backend.selent.ai";

/// Successful service response.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceResponse {
    pub status: u16,
    pub data: Value,
}

/// Body of `POST /mcp/restores`.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreRequest {
    pub component_id: String,
    pub backup_id: String,
    pub component_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
}

pub struct BackupClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackupClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, BackupError> {
        let mut default_headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| BackupError::Config("API key contains invalid header characters".into()))?;
        default_headers.insert(HeaderName::from_static("x-api-key"), key);
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `POST /mcp/backups` - start a full organization backup (takes 1-2 min).
    pub async fn create_backup(&self) -> Result<ServiceResponse, BackupError> {
        info!("Initiating organization backup");
        let resp = self
            .http
            .post(format!("{}/mcp/backups", self.base_url))
            .send()
            .await?;
        let result = Self::handle_response(resp).await?;
        if let Some(id) = result.data.get("id") {
            info!("Backup initiated with ID: {id}");
        }
        Ok(result)
    }

    /// `GET /mcp/backups/{id}`
    pub async fn backup_status(&self, backup_id: &str) -> Result<ServiceResponse, BackupError> {
        let resp = self
            .http
            .get(format!(
                "{}/mcp/backups/{}",
                self.base_url,
                urlencoding::encode(backup_id)
            ))
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    /// `POST /mcp/restores`
    pub async fn restore(&self, request: &RestoreRequest) -> Result<ServiceResponse, BackupError> {
        info!(
            "Initiating restore for {} {} from backup {}",
            request.component_type, request.component_id, request.backup_id
        );
        let resp = self
            .http
            .post(format!("{}/mcp/restores", self.base_url))
            .json(request)
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    /// `GET /mcp/restores/{id}`
    pub async fn restore_status(&self, restore_id: &str) -> Result<ServiceResponse, BackupError> {
        let resp = self
            .http
            .get(format!(
                "{}/mcp/restores/{}",
                self.base_url,
                urlencoding::encode(restore_id)
            ))
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    /// `GET /mcp/compliance/types`
    pub async fn compliance_types(&self) -> Result<ServiceResponse, BackupError> {
        let resp = self
            .http
            .get(format!("{}/mcp/compliance/types", self.base_url))
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    /// `POST /mcp/compliance`
    pub async fn run_compliance_check(
        &self,
        compliance_type: &str,
        network_id: Option<&str>,
    ) -> Result<ServiceResponse, BackupError> {
        let resp = self
            .http
            .post(format!("{}/mcp/compliance", self.base_url))
            .json(&json!({ "compliance_type": compliance_type, "network_id": network_id }))
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    async fn handle_response(resp: reqwest::Response) -> Result<ServiceResponse, BackupError> {
        let status = resp.status();
        let body = resp.text().await?;

        if status.is_success() {
            let data = if body.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&body).map_err(|e| {
                    BackupError::Protocol(format!("Invalid JSON from backup service: {e}"))
                })?
            };
            Ok(ServiceResponse {
                status: status.as_u16(),
                data,
            })
        } else {
            let payload = serde_json::from_str::<Value>(&body)
                .unwrap_or_else(|_| json!({ "message": body }));
            Err(BackupError::Http {
                status: status.as_u16(),
                message: format!(
                    "{} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("error")
                ),
                payload,
            })
        }
    }
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup service request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Backup service returned HTTP {message}")]
    Http {
        status: u16,
        message: String,
        payload: Value,
    },
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Invalid backup client configuration: {0}")]
    Config(String),
}

impl BackupError {
    /// Structured rendering for tool output.
    pub fn to_json(&self) -> Value {
        match self {
            BackupError::Http {
                status,
                message,
                payload,
            } => json!({
                "error": true,
                "status": status,
                "message": message,
                "payload": payload,
            }),
            other => json!({ "error": true, "message": other.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn create_backup_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp/backups"))
            .and(header("x-api-key", "bk"))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({"id": "b-1", "status": "RUNNING"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = BackupClient::new(&server.uri(), "bk").unwrap();
        let result = client.create_backup().await.unwrap();
        assert_eq!(result.status, 202);
        assert_eq!(result.data["id"], "b-1");
    }

    #[tokio::test]
    async fn restore_omits_unset_optionals() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp/restores"))
            .and(body_json(json!({
                "component_id": "N_1",
                "backup_id": "b-1",
                "component_type": "network",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "r-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = BackupClient::new(&server.uri(), "bk").unwrap();
        let request = RestoreRequest {
            component_id: "N_1".into(),
            backup_id: "b-1".into(),
            component_type: "network".into(),
            component_model: None,
            network_id: None,
        };
        assert_eq!(client.restore(&request).await.unwrap().data["id"], "r-1");
    }

    #[tokio::test]
    async fn status_ids_stay_in_one_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mcp/restores/r%201%2Fx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "RUNNING"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = BackupClient::new(&server.uri(), "bk").unwrap();
        let result = client.restore_status("r 1/x").await.unwrap();
        assert_eq!(result.data["status"], "RUNNING");
    }

    #[tokio::test]
    async fn non_success_maps_to_http_error_with_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mcp/backups/missing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Backup not found"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mcp/compliance/types"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = BackupClient::new(&server.uri(), "bk").unwrap();
        match client.backup_status("missing").await.unwrap_err() {
            BackupError::Http {
                status, payload, ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(payload["detail"], "Backup not found");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = client.compliance_types().await.unwrap_err();
        let rendered = err.to_json();
        assert_eq!(rendered["status"], 500);
        assert_eq!(rendered["payload"]["message"], "boom");
    }

    #[tokio::test]
    async fn compliance_check_sends_null_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp/compliance"))
            .and(body_json(json!({"compliance_type": "pci", "network_id": null})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"passed": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = BackupClient::new(&server.uri(), "bk").unwrap();
        let result = client.run_compliance_check("pci", None).await.unwrap();
        assert_eq!(result.data["passed"], true);
    }
}
