//! Multi-key routing.
//!
//! [`KeyRegistry`] owns the parsed credentials, a lazy [`ClientPool`] with
//! one [`DashboardClient`] per key, and the [`OrgDirectory`] that maps
//! organizations back to the key that can reach them.
//!
//! ## Key resolution
//!
//! Every dashboard call goes through [`KeyRegistry::resolve_key_id`]:
//!
//! 1. An explicit key id wins, and must be configured.
//! 2. Otherwise an organization id is looked up in the reverse index. On a
//!    miss, every key is discovered once and the lookup retried.
//! 3. Otherwise the session default key is used.
//!
//! Empty strings count as "not given".

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::client::{ClientError, DashboardClient};
use crate::credentials::{Credential, CredentialSet};
use crate::organizations::{OrgDirectory, Organization, OrganizationMatch};

/// Lazily built dashboard clients, one per key id. Never rebuilt.
pub struct ClientPool {
    base_url: String,
    clients: Mutex<HashMap<String, Arc<DashboardClient>>>,
}

impl ClientPool {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Get the client for `credential`, building it on first use.
    pub async fn get_or_build(
        &self,
        credential: &Credential,
    ) -> Result<Arc<DashboardClient>, ClientError> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(&credential.key_id) {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(DashboardClient::new(
            &self.base_url,
            credential.secret(),
            &credential.key_id,
        )?);
        info!(
            "Created dashboard client for {} ({}) as {}",
            credential.key_id,
            credential.display_name,
            client.identity()
        );
        clients.insert(credential.key_id.clone(), Arc::clone(&client));
        Ok(client)
    }

    #[cfg(test)]
    pub async fn is_built(&self, key_id: &str) -> bool {
        self.clients.lock().await.contains_key(key_id)
    }
}

/// Per-key result of [`KeyRegistry::discover_all`].
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryOutcome {
    pub organization_count: usize,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Key listing entry. Never carries the secret.
#[derive(Debug, Clone, Serialize)]
pub struct KeySummary {
    pub key_id: String,
    pub name: String,
    pub organization_count: usize,
    pub is_default: bool,
    pub has_organizations_cached: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyInfo {
    pub key_id: String,
    pub name: String,
    pub is_default: bool,
    pub organization_count: usize,
    pub organizations: Vec<Organization>,
}

/// Credentials, clients and the organization directory for one session.
pub struct KeyRegistry {
    credentials: CredentialSet,
    pool: ClientPool,
    directory: RwLock<OrgDirectory>,
    default_key: RwLock<Option<String>>,
}

impl KeyRegistry {
    pub fn new(credentials: CredentialSet, base_url: &str) -> Self {
        let default_key = credentials.first_id().map(String::from);
        info!(
            "Key registry initialized with {} API key(s), default: {}",
            credentials.len(),
            default_key.as_deref().unwrap_or("none")
        );
        Self {
            credentials,
            pool: ClientPool::new(base_url),
            directory: RwLock::new(OrgDirectory::new()),
            default_key: RwLock::new(default_key),
        }
    }

    pub fn credentials(&self) -> &CredentialSet {
        &self.credentials
    }

    #[cfg(test)]
    pub fn pool(&self) -> &ClientPool {
        &self.pool
    }

    pub fn is_multi_key(&self) -> bool {
        self.credentials.len() > 1
    }

    pub async fn default_key(&self) -> Option<String> {
        self.default_key.read().await.clone()
    }

    fn credential(&self, key_id: &str) -> Result<&Credential, KeyError> {
        self.credentials
            .get(key_id)
            .ok_or_else(|| KeyError::KeyNotFound {
                key_id: key_id.to_string(),
                available: self.credentials.available(),
            })
    }

    /// Pick the key for a call. See the module docs for the order.
    pub async fn resolve_key_id(
        &self,
        key_id: Option<&str>,
        organization_id: Option<&str>,
    ) -> Result<String, KeyError> {
        if let Some(key_id) = key_id.filter(|k| !k.is_empty()) {
            return self.credential(key_id).map(|c| c.key_id.clone());
        }

        if let Some(org_id) = organization_id.filter(|o| !o.is_empty()) {
            if let Some(owner) = self.directory.read().await.owner_of(org_id) {
                return Ok(owner.to_string());
            }
            info!("Organization '{org_id}' not in cache, discovering organizations");
            self.discover_all().await;
            return self
                .directory
                .read()
                .await
                .owner_of(org_id)
                .map(String::from)
                .ok_or_else(|| KeyError::OrganizationNotFound(org_id.to_string()));
        }

        self.default_key().await.ok_or(KeyError::NoCredentials)
    }

    /// Resolve a key and return it together with its dashboard client.
    pub async fn resolve(
        &self,
        key_id: Option<&str>,
        organization_id: Option<&str>,
    ) -> Result<(String, Arc<DashboardClient>), KeyError> {
        let key_id = self.resolve_key_id(key_id, organization_id).await?;
        let client = self.client(&key_id).await?;
        Ok((key_id, client))
    }

    /// Client for a configured key id.
    pub async fn client(&self, key_id: &str) -> Result<Arc<DashboardClient>, KeyError> {
        let credential = self.credential(key_id)?;
        Ok(self.pool.get_or_build(credential).await?)
    }

    /// Organizations visible to `key_id`, from cache or the dashboard.
    ///
    /// Failures are not cached.
    pub async fn discover(&self, key_id: &str) -> Result<Vec<Organization>, KeyError> {
        let credential = self.credential(key_id)?;
        if let Some(orgs) = self.directory.read().await.cached(key_id) {
            debug!("Using cached organizations for {key_id}");
            return Ok(orgs.to_vec());
        }

        let client = self.pool.get_or_build(credential).await?;
        let mut args = Map::new();
        args.insert("total_pages".into(), json!("all"));
        let payload = client
            .invoke("organizations", "getOrganizations", &args)
            .await?;
        let orgs: Vec<Organization> = serde_json::from_value(payload).map_err(|e| {
            ClientError::Protocol(format!("Unexpected organizations payload: {e}"))
        })?;

        info!(
            "Discovered {} organizations for {key_id} ({})",
            orgs.len(),
            credential.display_name
        );
        self.directory.write().await.record(key_id, orgs.clone());
        Ok(orgs)
    }

    /// Discover every configured key, in configuration order. Never fails.
    pub async fn discover_all(&self) -> IndexMap<String, DiscoveryOutcome> {
        let mut outcomes = IndexMap::new();
        for key_id in self.credentials.ids() {
            let outcome = match self.discover(key_id).await {
                Ok(orgs) => DiscoveryOutcome {
                    organization_count: orgs.len(),
                    status: "success",
                    error: None,
                },
                Err(e) => {
                    warn!("Failed to discover organizations for {key_id}: {e}");
                    DiscoveryOutcome {
                        organization_count: 0,
                        status: "failed",
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.insert(key_id.to_string(), outcome);
        }
        outcomes
    }

    /// Change the session default key. Idempotent.
    pub async fn set_default(&self, key_id: &str) -> Result<(), KeyError> {
        let credential = self.credential(key_id)?;
        let mut default_key = self.default_key.write().await;
        let old = default_key.replace(credential.key_id.clone());
        info!(
            "Default key changed from '{}' to '{}' ({})",
            old.as_deref().unwrap_or("none"),
            key_id,
            credential.display_name
        );
        Ok(())
    }

    pub async fn list_keys(&self) -> Vec<KeySummary> {
        let default_key = self.default_key().await;
        let directory = self.directory.read().await;
        self.credentials
            .iter()
            .map(|c| KeySummary {
                key_id: c.key_id.clone(),
                name: c.display_name.clone(),
                organization_count: directory.cached(&c.key_id).map_or(0, <[_]>::len),
                is_default: default_key.as_deref() == Some(c.key_id.as_str()),
                has_organizations_cached: directory.is_cached(&c.key_id),
            })
            .collect()
    }

    /// Key details with its organizations, discovering them if needed.
    pub async fn key_info(&self, key_id: &str) -> Result<KeyInfo, KeyError> {
        let organizations = self.discover(key_id).await?;
        let credential = self.credential(key_id)?;
        Ok(KeyInfo {
            key_id: credential.key_id.clone(),
            name: credential.display_name.clone(),
            is_default: self.default_key().await.as_deref() == Some(key_id),
            organization_count: organizations.len(),
            organizations,
        })
    }

    /// Find organizations by name across every discovered key.
    pub async fn find_organizations(&self, name: &str, fuzzy: bool) -> Vec<OrganizationMatch> {
        if !self.directory.read().await.has_index() {
            self.discover_all().await;
        }
        self.directory
            .read()
            .await
            .find_by_name(
                name,
                fuzzy,
                self.credentials
                    .iter()
                    .map(|c| (c.key_id.as_str(), c.display_name.as_str())),
            )
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("API key '{key_id}' not found. Available keys: {available}")]
    KeyNotFound { key_id: String, available: String },
    #[error("No API key found with access to organization: {0}")]
    OrganizationNotFound(String),
    #[error("No API keys available")]
    NoCredentials,
    #[error(transparent)]
    Remote(#[from] ClientError),
}

impl KeyError {
    /// Remediation hint shown to the agent alongside the error.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            KeyError::KeyNotFound { .. } => Some("Use list_api_keys to see the configured key ids"),
            KeyError::OrganizationNotFound(_) => Some(
                "Call discover_all_organizations to refresh the directory, or pass key_id explicitly",
            ),
            KeyError::NoCredentials => Some("Set MERAKI_API_KEY"),
            KeyError::Remote(ClientError::MissingParams(_)) => {
                Some("Use get_meraki_endpoint_parameters to see the required parameters")
            }
            KeyError::Remote(_) => None,
        }
    }
}
