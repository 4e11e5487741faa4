//! Organization directory: organizations discovered per key, plus the
//! reverse `organization id → key id` index used for routing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// One organization as returned by `GET /organizations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A name-search hit, tagged with the key that can reach it.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationMatch {
    pub id: String,
    pub name: String,
    pub key_id: String,
    pub key_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Discovery cache. Not synchronized; the key registry wraps it in a lock.
#[derive(Debug, Default)]
pub struct OrgDirectory {
    by_key: HashMap<String, Vec<Organization>>,
    owner: HashMap<String, String>,
}

impl OrgDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a discovery result for `key_id` and index its organizations.
    ///
    /// The first key to discover an organization owns it; later keys that
    /// can also see it do not take over the route.
    pub fn record(&mut self, key_id: &str, orgs: Vec<Organization>) {
        for org in &orgs {
            if org.id.is_empty() {
                continue;
            }
            match self.owner.get(&org.id) {
                Some(existing) if existing != key_id => {
                    debug!(
                        "Organization {} also visible to {key_id}, keeping route via {existing}",
                        org.id
                    );
                }
                Some(_) => {}
                None => {
                    self.owner.insert(org.id.clone(), key_id.to_string());
                }
            }
        }
        self.by_key.insert(key_id.to_string(), orgs);
    }

    pub fn cached(&self, key_id: &str) -> Option<&[Organization]> {
        self.by_key.get(key_id).map(Vec::as_slice)
    }

    pub fn is_cached(&self, key_id: &str) -> bool {
        self.by_key.contains_key(key_id)
    }

    pub fn owner_of(&self, organization_id: &str) -> Option<&str> {
        self.owner.get(organization_id).map(String::as_str)
    }

    pub fn has_index(&self) -> bool {
        !self.owner.is_empty()
    }

    /// Search cached organizations by name, walking `(key id, key name)`
    /// pairs in order.
    ///
    /// Fuzzy matching is a case-insensitive substring test; exact matching
    /// is plain equality.
    pub fn find_by_name<'a>(
        &self,
        name: &str,
        fuzzy: bool,
        keys: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Vec<OrganizationMatch> {
        let needle = name.to_lowercase();
        let mut matches = Vec::new();
        for (key_id, key_name) in keys {
            let Some(orgs) = self.by_key.get(key_id) else {
                continue;
            };
            for org in orgs {
                let hit = if fuzzy {
                    org.name.to_lowercase().contains(&needle)
                } else {
                    org.name == name
                };
                if hit {
                    matches.push(OrganizationMatch {
                        id: org.id.clone(),
                        name: org.name.clone(),
                        key_id: key_id.to_string(),
                        key_name: key_name.to_string(),
                        url: org.url.clone(),
                    });
                }
            }
        }
        matches
    }
}
