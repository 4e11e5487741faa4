//! TTL cache for idempotent dashboard reads.
//!
//! Only methods whose name starts with `get` are cached. Entries are keyed
//! by key id, section, method and a SHA-256 of the canonical arguments, so
//! the same read through two different keys never shares an entry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use crate::util::to_hex;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    payload: String,
    created_at: Instant,
}

pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_cacheable(method: &str) -> bool {
        method.starts_with("get")
    }

    /// Cache key for a call. `serde_json` maps are ordered, so equal
    /// argument maps serialize identically.
    pub fn key(key_id: &str, section: &str, method: &str, args: &Value) -> String {
        let canonical = serde_json::to_string(args).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        format!("{key_id}:{section}:{method}:{}", to_hex(&digest))
    }

    /// Fresh payload for `key`, dropping it if it has expired.
    pub async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => {
                debug!("Cache hit: {key}");
                Some(entry.payload.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `payload`, pruning every expired entry first.
    pub async fn insert(&self, key: String, payload: String) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| e.created_at.elapsed() < self.ttl);
        entries.insert(
            key,
            CacheEntry {
                payload,
                created_at: Instant::now(),
            },
        );
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_get_methods_are_cacheable() {
        assert!(ResponseCache::is_cacheable("getOrganizations"));
        assert!(!ResponseCache::is_cacheable("updateDevice"));
        assert!(!ResponseCache::is_cacheable("rebootDevice"));
    }

    #[test]
    fn keys_depend_on_key_id_and_args() {
        let args = json!({"organizationId": "1"});
        let a = ResponseCache::key("a", "organizations", "getOrganization", &args);
        let b = ResponseCache::key("b", "organizations", "getOrganization", &args);
        let a2 = ResponseCache::key(
            "a",
            "organizations",
            "getOrganization",
            &json!({"organizationId": "2"}),
        );
        assert_ne!(a, b);
        assert_ne!(a, a2);
        assert_eq!(a, ResponseCache::key("a", "organizations", "getOrganization", &args));
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = ResponseCache::new(Duration::from_millis(20));
        cache.insert("k".into(), "payload".into()).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("payload"));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn insert_prunes_expired_entries() {
        let cache = ResponseCache::new(Duration::from_millis(20));
        cache.insert("old-a".into(), "a".into()).await;
        cache.insert("old-b".into(), "b".into()).await;
        assert_eq!(cache.len().await, 2);

        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.insert("fresh".into(), "c".into()).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("fresh").await.as_deref(), Some("c"));
    }
}
