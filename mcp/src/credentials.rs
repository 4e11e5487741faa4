//! Credential registry: parses the `MERAKI_API_KEY` string into key slots.
//!
//! Three formats are accepted, and may be mixed freely:
//!
//! ```text
//! abc123                         single key            -> key_1
//! key1,key2,key3                 several unnamed keys  -> key_1, key_2, key_3
//! customer_a:key1,customer_b:key2  named keys          -> customer_a, customer_b
//! ```
//!
//! Unnamed entries are numbered by their 1-based position in the list, so
//! `"acme:s1,s2"` yields `acme` and `key_2`. The parsed set is immutable.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, warn};

/// One configured API credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub key_id: String,
    pub display_name: String,
    secret: String,
}

impl Credential {
    /// The raw API key. Never logged, never returned by a tool.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key_id", &self.key_id)
            .field("display_name", &self.display_name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("API keys string cannot be empty")]
    Empty,
    #[error("API keys string contains no usable keys (every entry has an empty secret)")]
    NoUsableKeys,
}

/// Ordered set of credentials, keyed by key id in configuration order.
#[derive(Debug, Clone)]
pub struct CredentialSet {
    entries: IndexMap<String, Credential>,
}

impl CredentialSet {
    pub fn parse(input: &str) -> Result<Self, CredentialError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(CredentialError::Empty);
        }

        let mut entries = IndexMap::new();
        for (idx, part) in input.split(',').map(str::trim).enumerate() {
            let position = idx + 1;
            let (key_id, display_name, secret) = match part.split_once(':') {
                Some((name, secret)) if !name.trim().is_empty() => {
                    let name = name.trim();
                    (name.to_string(), name.to_string(), secret.trim())
                }
                Some((_, secret)) => unnamed(position, secret.trim()),
                None => unnamed(position, part),
            };

            if secret.is_empty() {
                debug!("Skipping credential entry {position}: empty secret");
                continue;
            }

            if entries.contains_key(&key_id) {
                warn!(
                    "Credential entry {position} reuses key id '{key_id}', replacing the earlier secret"
                );
            } else {
                debug!("Registered key: {key_id} ({display_name})");
            }
            // A repeated id keeps its first position but takes the later secret.
            entries.insert(
                key_id.clone(),
                Credential {
                    key_id,
                    display_name,
                    secret: secret.to_string(),
                },
            );
        }

        if entries.is_empty() {
            return Err(CredentialError::NoUsableKeys);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key_id: &str) -> Option<&Credential> {
        self.entries.get(key_id)
    }

    /// Key ids in configuration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.entries.values()
    }

    pub fn first_id(&self) -> Option<&str> {
        self.entries.keys().next().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Comma-separated key ids, for error messages.
    pub fn available(&self) -> String {
        self.ids().collect::<Vec<_>>().join(", ")
    }
}

fn unnamed(position: usize, secret: &str) -> (String, String, &str) {
    (
        format!("key_{position}"),
        format!("API Key {position}"),
        secret,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(set: &CredentialSet) -> Vec<(String, String)> {
        set.iter()
            .map(|c| (c.key_id.clone(), c.secret().to_string()))
            .collect()
    }

    #[test]
    fn named_and_unnamed_mix() {
        let set = CredentialSet::parse("acme:secret1,secret2").unwrap();
        assert_eq!(
            pairs(&set),
            vec![
                ("acme".to_string(), "secret1".to_string()),
                ("key_2".to_string(), "secret2".to_string()),
            ]
        );
        assert_eq!(set.first_id(), Some("acme"));
        assert_eq!(set.get("acme").unwrap().display_name, "acme");
        assert_eq!(set.get("key_2").unwrap().display_name, "API Key 2");
    }

    #[test]
    fn unnamed_ids_follow_position() {
        let set = CredentialSet::parse("a:x, y ,b:z, w").unwrap();
        let ids: Vec<&str> = set.ids().collect();
        assert_eq!(ids, vec!["a", "key_2", "b", "key_4"]);
    }

    #[test]
    fn parsing_is_idempotent() {
        let input = "one:aaa,bbb,three:ccc";
        let first = CredentialSet::parse(input).unwrap();
        let second = CredentialSet::parse(input).unwrap();
        assert_eq!(pairs(&first), pairs(&second));
    }

    #[test]
    fn duplicate_bare_secrets_get_distinct_ids() {
        let set = CredentialSet::parse("same,same").unwrap();
        assert_eq!(set.available(), "key_1, key_2");
    }

    #[test]
    fn generated_id_colliding_with_a_name_replaces_it() {
        let set = CredentialSet::parse("key_2:abc,def,other:ghi").unwrap();
        assert_eq!(
            pairs(&set),
            vec![
                ("key_2".to_string(), "def".to_string()),
                ("other".to_string(), "ghi".to_string()),
            ]
        );
        assert_eq!(set.get("key_2").unwrap().display_name, "API Key 2");
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(CredentialSet::parse("").unwrap_err(), CredentialError::Empty);
        assert_eq!(
            CredentialSet::parse("   \t ").unwrap_err(),
            CredentialError::Empty
        );
    }

    #[test]
    fn entries_with_empty_secrets_are_skipped() {
        let set = CredentialSet::parse("acme:,real").unwrap();
        assert_eq!(set.available(), "key_2");
        assert_eq!(
            CredentialSet::parse(",,").unwrap_err(),
            CredentialError::NoUsableKeys
        );
    }

    #[test]
    fn secret_is_split_on_first_colon_only() {
        let set = CredentialSet::parse("lab:abc:def").unwrap();
        assert_eq!(set.get("lab").unwrap().secret(), "abc:def");
    }

    #[test]
    fn debug_output_redacts_secret() {
        let set = CredentialSet::parse("acme:topsecret").unwrap();
        let rendered = format!("{:?}", set.get("acme").unwrap());
        assert!(!rendered.contains("topsecret"));
    }
}
