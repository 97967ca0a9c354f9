//! Remote directory records.
//!
//! These are immutable per-run snapshots of identity provider state. They
//! are produced by a connector during the fetch phase and consumed by the
//! reconciliation engine; nothing mutates them after the fetch completes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, ConnectorResult};

/// A user record as reported by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteUser {
    /// Stable provider-side identifier. This is the correlation key against
    /// local accounts; usernames may be reassigned, this may not.
    pub external_id: String,
    /// Login name.
    pub username: String,
    /// Primary email address.
    pub email: Option<String>,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Whether the account is enabled at the provider.
    pub enabled: bool,
    /// Raw identifiers (paths) of the groups this user belongs to.
    pub groups: BTreeSet<String>,
    /// Free-form multi-valued attributes, used for role detection.
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl RemoteUser {
    /// Parses a user from the provider admin-API JSON representation.
    ///
    /// Group memberships are not part of the user representation; the
    /// fetch phase fills [`RemoteUser::groups`] from the group member
    /// listings afterwards.
    pub fn from_json(value: &serde_json::Value) -> ConnectorResult<Self> {
        Ok(Self {
            external_id: value
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ConnectorError::config("user record missing id"))?
                .to_string(),
            username: value
                .get("username")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ConnectorError::config("user record missing username"))?
                .to_string(),
            email: value
                .get("email")
                .and_then(|v| v.as_str())
                .map(String::from),
            first_name: value
                .get("firstName")
                .and_then(|v| v.as_str())
                .map(String::from),
            last_name: value
                .get("lastName")
                .and_then(|v| v.as_str())
                .map(String::from),
            enabled: value
                .get("enabled")
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
            groups: BTreeSet::new(),
            attributes: parse_attributes(value.get("attributes")),
        })
    }

    /// First value of a named attribute, if present.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// A group record as reported by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteGroup {
    /// Stable provider-side identifier.
    pub external_id: String,
    /// Plain group name (last path segment).
    pub name: String,
    /// Slash-delimited path, e.g. `/schools/10a`. This is the raw
    /// identifier fed to classification.
    pub path: String,
    /// Member count when the provider reports one. Providers may report
    /// stale counts; treat as a hint only.
    pub member_count: Option<u32>,
    /// Free-form multi-valued attributes.
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl RemoteGroup {
    /// Parses a group from the provider admin-API JSON representation.
    pub fn from_json(value: &serde_json::Value) -> ConnectorResult<Self> {
        let name = value
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConnectorError::config("group record missing name"))?
            .to_string();

        Ok(Self {
            external_id: value
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ConnectorError::config("group record missing id"))?
                .to_string(),
            path: value
                .get("path")
                .and_then(|v| v.as_str())
                .map_or_else(|| format!("/{name}"), String::from),
            name,
            member_count: value
                .get("memberCount")
                .and_then(serde_json::Value::as_u64)
                .and_then(|n| u32::try_from(n).ok()),
            attributes: parse_attributes(value.get("attributes")),
        })
    }
}

/// Parses the provider's multi-valued attribute map (`name -> [values]`).
fn parse_attributes(value: Option<&serde_json::Value>) -> BTreeMap<String, Vec<String>> {
    let mut attributes = BTreeMap::new();
    if let Some(map) = value.and_then(|v| v.as_object()) {
        for (key, raw) in map {
            let values = match raw {
                serde_json::Value::Array(items) => items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(String::from)
                    .collect(),
                serde_json::Value::String(s) => vec![s.clone()],
                _ => continue,
            };
            attributes.insert(key.clone(), values);
        }
    }
    attributes
}
