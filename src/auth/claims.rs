//! Access token claims
//!
//! Keycloak puts realm roles under `realm_access.roles` and client roles under
//! `resource_access.<client_id>.roles`. The organization arrives under one of
//! several claim names depending on the realm's mappers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::tenant::RoleSet;

// Helper struct for deserializing Keycloak's realm_access / resource_access entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct RoleAccess {
    #[serde(default)]
    pub(crate) roles: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub exp: Option<u64>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub(crate) realm_access: Option<RoleAccess>,
    #[serde(default)]
    pub(crate) resource_access: Option<HashMap<String, RoleAccess>>,
    /// Organization membership: `{ "<name>": {...} }`, a name, or a list of names
    #[serde(default)]
    pub(crate) organization: Option<Value>,
    #[serde(default)]
    pub(crate) org: Option<Value>,
    #[serde(default, rename = "kc.organization")]
    pub(crate) kc_organization: Option<Value>,
}

impl Claims {
    pub fn realm_roles(&self) -> Vec<String> {
        self.realm_access
            .as_ref()
            .map(|ra| ra.roles.clone())
            .unwrap_or_default()
    }

    /// Roles granted on the given client application
    pub fn client_roles(&self, client_id: &str) -> Vec<String> {
        self.resource_access
            .as_ref()
            .and_then(|ra| ra.get(client_id))
            .map(|ra| ra.roles.clone())
            .unwrap_or_default()
    }

    /// Realm roles and client roles merged into one set
    pub fn roles(&self, client_id: &str) -> RoleSet {
        RoleSet::union_of(self.realm_roles(), self.client_roles(client_id))
    }

    /// Check if the token has realm_access claim at all
    /// Used for diagnostic logging when roles are empty
    pub fn has_realm_access(&self) -> bool {
        self.realm_access.is_some()
    }

    /// Organization name carried by the token
    ///
    /// Sources are tried in order: `organization`, `org`, `kc.organization`.
    /// Empty values fall through to the next source.
    pub fn organization(&self) -> Option<String> {
        [&self.organization, &self.org, &self.kc_organization]
            .into_iter()
            .flatten()
            .find_map(organization_name)
    }

    /// Human-readable name for the session
    pub fn display_name(&self) -> Option<String> {
        [&self.name, &self.preferred_username]
            .into_iter()
            .flatten()
            .find(|n| !n.trim().is_empty())
            .cloned()
    }
}

fn organization_name(value: &Value) -> Option<String> {
    let name = match value {
        Value::String(s) => Some(s.as_str()),
        // Keycloak: { "acme-corp": { "id": "..." } }, first key is the organization
        Value::Object(map) => map.keys().next().map(String::as_str),
        Value::Array(items) => items.iter().find_map(Value::as_str),
        _ => None,
    }?;

    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
