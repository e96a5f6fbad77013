//! Role sets and route access rules
//!
//! Roles are opaque strings compared with case-sensitive equality. The role set of a
//! session is the union of the realm roles and the client roles from the access token.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Deduplicated, ordered set of role names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union of two role sources; argument order does not matter
    pub fn union_of<I, J>(realm_roles: I, client_roles: J) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
    {
        RoleSet(realm_roles.into_iter().chain(client_roles).collect())
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    /// True if the set shares at least one role with `roles`
    pub fn contains_any<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|r| self.0.contains(r.as_ref()))
    }

    pub fn contains_all<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().all(|r| self.0.contains(r.as_ref()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for RoleSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        RoleSet(iter.into_iter().collect())
    }
}

/// Check if a role set satisfies a protected route
///
/// A protected route lists the roles that may enter it; holding any one of them is
/// enough. An empty requirement list admits nobody.
pub fn can_access_route(user_roles: &RoleSet, required_roles: &[String]) -> bool {
    user_roles.contains_any(required_roles)
}
