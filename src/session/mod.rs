//! Tenant-bound session record
//!
//! A session is created by the [`issuer`] after sign-in, replaced by the
//! [`refresher`] when its access token expires, checked by the [`guard`] on every
//! request and carried between requests by [`cookie`].

pub mod cookie;
pub mod guard;
pub mod issuer;
pub mod refresher;

pub use cookie::SessionSealer;
pub use guard::{evaluate, route_guard, AuthErrorCode, GuardDecision};
pub use issuer::SessionIssuer;
pub use refresher::SessionRefresher;

use serde::{Deserialize, Serialize};

use crate::tenant::RoleSet;

/// Non-fatal session problem, acted on by the guard at the next evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SessionError {
    /// Organization claim present but not the deployment's tenant
    #[error("InvalidOrganization")]
    InvalidOrganization,
    /// No organization claim (unmanaged user)
    #[error("NoOrganization")]
    NoOrganization,
    /// Refresh-token exchange failed
    #[error("RefreshAccessTokenError")]
    RefreshAccessTokenError,
}

/// Tokens returned by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Unix seconds after which the access token must be refreshed
    pub expires_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub subject: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: RoleSet,
    pub organization: Option<String>,
    /// Deployment tenant at issuance time
    pub tenant_id: String,
    pub tokens: TokenSet,
    pub error: Option<SessionError>,
}

impl Session {
    /// True once the access token lifetime is over
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.tokens.expires_at
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        self.roles.contains_any(roles)
    }

    pub fn has_all_roles<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        self.roles.contains_all(roles)
    }

    /// Name shown in the UI, falling back to e-mail and subject
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.subject)
    }
}

/// Current time in unix seconds
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
