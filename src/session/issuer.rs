use super::{Session, SessionError, TokenSet};
use crate::auth::claims::Claims;
use crate::auth::jwt::JwtValidator;
use crate::tenant::{RoleSet, TenantConfig};

/// Turns a token exchange into a tenant-bound session
///
/// Tenant isolation is enforced here, fail closed: a token without an organization
/// claim, or with another tenant's organization, yields a session flagged with an
/// error that the guard refuses on every non-public route.
pub struct SessionIssuer<'a> {
    tenant: &'a TenantConfig,
    client_id: &'a str,
}

impl<'a> SessionIssuer<'a> {
    pub fn new(tenant: &'a TenantConfig, client_id: &'a str) -> Self {
        Self { tenant, client_id }
    }

    /// Build a session from tokens and their (already verified) access token claims
    ///
    /// `claims` is `None` when the access token could not be decoded or verified; the
    /// session then carries no roles and no organization.
    pub fn issue(&self, tokens: TokenSet, claims: Option<&Claims>) -> Session {
        let (subject, name, email, roles, organization) = match claims {
            Some(c) => (
                c.sub.clone(),
                c.display_name(),
                c.email.clone(),
                c.roles(self.client_id),
                c.organization(),
            ),
            None => (String::new(), None, None, RoleSet::new(), None),
        };

        let error = match organization.as_deref() {
            None => {
                tracing::warn!(
                    event = "session_no_organization",
                    sub = %subject,
                    tenant_id = %self.tenant.id,
                    "No organization in token; this portal requires managed organization membership"
                );
                Some(SessionError::NoOrganization)
            }
            Some(org) if org != self.tenant.id => {
                tracing::warn!(
                    event = "session_invalid_organization",
                    sub = %subject,
                    organization = %org,
                    tenant_id = %self.tenant.id,
                    "Organization mismatch"
                );
                Some(SessionError::InvalidOrganization)
            }
            Some(_) => None,
        };

        if error.is_none() && roles.is_empty() {
            tracing::warn!(
                sub = %subject,
                has_realm_access = claims.is_some_and(Claims::has_realm_access),
                "Token has no roles - check the realm_access.roles and client roles mappers"
            );
        }

        Session {
            subject,
            name,
            email,
            roles,
            organization,
            tenant_id: self.tenant.id.clone(),
            tokens,
            error,
        }
    }

    /// Verify the access token, then issue
    ///
    /// A verification failure is logged and treated as a token without claims.
    pub async fn issue_verified(&self, validator: &JwtValidator, tokens: TokenSet) -> Session {
        let claims = match validator.validate_async(&tokens.access_token).await {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::warn!(error = %e, "Access token could not be verified; issuing session without claims");
                None
            }
        };

        let session = self.issue(tokens, claims.as_ref());
        tracing::info!(
            event = "session_issued",
            sub = %session.subject,
            roles = session.roles.len(),
            error = ?session.error,
            "Session issued"
        );
        session
    }
}
