use oauth2::RefreshToken;

use super::{unix_now, Session, SessionError, SessionIssuer, TokenSet};
use crate::auth::helpers::create_http_client;
use crate::auth::jwt::JwtValidator;
use crate::auth::oidc::{create_oauth_client, token_set_from_response, ConfiguredOAuthClient};
use crate::config::Config;

/// Exchanges refresh tokens for new access tokens
///
/// One attempt per expiry detection, no retry. Failure never escapes as an error: it
/// is recorded on the session as [`SessionError::RefreshAccessTokenError`].
pub struct SessionRefresher {
    oauth_client: ConfiguredOAuthClient,
    http_client: reqwest::Client,
}

impl SessionRefresher {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let oauth_client = create_oauth_client(config)
            .map_err(|e| anyhow::anyhow!("Failed to create OAuth client: {}", e))?;
        let http_client = create_http_client(
            config.http_connect_timeout_secs,
            config.http_request_timeout_secs,
        )?;

        Ok(Self {
            oauth_client,
            http_client,
        })
    }

    /// Exchange the session's refresh token
    ///
    /// On success the session gets the new tokens and expiry; everything else is left
    /// untouched. On failure only the error tag changes.
    pub async fn refresh(&self, session: Session, now: u64) -> Session {
        match self.exchange(&session.tokens, now).await {
            Ok(tokens) => {
                tracing::info!(
                    event = "session_refreshed",
                    sub = %session.subject,
                    expires_at = tokens.expires_at,
                    "Access token refreshed"
                );
                Session { tokens, ..session }
            }
            Err(e) => {
                tracing::warn!(
                    event = "session_refresh_failed",
                    sub = %session.subject,
                    error = %e,
                    "Error refreshing access token"
                );
                Session {
                    error: Some(SessionError::RefreshAccessTokenError),
                    ..session
                }
            }
        }
    }

    async fn exchange(&self, tokens: &TokenSet, now: u64) -> anyhow::Result<TokenSet> {
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("session has no refresh token"))?;

        let response = self
            .oauth_client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| anyhow::anyhow!("refresh token exchange failed: {}", e))?;

        Ok(token_set_from_response(&response, Some(refresh_token), now))
    }
}

/// Bring a session up to date before the guard looks at it
///
/// Sessions that already carry an error, or whose access token is still valid, are
/// returned as is. An expired session is refreshed; after a successful refresh the
/// new access token is verified and roles and organization are derived again, with
/// the same tenant check as at sign-in. Returns the session and whether it changed.
pub async fn ensure_fresh(
    session: Session,
    config: &Config,
    validator: &JwtValidator,
    refresher: &SessionRefresher,
) -> (Session, bool) {
    let now = unix_now();
    if session.error.is_some() || !session.is_expired(now) {
        return (session, false);
    }

    tracing::debug!(sub = %session.subject, "Access token expired, refreshing");

    let refreshed = refresher.refresh(session, now).await;
    if refreshed.error.is_some() {
        return (refreshed, true);
    }

    let issuer = SessionIssuer::new(&config.tenant, &config.client_id);
    (issuer.issue_verified(validator, refreshed.tokens).await, true)
}
