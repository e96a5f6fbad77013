//! OAuth2 client for the Keycloak realm
//!
//! Authorization code exchange and refresh-token exchange both go through the same
//! client. Client credentials are sent in the form body, as Keycloak's confidential
//! clients accept either way and the body form matches the raw token endpoint contract.

use oauth2::{
    basic::{BasicErrorResponseType, BasicTokenType},
    AuthUrl, ClientId, ClientSecret, EndpointNotSet, EndpointSet, ExtraTokenFields, RedirectUrl,
    StandardErrorResponse, StandardRevocableToken, StandardTokenIntrospectionResponse,
    StandardTokenResponse, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::session::TokenSet;

/// Lifetime assumed when the token endpoint omits `expires_in`
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Custom extra fields to capture id_token from OIDC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcTokenFields {
    pub id_token: Option<String>,
}

impl ExtraTokenFields for OidcTokenFields {}

pub type OidcTokenResponse = StandardTokenResponse<OidcTokenFields, BasicTokenType>;

/// Type alias for our configured OAuth client with OIDC support
pub type ConfiguredOAuthClient = oauth2::Client<
    StandardErrorResponse<BasicErrorResponseType>,
    OidcTokenResponse,
    StandardTokenIntrospectionResponse<OidcTokenFields, BasicTokenType>,
    StandardRevocableToken,
    StandardErrorResponse<oauth2::RevocationErrorResponseType>,
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Initialize OAuth2 client from configuration
///
/// The authorization endpoint uses the public URL (browser redirect); the token
/// endpoint uses the internal URL (server-to-server).
pub fn create_oauth_client(config: &Config) -> Result<ConfiguredOAuthClient, String> {
    let auth_url = AuthUrl::new(format!(
        "{}/realms/{}/protocol/openid-connect/auth",
        config.keycloak_callback_url, config.keycloak_realm
    ))
    .map_err(|e| format!("Invalid auth URL: {}", e))?;

    let token_url = TokenUrl::new(format!(
        "{}/protocol/openid-connect/token",
        config.realm_internal_url()
    ))
    .map_err(|e| format!("Invalid token URL: {}", e))?;

    let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
        .map_err(|e| format!("Invalid redirect URL: {}", e))?;

    let client = oauth2::Client::new(ClientId::new(config.client_id.clone()))
        .set_client_secret(ClientSecret::new(config.client_secret.clone()))
        .set_auth_type(oauth2::AuthType::RequestBody)
        .set_auth_uri(auth_url)
        .set_token_uri(token_url)
        .set_redirect_uri(redirect_url);

    Ok(client)
}

/// Convert a token endpoint response into a token set
///
/// `previous_refresh_token` is kept when the provider does not rotate refresh tokens.
pub fn token_set_from_response(
    response: &OidcTokenResponse,
    previous_refresh_token: Option<&str>,
    now: u64,
) -> TokenSet {
    let expires_in = response
        .expires_in()
        .map(|d| d.as_secs())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

    TokenSet {
        access_token: response.access_token().secret().clone(),
        id_token: response.extra_fields().id_token.clone(),
        refresh_token: response
            .refresh_token()
            .map(|t| t.secret().clone())
            .or_else(|| previous_refresh_token.map(str::to_string)),
        // expires_in is provider-controlled
        expires_at: now.saturating_add(expires_in),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_config;

    fn response(json: &str) -> OidcTokenResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_create_oauth_client_from_config() {
        assert!(create_oauth_client(&test_config()).is_ok());
    }

    #[test]
    fn test_create_oauth_client_rejects_bad_redirect() {
        let mut config = test_config();
        config.redirect_uri = "not a url".to_string();
        assert!(create_oauth_client(&config).is_err());
    }

    #[test]
    fn test_token_set_from_full_response() {
        let r = response(
            r#"{"access_token":"at","token_type":"Bearer","expires_in":300,
                "refresh_token":"rt","id_token":"it"}"#,
        );
        let tokens = token_set_from_response(&r, Some("old"), 1_000);
        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.id_token.as_deref(), Some("it"));
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt"));
        assert_eq!(tokens.expires_at, 1_300);
    }

    #[test]
    fn test_token_set_keeps_previous_refresh_token() {
        let r = response(r#"{"access_token":"at","token_type":"Bearer","expires_in":60}"#);
        let tokens = token_set_from_response(&r, Some("old"), 1_000);
        assert_eq!(tokens.refresh_token.as_deref(), Some("old"));
        assert_eq!(tokens.id_token, None);
        assert_eq!(tokens.expires_at, 1_060);
    }

    #[test]
    fn test_token_set_default_lifetime() {
        let r = response(r#"{"access_token":"at","token_type":"Bearer"}"#);
        let tokens = token_set_from_response(&r, None, 0);
        assert_eq!(tokens.expires_at, DEFAULT_TOKEN_LIFETIME_SECS);
    }

    #[test]
    fn test_token_set_huge_lifetime_saturates() {
        let r = response(
            r#"{"access_token":"at","token_type":"Bearer","expires_in":18446744073709551615}"#,
        );
        let tokens = token_set_from_response(&r, None, 1_700_000_000);
        assert_eq!(tokens.expires_at, u64::MAX);
    }
}
