//! Pure helper functions for authentication
//!
//! This module contains stateless helper functions for URL building,
//! cookie extraction and HTTP clients.

use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderValue};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::time::Duration;

/// Path users land on after sign-in when no callback was requested
pub const DEFAULT_CALLBACK_PATH: &str = "/dashboard";

// =============================================================================
// JWT Helpers (for logout token validation)
// =============================================================================

/// Check if a JWT token is expired (without signature verification)
///
/// This is used for logout to avoid sending expired id_token_hint to Keycloak,
/// which would cause "expired_code" warnings in Keycloak logs.
///
/// Returns true if the token is expired or malformed.
pub fn is_jwt_expired(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return true;
    }

    // JWT segments are base64url; tolerate stray padding
    let payload = match URL_SAFE_NO_PAD.decode(parts[1].trim_end_matches('=')) {
        Ok(p) => p,
        Err(_) => return true,
    };

    let json: serde_json::Value = match serde_json::from_slice(&payload) {
        Ok(v) => v,
        Err(_) => return true,
    };

    let exp = match json.get("exp").and_then(|v| v.as_i64()) {
        Some(e) => e,
        None => return true,
    };

    // Tokens within 5 seconds of expiry already count as expired (clock skew)
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    exp <= now.saturating_add(5)
}

// =============================================================================
// HTTP Client Builders
// =============================================================================

/// Create a reqwest client for OAuth2 HTTP requests using config timeouts
pub fn create_http_client(
    connect_timeout_secs: u64,
    request_timeout_secs: u64,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none()) // Security: prevent SSRF
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(request_timeout_secs))
        .build()
}

// =============================================================================
// Header Helpers
// =============================================================================

/// Create a HeaderValue from a string without panicking on malformed input
pub fn header_value(s: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(s).map_err(|e| {
        tracing::error!(
            error = %e,
            value_len = s.len(),
            "Failed to create header value - possible malformed token"
        );
        e
    })
}

// =============================================================================
// URL Builders
// =============================================================================

/// Build Keycloak logout URL
///
/// Keycloak requires either `client_id` or `id_token_hint` when using `post_logout_redirect_uri`.
/// We prefer `id_token_hint` when available and not expired, falling back to `client_id`.
pub fn build_keycloak_logout_url(
    keycloak_callback_url: &str,
    keycloak_realm: &str,
    portal_public_url: &str,
    client_id: &str,
    id_token: Option<&str>,
) -> String {
    let logout_callback_url = format!("{}/auth/logout/callback", portal_public_url);
    let post_logout_redirect = urlencoding::encode(&logout_callback_url);

    let valid_id_token = id_token
        .filter(|t| !t.trim().is_empty())
        .filter(|t| {
            if is_jwt_expired(t) {
                tracing::info!("id_token expired, using client_id for Keycloak logout");
                false
            } else {
                true
            }
        });

    if let Some(id_token) = valid_id_token {
        format!(
            "{}/realms/{}/protocol/openid-connect/logout?id_token_hint={}&post_logout_redirect_uri={}",
            keycloak_callback_url,
            keycloak_realm,
            urlencoding::encode(id_token),
            post_logout_redirect
        )
    } else {
        format!(
            "{}/realms/{}/protocol/openid-connect/logout?client_id={}&post_logout_redirect_uri={}",
            keycloak_callback_url,
            keycloak_realm,
            urlencoding::encode(client_id),
            post_logout_redirect
        )
    }
}

/// Keep a post-login redirect target on this origin
///
/// Only absolute paths are accepted; `//host`, `/\host` and full URLs fall back to
/// [`DEFAULT_CALLBACK_PATH`] so the login flow cannot be used as an open redirect.
pub fn sanitize_callback_path(candidate: Option<&str>) -> String {
    match candidate {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => DEFAULT_CALLBACK_PATH.to_string(),
    }
}

// =============================================================================
// Cookie Extraction
// =============================================================================

/// Extract a cookie value from headers
///
/// Handles multiple Cookie headers (some proxies fold/duplicate headers).
/// Uses `get_all` to collect all Cookie header values.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);

    for header_value in headers.get_all("cookie") {
        if let Ok(cookie_str) = header_value.to_str() {
            if let Some(value) = cookie_str
                .split(';')
                .map(|c| c.trim())
                .find(|c| c.starts_with(&prefix))
                .and_then(|c| c.strip_prefix(&prefix))
            {
                return Some(value.to_string());
            }
        }
    }
    None
}

// =============================================================================
// Tests
// =============================================================================
