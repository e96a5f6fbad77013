//! Authentication handlers for sign-in, callback and logout flows
//!
//! - `signin_handler`: Initiates OAuth2 authorization code flow
//! - `callback_handler`: Handles OAuth2 callback, token exchange and session issuance
//! - `logout_handler`: Clears the portal session, then ends the Keycloak session
//! - `logout_callback_handler`: Landing page after Keycloak logout

use axum::{
    extract::{Query, State},
    http::{
        header::{ORIGIN, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Redirect, Response},
    Json,
};
use oauth2::{AuthorizationCode, CsrfToken, Scope};
use serde::Deserialize;
use std::sync::Arc;

use super::helpers::{
    build_keycloak_logout_url, create_http_client, extract_cookie, header_value,
    sanitize_callback_path,
};
use super::oidc::{create_oauth_client, token_set_from_response};
use crate::session::{
    cookie::{read_session, session_clear_cookies, session_cookie_names, session_set_cookies},
    unix_now, AuthErrorCode, SessionIssuer,
};
use crate::AppState;

const STATE_COOKIE: &str = "oauth_state";
const CALLBACK_COOKIE: &str = "oauth_callback";
/// Lifetime of the CSRF state and callback cookies (10 minutes)
const FLOW_COOKIE_MAX_AGE: u64 = 600;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SignInQuery {
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// =============================================================================
// Internal Helpers
// =============================================================================

fn flow_cookie(state: &AppState, name: &str, value: &str, max_age: u64) -> String {
    format!(
        "{}={}; HttpOnly; Path=/auth; Max-Age={}; SameSite=Lax{}{}",
        name,
        value,
        max_age,
        state.config.cookie_domain_attr(),
        state.config.cookie_secure_flag()
    )
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn configuration_error() -> Response {
    Redirect::to(&AuthErrorCode::Configuration.error_page_url()).into_response()
}

/// Append Set-Cookie lines; a line that is not a valid header value is skipped
fn append_cookies(response: &mut Response, lines: impl IntoIterator<Item = String>) {
    for line in lines {
        if let Ok(value) = header_value(&line) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Sign-in handler - initiates OAuth2 authorization code flow
///
/// `kc_idp_hint` carries the tenant id so Keycloak routes the user to the tenant's
/// organization login.
pub async fn signin_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SignInQuery>,
) -> Response {
    let oauth_client = match create_oauth_client(&state.config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create OAuth client");
            return configuration_error();
        }
    };

    let (auth_url, csrf_token) = oauth_client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("openid".to_string()))
        .add_scope(Scope::new("email".to_string()))
        .add_scope(Scope::new("profile".to_string()))
        .add_scope(Scope::new("organization".to_string()))
        .add_extra_param("kc_idp_hint", state.config.tenant.id.clone())
        .url();

    let callback_path = sanitize_callback_path(query.callback_url.as_deref());

    tracing::info!(
        event = "signin_start",
        keycloak_public_url = %state.config.keycloak_callback_url,
        realm = %state.config.keycloak_realm,
        tenant_id = %state.config.tenant.id,
        callback_path = %callback_path,
        "Redirecting to Keycloak for authentication"
    );

    let mut response = Redirect::to(auth_url.as_str()).into_response();
    append_cookies(
        &mut response,
        [
            flow_cookie(&state, STATE_COOKIE, csrf_token.secret(), FLOW_COOKIE_MAX_AGE),
            flow_cookie(
                &state,
                CALLBACK_COOKIE,
                &urlencoding::encode(&callback_path),
                FLOW_COOKIE_MAX_AGE,
            ),
        ],
    );
    response
}

/// Callback handler - validates CSRF state, exchanges the code and issues the session
///
/// A session flagged with an organization error is still written; the guard turns it
/// into the matching error page on the next request.
pub async fn callback_handler(
    Query(params): Query<CallbackParams>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    tracing::info!("OAuth callback received");

    if let Some(error) = params.error {
        tracing::warn!(
            error = %error,
            description = ?params.error_description,
            "OAuth authorization failed"
        );
        return json_error(StatusCode::UNAUTHORIZED, &error);
    }

    let Some(state_from_callback) = params.state else {
        tracing::warn!("CSRF validation failed: No state parameter in callback");
        return json_error(StatusCode::BAD_REQUEST, "Missing state parameter");
    };

    let Some(stored_state) = extract_cookie(&headers, STATE_COOKIE) else {
        tracing::warn!(
            has_cookie_header = headers.get("cookie").is_some(),
            "CSRF validation failed: No oauth_state cookie found"
        );
        return json_error(
            StatusCode::UNAUTHORIZED,
            "CSRF validation failed: missing state cookie",
        );
    };

    if state_from_callback != stored_state {
        tracing::warn!("CSRF validation failed: State mismatch (callback vs cookie)");
        return json_error(
            StatusCode::UNAUTHORIZED,
            "CSRF validation failed: state mismatch",
        );
    }

    let Some(code) = params.code else {
        tracing::warn!("No authorization code received");
        return json_error(StatusCode::BAD_REQUEST, "Missing authorization code");
    };

    let oauth_client = match create_oauth_client(&state.config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create OAuth client");
            return configuration_error();
        }
    };

    let http_client = match create_http_client(
        state.config.http_connect_timeout_secs,
        state.config.http_request_timeout_secs,
    ) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client for token exchange");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    tracing::info!("Exchanging authorization code for tokens");

    let token_response = match oauth_client
        .exchange_code(AuthorizationCode::new(code))
        .request_async(&http_client)
        .await
    {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "Failed to exchange code for tokens");
            return json_error(StatusCode::UNAUTHORIZED, "Token exchange failed");
        }
    };

    let now = unix_now();
    let tokens = token_set_from_response(&token_response, None, now);
    if tokens.id_token.is_none() {
        tracing::warn!("No id_token received from Keycloak - logout will fall back to client_id");
    }

    let issuer = SessionIssuer::new(&state.config.tenant, &state.config.client_id);
    let session = issuer.issue_verified(&state.jwt_validator, tokens).await;

    let sealed = match state.sealer.seal(&session, now) {
        Ok(sealed) => sealed,
        Err(e) => {
            tracing::error!(error = %e, "Failed to seal session");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    let callback_path = sanitize_callback_path(
        extract_cookie(&headers, CALLBACK_COOKIE)
            .and_then(|v| urlencoding::decode(&v).ok().map(|s| s.into_owned()))
            .as_deref(),
    );

    tracing::info!(
        event = "signin_complete",
        sub = %session.subject,
        session_error = ?session.error,
        redirect_to = %callback_path,
        "Authentication complete"
    );

    let mut response = Redirect::to(&callback_path).into_response();
    append_cookies(
        &mut response,
        session_set_cookies(
            &state.config,
            &sealed,
            state.sealer.max_age_secs(),
            &session_cookie_names(&headers),
        ),
    );
    append_cookies(
        &mut response,
        [
            flow_cookie(&state, STATE_COOKIE, "", 0),
            flow_cookie(&state, CALLBACK_COOKIE, "", 0),
        ],
    );
    response
}

/// Logout handler - clears the portal session, then ends the Keycloak session
///
/// Served for POST only. A request whose `Origin` is not the portal itself is refused,
/// so another site cannot sign users out. Without a portal session the user goes
/// straight back to the login page. A missing or expired id_token falls back to
/// `client_id` on the end-session URL.
pub async fn logout_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(origin) = headers.get(ORIGIN) {
        if origin.to_str().ok() != Some(state.config.portal_public_url.as_str()) {
            tracing::warn!(
                event = "logout_cross_origin",
                origin = ?origin,
                "Refusing logout from foreign origin"
            );
            return json_error(StatusCode::FORBIDDEN, "Cross-origin logout refused");
        }
    }

    let session = read_session(&headers, &state.sealer);

    let redirect_target = match session.as_ref() {
        None => {
            tracing::info!(event = "logout_local_only", "No session; redirecting to login");
            "/login".to_string()
        }
        Some(session) => {
            // Do not log the URL, it carries the id_token_hint
            tracing::info!(
                event = "keycloak_logout_redirect",
                sub = %session.subject,
                has_id_token = session.tokens.id_token.is_some(),
                keycloak_realm = %state.config.keycloak_realm,
                "Redirecting to Keycloak end-session"
            );
            build_keycloak_logout_url(
                &state.config.keycloak_callback_url,
                &state.config.keycloak_realm,
                &state.config.portal_public_url,
                &state.config.client_id,
                session.tokens.id_token.as_deref(),
            )
        }
    };

    let mut response = Redirect::to(&redirect_target).into_response();
    append_cookies(
        &mut response,
        session_clear_cookies(&state.config, &session_cookie_names(&headers)),
    );
    append_cookies(&mut response, [flow_cookie(&state, STATE_COOKIE, "", 0)]);

    tracing::info!(event = "portal_session_cleared", "Cleared portal session cookies");
    response
}

/// Logout callback handler - landing spot after Keycloak logout
pub async fn logout_callback_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    tracing::info!(event = "logout_complete", redirect_to = "/login", "Logout complete");

    let mut response = Redirect::to("/login").into_response();
    append_cookies(
        &mut response,
        session_clear_cookies(&state.config, &session_cookie_names(&headers)),
    );
    response
}
