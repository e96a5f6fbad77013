//! Route guard
//!
//! Evaluated once per request before any handler, from the current session only:
//!
//! 1. public prefix → allow
//! 2. no session → `/login?callbackUrl=<path>`
//! 3. session error → error page (organization problems) or login (anything else)
//! 4. tenant mismatch → `/auth/error?error=InvalidTenant`
//! 5. protected prefix without a matching role → `/unauthorized`
//! 6. allow

use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use super::cookie::{read_session, session_cookie_names, session_set_cookies};
use super::refresher::ensure_fresh;
use super::{unix_now, Session, SessionError};
use crate::auth::helpers::header_value;
use crate::tenant::{can_access_route, RouteTable};
use crate::AppState;

/// Error codes understood by the `/auth/error` and `/login` pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorCode {
    SessionExpired,
    InvalidTenant,
    WrongOrganization,
    NoOrganization,
    Configuration,
}

impl AuthErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorCode::SessionExpired => "SessionExpired",
            AuthErrorCode::InvalidTenant => "InvalidTenant",
            AuthErrorCode::WrongOrganization => "WrongOrganization",
            AuthErrorCode::NoOrganization => "NoOrganization",
            AuthErrorCode::Configuration => "Configuration",
        }
    }

    pub fn from_query(value: &str) -> Option<Self> {
        match value {
            "SessionExpired" => Some(AuthErrorCode::SessionExpired),
            "InvalidTenant" => Some(AuthErrorCode::InvalidTenant),
            "WrongOrganization" => Some(AuthErrorCode::WrongOrganization),
            "NoOrganization" => Some(AuthErrorCode::NoOrganization),
            "Configuration" => Some(AuthErrorCode::Configuration),
            _ => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AuthErrorCode::SessionExpired => "Your session has expired. Please sign in again.",
            AuthErrorCode::InvalidTenant => "You are not authorized to access this tenant.",
            AuthErrorCode::WrongOrganization => {
                "Your account belongs to a different organization. You cannot access this portal."
            }
            AuthErrorCode::NoOrganization => {
                "Your account is not associated with any organization. Please contact your \
                 administrator to add you to the correct organization as a managed member."
            }
            AuthErrorCode::Configuration => {
                "There is a problem with the authentication configuration."
            }
        }
    }

    /// Organization errors end the identity-provider session before signing in again
    pub fn requires_logout(&self) -> bool {
        matches!(
            self,
            AuthErrorCode::WrongOrganization | AuthErrorCode::NoOrganization
        )
    }

    pub fn error_page_url(&self) -> String {
        format!("/auth/error?error={}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

pub fn login_url(callback_path: &str) -> String {
    format!("/login?callbackUrl={}", urlencoding::encode(callback_path))
}

/// Decide what to do with a request; pure and deterministic
pub fn evaluate(
    path: &str,
    session: Option<&Session>,
    tenant_id: &str,
    routes: &RouteTable,
) -> GuardDecision {
    if routes.is_public(path) {
        return GuardDecision::Allow;
    }

    let Some(session) = session else {
        return GuardDecision::Redirect(login_url(path));
    };

    if let Some(error) = session.error {
        let target = match error {
            SessionError::InvalidOrganization => AuthErrorCode::WrongOrganization.error_page_url(),
            SessionError::NoOrganization => AuthErrorCode::NoOrganization.error_page_url(),
            SessionError::RefreshAccessTokenError => {
                format!("/login?error={}", AuthErrorCode::SessionExpired.as_str())
            }
        };
        return GuardDecision::Redirect(target);
    }

    if session.tenant_id.is_empty() || session.tenant_id != tenant_id {
        tracing::error!(
            event = "tenant_mismatch",
            session_tenant = %session.tenant_id,
            expected_tenant = %tenant_id,
            "Tenant validation failed"
        );
        return GuardDecision::Redirect(AuthErrorCode::InvalidTenant.error_page_url());
    }

    if let Some(route) = routes.protection_for(path) {
        if !can_access_route(&session.roles, &route.required_roles) {
            tracing::info!(
                event = "route_forbidden",
                sub = %session.subject,
                path = %path,
                prefix = %route.prefix,
                required_roles = ?route.required_roles,
                "Missing required role"
            );
            return GuardDecision::Redirect("/unauthorized".to_string());
        }
    }

    GuardDecision::Allow
}

/// Axum middleware applying [`evaluate`] to every request
///
/// Expired sessions are refreshed first; a changed session is re-sealed and written on
/// the response, whatever the decision. Allowed requests carry the session in their
/// extensions for the `CurrentSession` extractor.
pub async fn route_guard(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if state.routes.is_public(&path) {
        return next.run(request).await;
    }

    let existing_cookies = session_cookie_names(request.headers());
    let stored = read_session(request.headers(), &state.sealer);
    let mut set_cookies = Vec::new();

    let session = match stored {
        Some(session) => {
            let (session, changed) = ensure_fresh(
                session,
                &state.config,
                &state.jwt_validator,
                &state.refresher,
            )
            .await;
            if changed {
                match state.sealer.seal(&session, unix_now()) {
                    Ok(sealed) => {
                        set_cookies = session_set_cookies(
                            &state.config,
                            &sealed,
                            state.sealer.max_age_secs(),
                            &existing_cookies,
                        );
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to re-seal refreshed session"),
                }
            }
            Some(session)
        }
        None => None,
    };

    let decision = evaluate(
        &path,
        session.as_ref(),
        &state.config.tenant.id,
        &state.routes,
    );

    let mut response = match decision {
        GuardDecision::Allow => {
            if let Some(session) = session {
                request.extensions_mut().insert(session);
            }
            next.run(request).await
        }
        GuardDecision::Redirect(target) => {
            tracing::debug!(path = %path, redirect_to = %target, "Guard redirect");
            Redirect::to(&target).into_response()
        }
    };

    for line in set_cookies {
        if let Ok(value) = header_value(&line) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{session_with_roles, test_state};
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use proptest::prelude::*;
    use tower::ServiceExt;

    const TENANT: &str = "acme-corp";

    fn table() -> RouteTable {
        RouteTable::from_json(
            r#"{
                "publicRoutes": ["/login", "/auth/error"],
                "protectedRoutes": {
                    "/admin": ["x:admin"],
                    "/claims": ["x:claims:view"]
                }
            }"#,
        )
        .unwrap()
    }

    fn session(roles: &[&str]) -> Session {
        let mut s = session_with_roles(roles);
        s.tenant_id = TENANT.to_string();
        s
    }

    #[test]
    fn test_public_route_without_session_is_allowed() {
        assert_eq!(evaluate("/login", None, TENANT, &table()), GuardDecision::Allow);
        assert_eq!(
            evaluate("/auth/error?x", None, TENANT, &table()),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_missing_session_redirects_to_login_with_callback() {
        assert_eq!(
            evaluate("/claims/42", None, TENANT, &table()),
            GuardDecision::Redirect("/login?callbackUrl=%2Fclaims%2F42".to_string())
        );
    }

    #[test]
    fn test_missing_role_redirects_to_unauthorized() {
        let s = session(&["x:claims:view"]);
        assert_eq!(
            evaluate("/admin", Some(&s), TENANT, &table()),
            GuardDecision::Redirect("/unauthorized".to_string())
        );
    }

    #[test]
    fn test_matching_role_is_allowed() {
        let s = session(&["x:admin"]);
        assert_eq!(
            evaluate("/admin/users", Some(&s), TENANT, &table()),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_unprotected_path_is_allowed_without_roles() {
        let s = session(&[]);
        assert_eq!(
            evaluate("/dashboard", Some(&s), TENANT, &table()),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_tenant_mismatch_redirects_to_invalid_tenant() {
        let mut s = session(&["x:admin"]);
        s.tenant_id = "acme-corp".to_string();
        assert_eq!(
            evaluate("/dashboard", Some(&s), "beta-inc", &table()),
            GuardDecision::Redirect("/auth/error?error=InvalidTenant".to_string())
        );
    }

    #[test]
    fn test_empty_tenant_is_a_mismatch() {
        let mut s = session(&[]);
        s.tenant_id = String::new();
        assert_eq!(
            evaluate("/dashboard", Some(&s), "", &table()),
            GuardDecision::Redirect("/auth/error?error=InvalidTenant".to_string())
        );
    }

    #[test]
    fn test_session_errors_map_to_error_pages() {
        let mut s = session(&["x:admin"]);

        s.error = Some(SessionError::InvalidOrganization);
        assert_eq!(
            evaluate("/admin", Some(&s), TENANT, &table()),
            GuardDecision::Redirect("/auth/error?error=WrongOrganization".to_string())
        );

        s.error = Some(SessionError::NoOrganization);
        assert_eq!(
            evaluate("/admin", Some(&s), TENANT, &table()),
            GuardDecision::Redirect("/auth/error?error=NoOrganization".to_string())
        );

        s.error = Some(SessionError::RefreshAccessTokenError);
        assert_eq!(
            evaluate("/admin", Some(&s), TENANT, &table()),
            GuardDecision::Redirect("/login?error=SessionExpired".to_string())
        );
    }

    #[test]
    fn test_session_error_checked_before_tenant() {
        let mut s = session(&[]);
        s.error = Some(SessionError::NoOrganization);
        assert_eq!(
            evaluate("/dashboard", Some(&s), "beta-inc", &table()),
            GuardDecision::Redirect("/auth/error?error=NoOrganization".to_string())
        );
    }

    #[test]
    fn test_error_code_round_trip_and_messages() {
        for code in [
            AuthErrorCode::SessionExpired,
            AuthErrorCode::InvalidTenant,
            AuthErrorCode::WrongOrganization,
            AuthErrorCode::NoOrganization,
            AuthErrorCode::Configuration,
        ] {
            assert_eq!(AuthErrorCode::from_query(code.as_str()), Some(code));
            assert!(!code.message().is_empty());
        }
        assert_eq!(AuthErrorCode::from_query("Bogus"), None);
        assert!(AuthErrorCode::NoOrganization.requires_logout());
        assert!(!AuthErrorCode::SessionExpired.requires_logout());
    }

    fn role_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d"]), 0..4)
            .prop_map(|v| v.into_iter().map(str::to_string).collect())
    }

    proptest! {
        #[test]
        fn prop_access_iff_roles_intersect(user in role_strategy(), required in role_strategy()) {
            prop_assume!(!required.is_empty());
            let mut routes = table();
            routes.protected_routes[0].required_roles = required.clone();

            let user_refs: Vec<&str> = user.iter().map(String::as_str).collect();
            let s = session(&user_refs);
            let intersects = user.iter().any(|r| required.contains(r));

            let decision = evaluate("/admin", Some(&s), TENANT, &routes);
            prop_assert_eq!(decision == GuardDecision::Allow, intersects);
        }

        #[test]
        fn prop_foreign_tenant_never_allowed(user in role_strategy(), path in "/[a-z]{1,8}") {
            let user_refs: Vec<&str> = user.iter().map(String::as_str).collect();
            let mut s = session(&user_refs);
            s.tenant_id = "beta-inc".to_string();
            let routes = table();
            prop_assume!(!routes.is_public(&path));

            prop_assert_ne!(evaluate(&path, Some(&s), TENANT, &routes), GuardDecision::Allow);
        }

        #[test]
        fn prop_evaluation_is_idempotent(user in role_strategy(), path in "/[a-z]{0,8}") {
            let user_refs: Vec<&str> = user.iter().map(String::as_str).collect();
            let s = session(&user_refs);
            let routes = table();
            prop_assert_eq!(
                evaluate(&path, Some(&s), TENANT, &routes),
                evaluate(&path, Some(&s), TENANT, &routes)
            );
        }
    }

    // =========================================================================
    // Middleware
    // =========================================================================

    fn guarded_router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/login", get(|| async { "login" }))
            .route("/dashboard", get(|| async { "dashboard" }))
            .route("/admin", get(|| async { "admin" }))
            .layer(axum::middleware::from_fn_with_state(state.clone(), route_guard))
            .with_state(state)
    }

    fn request(path: &str, cookie: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_middleware_allows_public_route() {
        let app = guarded_router(test_state());
        let response = app.oneshot(request("/login", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_middleware_redirects_anonymous_request() {
        let app = guarded_router(test_state());
        let response = app.oneshot(request("/dashboard", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?callbackUrl=%2Fdashboard");
    }

    #[tokio::test]
    async fn test_middleware_enforces_roles() {
        let state = test_state();
        let mut s = session_with_roles(&["e-portal-acme:claims:view"]);
        s.tokens.expires_at = unix_now() + 600;
        let sealed = state.sealer.seal(&s, unix_now()).unwrap();
        let cookie = format!("portal_session={}", sealed);

        let app = guarded_router(state.clone());
        let response = app
            .clone()
            .oneshot(request("/admin", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/unauthorized");

        let response = app.oneshot(request("/dashboard", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_middleware_failed_refresh_redirects_and_rewrites_cookie() {
        // test_state points the token endpoint at an unreachable port
        let state = test_state();
        let mut s = session_with_roles(&["e-portal-acme:admin"]);
        s.tokens.expires_at = 0;
        s.tokens.refresh_token = Some("refresh-1".to_string());
        let sealed = state.sealer.seal(&s, unix_now()).unwrap();
        let cookie = format!("portal_session={}", sealed);

        let app = guarded_router(state.clone());
        let response = app.oneshot(request("/dashboard", Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?error=SessionExpired");

        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        let value = set_cookie
            .strip_prefix("portal_session=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();
        let stored = state.sealer.unseal(value).unwrap();
        assert_eq!(stored.error, Some(SessionError::RefreshAccessTokenError));
    }
}
