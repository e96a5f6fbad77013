use crate::session::Session;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;

/// Custom authentication error type
///
/// The portal serves HTML, so authentication problems become redirects to the
/// matching page rather than JSON bodies.
#[derive(Debug)]
pub enum AuthError {
    Unauthenticated(String),
    Forbidden(String),
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Unauthenticated(msg) => {
                tracing::debug!(reason = %msg, "Unauthenticated request");
                Redirect::to("/login").into_response()
            }

            AuthError::Forbidden(msg) => {
                tracing::info!(reason = %msg, "Forbidden request");
                Redirect::to("/unauthorized").into_response()
            }

            AuthError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error",
                    "message": msg
                })),
            )
                .into_response(),
        }
    }
}

/// Session admitted by the route guard
///
/// The guard stores the session in the request extensions once it has allowed the
/// request; handlers behind a public prefix never see one.
///
/// Usage:
/// ```rust,ignore
/// async fn handler(CurrentSession(session): CurrentSession) {
///     println!("User: {}, Roles: {:?}", session.subject, session.roles);
/// }
/// ```
pub struct CurrentSession(pub Session);

impl CurrentSession {
    /// Fail with [`AuthError::Forbidden`] unless the session holds `role`
    pub fn require_role(&self, role: &str) -> Result<&Session, AuthError> {
        if self.0.has_role(role) {
            Ok(&self.0)
        } else {
            Err(AuthError::Forbidden(format!("Missing required role: {}", role)))
        }
    }
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AuthError::Unauthenticated("No session on request".to_string()))?;

        tracing::debug!(
            user = %session.subject,
            roles = ?session.roles,
            "Session extracted"
        );

        Ok(CurrentSession(session))
    }
}
