use super::handlers::{
    admin_handler, auth_error_handler, claims_handler, dashboard_handler, healthz_handler,
    login_handler, readyz_handler, reports_handler, root_handler, unauthorized_handler,
};
use crate::{
    auth::{callback_handler, logout_callback_handler, logout_handler, signin_handler},
    session::route_guard,
    AppState,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Build the application router
///
/// The route guard wraps every route, including `/static`; public prefixes pass
/// straight through it.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route("/login", get(login_handler))
        .route("/unauthorized", get(unauthorized_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/admin", get(admin_handler))
        .route("/claims", get(claims_handler))
        .route("/reports", get(reports_handler))
        .route("/auth/signin", get(signin_handler))
        .route("/auth/callback", get(callback_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/logout/callback", get(logout_callback_handler))
        .route("/auth/error", get(auth_error_handler))
        .nest_service("/static", ServeDir::new("static"))
        .layer(middleware::from_fn_with_state(state.clone(), route_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
