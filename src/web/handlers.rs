use super::templates::{
    AdminTemplate, AuthErrorTemplate, DashboardTemplate, LoginTemplate, ModuleTemplate, NavLink,
    UnauthorizedTemplate,
};
use crate::{
    auth::{helpers::sanitize_callback_path, CurrentSession},
    session::{AuthErrorCode, Session},
    tenant::{RoleCatalog, TenantConfig},
    AppState,
};
use askama::Template;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorQuery {
    pub error: Option<String>,
}

fn render<T: Template>(template: T) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

/// Links to the modules this session may open
fn nav_links(tenant: &TenantConfig, roles: &RoleCatalog, session: &Session) -> Vec<NavLink> {
    let mut nav = vec![NavLink {
        href: "/dashboard",
        label: "Dashboard",
    }];
    if tenant.features.claims && session.has_role(&roles.claims_view) {
        nav.push(NavLink {
            href: "/claims",
            label: "Claims",
        });
    }
    if tenant.features.reports && session.has_role(&roles.reports_view) {
        nav.push(NavLink {
            href: "/reports",
            label: "Reports",
        });
    }
    if tenant.features.administration && session.has_role(&roles.app_admin) {
        nav.push(NavLink {
            href: "/admin",
            label: "Administration",
        });
    }
    nav
}

/// Liveness check - always returns OK if the process is running
pub async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness check - verifies if the service is ready to handle requests
///
/// Returns 200 OK once the JWKS cache has been populated (Keycloak is reachable),
/// 503 Service Unavailable otherwise.
pub async fn readyz_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let jwks_cached = state.jwt_validator.is_jwks_cached().await;

    if jwks_cached {
        (StatusCode::OK, "ready")
    } else {
        tracing::warn!("Readiness check failed: JWKS not cached");
        (StatusCode::SERVICE_UNAVAILABLE, "not ready: JWKS not cached")
    }
}

pub async fn root_handler() -> Redirect {
    Redirect::to("/dashboard")
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
) -> Response {
    let callback_path = sanitize_callback_path(query.callback_url.as_deref());
    let error_message = query.error.as_deref().map(|code| {
        AuthErrorCode::from_query(code)
            .map(|c| c.message().to_string())
            .unwrap_or_else(|| "Sign-in failed. Please try again.".to_string())
    });

    render(LoginTemplate {
        tenant_name: state.config.tenant.name.clone(),
        logo_url: state.config.tenant.logo.clone(),
        signin_url: format!(
            "/auth/signin?callbackUrl={}",
            urlencoding::encode(&callback_path)
        ),
        error_message,
    })
}

pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
) -> Response {
    let roles = RoleCatalog::for_client(&state.config.client_id);

    tracing::debug!(
        sub = %session.subject,
        roles = session.roles.len(),
        "Rendering dashboard"
    );

    render(DashboardTemplate {
        tenant_name: state.config.tenant.name.clone(),
        logo_url: state.config.tenant.logo.clone(),
        display_name: session.display_name().to_string(),
        email: session.email.clone(),
        organization: session.organization.clone(),
        roles: session.roles.iter().map(str::to_string).collect(),
        nav: nav_links(&state.config.tenant, &roles, &session),
    })
}

/// Administration page; the admin role is checked here as well as by the guard
pub async fn admin_handler(
    State(state): State<Arc<AppState>>,
    current: CurrentSession,
) -> Response {
    let tenant = &state.config.tenant;
    if !tenant.features.administration {
        return StatusCode::NOT_FOUND.into_response();
    }

    let roles = RoleCatalog::for_client(&state.config.client_id);
    let session = match current.require_role(&roles.app_admin) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };

    render(AdminTemplate {
        tenant_name: tenant.name.clone(),
        logo_url: tenant.logo.clone(),
        display_name: session.display_name().to_string(),
        tenant_id: tenant.id.clone(),
        tenant_domain: tenant.domain.clone(),
        nav: nav_links(tenant, &roles, session),
    })
}

pub async fn claims_handler(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
) -> Response {
    let tenant = &state.config.tenant;
    if !tenant.features.claims {
        return StatusCode::NOT_FOUND.into_response();
    }

    let roles = RoleCatalog::for_client(&state.config.client_id);
    let actions = [
        (&roles.claims_create, "Create"),
        (&roles.claims_update, "Update"),
        (&roles.claims_delete, "Delete"),
        (&roles.claims_submit, "Submit"),
    ]
    .into_iter()
    .filter(|(role, _)| session.has_role(role))
    .map(|(_, label)| label)
    .collect();

    render(ModuleTemplate {
        tenant_name: tenant.name.clone(),
        logo_url: tenant.logo.clone(),
        display_name: session.display_name().to_string(),
        title: "Claims",
        actions,
        nav: nav_links(tenant, &roles, &session),
    })
}

pub async fn reports_handler(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
) -> Response {
    let tenant = &state.config.tenant;
    if !tenant.features.reports {
        return StatusCode::NOT_FOUND.into_response();
    }

    let roles = RoleCatalog::for_client(&state.config.client_id);
    let actions = if session.has_role(&roles.reports_export) {
        vec!["Export"]
    } else {
        Vec::new()
    };

    render(ModuleTemplate {
        tenant_name: tenant.name.clone(),
        logo_url: tenant.logo.clone(),
        display_name: session.display_name().to_string(),
        title: "Reports",
        actions,
        nav: nav_links(tenant, &roles, &session),
    })
}

pub async fn unauthorized_handler(State(state): State<Arc<AppState>>) -> Response {
    let mut response = render(UnauthorizedTemplate {
        tenant_name: state.config.tenant.name.clone(),
        logo_url: state.config.tenant.logo.clone(),
    });
    if response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::FORBIDDEN;
    }
    response
}

/// Authentication error page
///
/// Organization errors send the user through `/auth/logout` so the Keycloak session
/// ends before the next sign-in attempt.
pub async fn auth_error_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ErrorQuery>,
) -> Response {
    let code = query
        .error
        .as_deref()
        .and_then(AuthErrorCode::from_query)
        .unwrap_or(AuthErrorCode::Configuration);

    tracing::info!(event = "auth_error_page", code = code.as_str(), "Rendering auth error");

    render(AuthErrorTemplate {
        tenant_name: state.config.tenant.name.clone(),
        logo_url: state.config.tenant.logo.clone(),
        code: code.as_str().to_string(),
        message: code.message().to_string(),
        requires_logout: code.requires_logout(),
    })
}
