use askama::Template;

/// Navigation entry shown in the page header
#[derive(Debug, Clone, PartialEq)]
pub struct NavLink {
    pub href: &'static str,
    pub label: &'static str,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub tenant_name: String,
    pub logo_url: String,
    pub signin_url: String,
    pub error_message: Option<String>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub tenant_name: String,
    pub logo_url: String,
    pub display_name: String,
    pub email: Option<String>,
    pub organization: Option<String>,
    pub roles: Vec<String>,
    pub nav: Vec<NavLink>,
}

#[derive(Template)]
#[template(path = "admin.html")]
pub struct AdminTemplate {
    pub tenant_name: String,
    pub logo_url: String,
    pub display_name: String,
    pub tenant_id: String,
    pub tenant_domain: Option<String>,
    pub nav: Vec<NavLink>,
}

/// Shared page for the claims and reports modules
#[derive(Template)]
#[template(path = "module.html")]
pub struct ModuleTemplate {
    pub tenant_name: String,
    pub logo_url: String,
    pub display_name: String,
    pub title: &'static str,
    /// Actions the user may perform in this module
    pub actions: Vec<&'static str>,
    pub nav: Vec<NavLink>,
}

#[derive(Template)]
#[template(path = "unauthorized.html")]
pub struct UnauthorizedTemplate {
    pub tenant_name: String,
    pub logo_url: String,
}

#[derive(Template)]
#[template(path = "auth_error.html")]
pub struct AuthErrorTemplate {
    pub tenant_name: String,
    pub logo_url: String,
    pub code: String,
    pub message: String,
    /// "Back to sign in" posts to `/auth/logout` instead of linking to `/login`
    pub requires_logout: bool,
}
