use serde::Deserialize;

use super::models::RoleCatalog;

/// Public prefixes used when no route table override is configured
pub const DEFAULT_PUBLIC_ROUTES: &[&str] = &["/login", "/auth/", "/healthz", "/readyz", "/static/"];

/// A path prefix together with the roles that may enter it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRoute {
    pub prefix: String,
    pub required_roles: Vec<String>,
}

/// Per-deployment route table
///
/// Public prefixes bypass authentication entirely. Protected prefixes restrict access
/// to holders of at least one listed role; a path under no protected prefix is open to
/// any authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    pub public_routes: Vec<String>,
    pub protected_routes: Vec<ProtectedRoute>,
}

/// Validation error for a route table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteTableError {
    #[error("invalid route table JSON: {0}")]
    Parse(String),
    #[error("failed to read route table: {0}")]
    Io(String),
    #[error("route prefix '{0}' must start with '/'")]
    InvalidPrefix(String),
    #[error("protected route '{0}' has no required roles")]
    MissingRoles(String),
    #[error("protected route '{protected}' is shadowed by public prefix '{public}'")]
    ShadowedByPublic { protected: String, public: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RouteTableFile {
    #[serde(default)]
    public_routes: Option<Vec<String>>,
    /// Object keys keep document order (serde_json `preserve_order`)
    #[serde(default)]
    protected_routes: serde_json::Map<String, serde_json::Value>,
}

impl RouteTable {
    /// Default table for a client: `/admin`, `/claims` and `/reports` restricted
    pub fn default_for_client(client_id: &str) -> Self {
        let roles = RoleCatalog::for_client(client_id);
        RouteTable {
            public_routes: DEFAULT_PUBLIC_ROUTES.iter().map(|s| s.to_string()).collect(),
            protected_routes: vec![
                ProtectedRoute {
                    prefix: "/admin".to_string(),
                    required_roles: vec![roles.app_admin],
                },
                ProtectedRoute {
                    prefix: "/claims".to_string(),
                    required_roles: vec![roles.claims_view],
                },
                ProtectedRoute {
                    prefix: "/reports".to_string(),
                    required_roles: vec![roles.reports_view],
                },
            ],
        }
    }

    /// Parse a route table from JSON
    ///
    /// `publicRoutes` falls back to [`DEFAULT_PUBLIC_ROUTES`] when omitted.
    pub fn from_json(json: &str) -> Result<Self, RouteTableError> {
        let file: RouteTableFile =
            serde_json::from_str(json).map_err(|e| RouteTableError::Parse(e.to_string()))?;

        let mut protected_routes = Vec::with_capacity(file.protected_routes.len());
        for (prefix, roles) in file.protected_routes {
            let required_roles: Vec<String> = serde_json::from_value(roles)
                .map_err(|e| RouteTableError::Parse(format!("{}: {}", prefix, e)))?;
            protected_routes.push(ProtectedRoute {
                prefix,
                required_roles,
            });
        }

        Ok(RouteTable {
            public_routes: file.public_routes.unwrap_or_else(|| {
                DEFAULT_PUBLIC_ROUTES.iter().map(|s| s.to_string()).collect()
            }),
            protected_routes,
        })
    }

    pub fn from_file(path: &str) -> Result<Self, RouteTableError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| RouteTableError::Io(format!("{}: {}", path, e)))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), RouteTableError> {
        for prefix in &self.public_routes {
            if !prefix.starts_with('/') {
                return Err(RouteTableError::InvalidPrefix(prefix.clone()));
            }
        }

        for route in &self.protected_routes {
            if !route.prefix.starts_with('/') {
                return Err(RouteTableError::InvalidPrefix(route.prefix.clone()));
            }
            if route.required_roles.iter().all(|r| r.trim().is_empty()) {
                return Err(RouteTableError::MissingRoles(route.prefix.clone()));
            }
            // Public prefixes are checked first, so a covering one disables the route
            if let Some(public) = self
                .public_routes
                .iter()
                .find(|p| route.prefix.starts_with(p.as_str()))
            {
                return Err(RouteTableError::ShadowedByPublic {
                    protected: route.prefix.clone(),
                    public: public.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_routes.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// First protected route whose prefix matches the path
    pub fn protection_for(&self, path: &str) -> Option<&ProtectedRoute> {
        self.protected_routes
            .iter()
            .find(|r| path.starts_with(r.prefix.as_str()))
    }
}
