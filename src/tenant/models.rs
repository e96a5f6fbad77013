use serde::Serialize;

/// Tenant configuration for one deployment
///
/// Built once at startup and never mutated; shared through `AppState`.
#[derive(Debug, Clone, Serialize)]
pub struct TenantConfig {
    /// Tenant identifier, also the expected organization claim
    pub id: String,
    /// Display name shown in navigation and page titles
    pub name: String,
    /// Optional e-mail domain of the tenant
    pub domain: Option<String>,
    /// Browser-visible logo path
    pub logo: String,
    pub features: FeatureFlags,
}

/// Portal modules enabled for a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureFlags {
    pub claims: bool,
    pub reports: bool,
    pub administration: bool,
}

impl FeatureFlags {
    pub fn all() -> Self {
        FeatureFlags {
            claims: true,
            reports: true,
            administration: true,
        }
    }

    /// Parse a comma separated feature list, e.g. `claims,reports`
    ///
    /// An empty list disables every module. Unknown names are rejected so a typo
    /// in a deployment file does not silently hide a module.
    pub fn parse(list: &str) -> anyhow::Result<Self> {
        let mut flags = FeatureFlags {
            claims: false,
            reports: false,
            administration: false,
        };

        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name.to_lowercase().as_str() {
                "claims" => flags.claims = true,
                "reports" => flags.reports = true,
                "administration" | "admin" => flags.administration = true,
                other => anyhow::bail!("Unknown tenant feature '{}'", other),
            }
        }

        Ok(flags)
    }
}

/// Role names of a client application, `<client>:<module>:<action>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCatalog {
    pub app_access: String,
    pub app_admin: String,
    pub claims_view: String,
    pub claims_create: String,
    pub claims_update: String,
    pub claims_delete: String,
    pub claims_submit: String,
    pub reports_view: String,
    pub reports_export: String,
}

impl RoleCatalog {
    pub fn for_client(client_id: &str) -> Self {
        let role = |suffix: &str| format!("{}:{}", client_id, suffix);
        RoleCatalog {
            app_access: role("access"),
            app_admin: role("admin"),
            claims_view: role("claims:view"),
            claims_create: role("claims:create"),
            claims_update: role("claims:update"),
            claims_delete: role("claims:delete"),
            claims_submit: role("claims:submit"),
            reports_view: role("reports:view"),
            reports_export: role("reports:export"),
        }
    }
}
