use std::env;

use crate::tenant::{FeatureFlags, TenantConfig};

/// Minimum length of `SESSION_SECRET` in bytes (HS256 key)
const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

/// Source for the route table override
#[derive(Debug, Clone, PartialEq)]
pub enum RouteTableSource {
    /// Built from the client id (see `RouteTable::default_for_client`)
    Default,
    /// Table provided as JSON string via PORTAL_ROUTES_JSON env var
    Json(String),
    /// Table loaded from file path via PORTAL_ROUTES_PATH env var
    File(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    // Environment configuration
    pub environment: Environment,

    // Server configuration
    pub server_host: String,
    pub server_port: u16,

    // Portal public URL (for logout redirects)
    pub portal_public_url: String,

    // Keycloak configuration
    pub keycloak_url: String, // Internal URL for server-to-server (http://keycloak:8080)
    pub keycloak_callback_url: String, // Public URL for browser redirects and issuer
    pub keycloak_realm: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,

    /// Expected `aud` claim; audience is not checked when unset
    pub token_audience: Option<String>,

    // Deployment tenant
    pub tenant: TenantConfig,

    // Session cookie configuration
    pub session_secret: String,
    pub session_max_age_secs: u64,

    // Cookie configuration (None = host-only cookie, Some = domain cookie)
    pub cookie_domain: Option<String>,

    // HTTP client timeout configuration (in seconds)
    pub http_connect_timeout_secs: u64,
    pub http_request_timeout_secs: u64,

    // JWKS cache configuration (in seconds)
    pub jwks_cache_ttl_secs: u64,

    pub routes: RouteTableSource,
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", name))
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

/// Derive the portal origin from the redirect URI by stripping the path
/// e.g., http://portal.localhost/auth/callback -> http://portal.localhost
pub fn derive_public_url(redirect_uri: &str) -> String {
    match url::Url::parse(redirect_uri).map(|u| u.origin()) {
        Ok(origin) if origin.is_tuple() => origin.ascii_serialization(),
        _ => redirect_uri.trim_end_matches('/').to_string(),
    }
}

impl Config {
    /// Load configuration from environment variables using std::env::var
    pub fn load() -> anyhow::Result<Self> {
        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let keycloak_url = required("KEYCLOAK_URL")?;
        let keycloak_callback_url = required("KEYCLOAK_CALLBACK_URL")?;
        let keycloak_realm = required("KEYCLOAK_REALM")?;
        let client_id = required("CLIENT_ID")?;
        let client_secret = required("CLIENT_SECRET")?;
        let redirect_uri = required("REDIRECT_URI")?;
        let tenant_id = required("TENANT_ID")?;

        let session_secret = required("SESSION_SECRET")?;
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            anyhow::bail!(
                "SESSION_SECRET must be at least {} bytes long",
                MIN_SESSION_SECRET_LEN
            );
        }

        let portal_public_url = env::var("PORTAL_PUBLIC_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| derive_public_url(&redirect_uri))
            .trim_end_matches('/')
            .to_string();

        let features = match env::var("TENANT_FEATURES") {
            Ok(list) => FeatureFlags::parse(&list)?,
            Err(_) => FeatureFlags::all(),
        };

        let tenant = TenantConfig {
            name: env::var("TENANT_NAME").unwrap_or_else(|_| format!("{} Portal", tenant_id)),
            domain: env::var("TENANT_DOMAIN").ok().filter(|s| !s.is_empty()),
            logo: env::var("TENANT_LOGO")
                .unwrap_or_else(|_| format!("/static/logos/{}.png", tenant_id)),
            features,
            id: tenant_id,
        };

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = parse_or("SERVER_PORT", 3000u16);

        let cookie_domain = env::var("COOKIE_DOMAIN").ok().filter(|s| !s.is_empty());
        let token_audience = env::var("TOKEN_AUDIENCE").ok().filter(|s| !s.is_empty());

        let routes = if let Ok(json) = env::var("PORTAL_ROUTES_JSON") {
            RouteTableSource::Json(json)
        } else if let Ok(path) = env::var("PORTAL_ROUTES_PATH") {
            RouteTableSource::File(path)
        } else {
            RouteTableSource::Default
        };

        Ok(Config {
            environment,
            server_host,
            server_port,
            portal_public_url,
            keycloak_url: keycloak_url.trim_end_matches('/').to_string(),
            keycloak_callback_url: keycloak_callback_url.trim_end_matches('/').to_string(),
            keycloak_realm,
            client_id,
            client_secret,
            redirect_uri,
            token_audience,
            tenant,
            session_secret,
            session_max_age_secs: parse_or("SESSION_MAX_AGE_SECS", 30 * 60),
            cookie_domain,
            http_connect_timeout_secs: parse_or("HTTP_CONNECT_TIMEOUT_SECS", 10),
            http_request_timeout_secs: parse_or("HTTP_REQUEST_TIMEOUT_SECS", 30),
            jwks_cache_ttl_secs: parse_or("JWKS_CACHE_TTL_SECS", 3600),
            routes,
        })
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get cookie security flags based on environment
    pub fn cookie_secure_flag(&self) -> &str {
        if self.is_production() {
            "; Secure"
        } else {
            ""
        }
    }

    /// Get cookie domain attribute string (empty if host-only cookie)
    pub fn cookie_domain_attr(&self) -> String {
        match &self.cookie_domain {
            Some(domain) => format!("; Domain={}", domain),
            None => String::new(),
        }
    }

    /// Realm base URL used for server-to-server calls
    pub fn realm_internal_url(&self) -> String {
        format!("{}/realms/{}", self.keycloak_url, self.keycloak_realm)
    }

    /// Get bind address for server
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
