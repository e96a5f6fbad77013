pub mod authz;
pub mod models;
pub mod routes;

pub use authz::{can_access_route, RoleSet};
pub use models::{FeatureFlags, RoleCatalog, TenantConfig};
pub use routes::{ProtectedRoute, RouteTable, RouteTableError, DEFAULT_PUBLIC_ROUTES};

use anyhow::Context;

use crate::config::RouteTableSource;

/// Load and validate the route table from the configured source
///
/// Falls back to the per-client default table when no override is configured.
pub fn load_route_table(source: &RouteTableSource, client_id: &str) -> anyhow::Result<RouteTable> {
    let (table, origin) = match source {
        RouteTableSource::Default => (RouteTable::default_for_client(client_id), "default"),
        RouteTableSource::Json(json) => (RouteTable::from_json(json)?, "env-json"),
        RouteTableSource::File(path) => (RouteTable::from_file(path)?, "file"),
    };

    table
        .validate()
        .inspect_err(|error| {
            tracing::error!(source = origin, error = %error, "Route table validation failed")
        })
        .with_context(|| format!("Route table validation failed ({})", origin))?;

    tracing::info!(
        source = origin,
        public_routes = ?table.public_routes,
        protected_routes = table.protected_routes.len(),
        "Route table loaded"
    );

    Ok(table)
}
