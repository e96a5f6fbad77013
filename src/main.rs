use anyhow::Result;
use std::sync::Arc;
use tenant_portal::{
    auth::jwt::JwtValidator,
    session::{SessionRefresher, SessionSealer},
    tenant, web, AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; deployments set the environment directly
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting tenant portal");

    // Load configuration from environment
    let config = tenant_portal::config::Config::load()?;
    tracing::info!(
        environment = ?config.environment,
        keycloak_realm = %config.keycloak_realm,
        tenant_id = %config.tenant.id,
        tenant_name = %config.tenant.name,
        features = ?config.tenant.features,
        "Configuration loaded"
    );

    // Initialize JWT validator with JWKS caching and issuer/audience validation
    let jwt_validator = Arc::new(
        JwtValidator::new(
            config.keycloak_url.clone(),          // Internal URL for JWKS fetching
            config.keycloak_callback_url.clone(), // Public URL for issuer validation
            config.keycloak_realm.clone(),
            config.token_audience.clone(),
            config.http_connect_timeout_secs,
            config.http_request_timeout_secs,
            config.jwks_cache_ttl_secs,
        )
        .map_err(|e| anyhow::anyhow!("Failed to initialize JWT validator: {}", e))?,
    );

    // Keycloak may still be starting; /readyz stays 503 until the keys are cached
    if let Err(e) = jwt_validator.prefetch_jwks().await {
        tracing::warn!(error = %e, "JWKS prefetch failed - keys will be fetched on first sign-in");
    } else {
        tracing::info!("JWKS prefetched successfully - readiness check will pass");
    }

    // Load and validate the route table (logs summary internally)
    let routes = tenant::load_route_table(&config.routes, &config.client_id)?;

    let sealer = SessionSealer::new(config.session_secret.as_bytes(), config.session_max_age_secs);
    let refresher = SessionRefresher::new(&config)?;

    // Create shared application state
    let bind_address = config.bind_address();
    let state = Arc::new(AppState {
        config: Arc::new(config),
        jwt_validator,
        routes: Arc::new(routes),
        sealer: Arc::new(sealer),
        refresher: Arc::new(refresher),
    });

    let app = web::create_router(state);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Tenant portal listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
