use anyhow::{Context, Result};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::claims::Claims;

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    #[serde(default)]
    kty: Option<String>,
    #[serde(default, rename = "use")]
    key_use: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

struct JwksCache {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

/// Verifies Keycloak access tokens (RS256 with JWKS) before their claims are used
pub struct JwtValidator {
    keycloak_internal_url: String,
    realm: String,
    /// Expected issuer URL (Keycloak public URL + realm path)
    expected_issuer: String,
    /// Expected audience; Keycloak access tokens carry `account` unless a mapper adds the client
    expected_audience: Option<String>,
    client: reqwest::Client,
    jwks_cache: RwLock<Option<JwksCache>>,
    cache_ttl: Duration,
}

impl JwtValidator {
    /// Create Keycloak JWT validator
    ///
    /// # Arguments
    /// * `keycloak_internal_url` - Internal URL for JWKS fetching (container-to-container)
    /// * `keycloak_public_url` - Public URL for issuer validation (what browser sees)
    /// * `realm` - Keycloak realm name
    /// * `expected_audience` - Expected audience claim, if any
    /// * `connect_timeout_secs` - HTTP connect timeout
    /// * `request_timeout_secs` - HTTP request timeout
    /// * `jwks_cache_ttl_secs` - JWKS cache TTL
    pub fn new(
        keycloak_internal_url: String,
        keycloak_public_url: String,
        realm: String,
        expected_audience: Option<String>,
        connect_timeout_secs: u64,
        request_timeout_secs: u64,
        jwks_cache_ttl_secs: u64,
    ) -> Result<Self, String> {
        // Normalize URLs by trimming trailing slashes to prevent double-slash issues
        let keycloak_internal_url = keycloak_internal_url.trim_end_matches('/').to_string();
        let keycloak_public_url = keycloak_public_url.trim_end_matches('/');

        let expected_issuer = format!("{}/realms/{}", keycloak_public_url, realm);

        tracing::info!(
            keycloak_internal_url = %keycloak_internal_url,
            expected_issuer = %expected_issuer,
            expected_audience = ?expected_audience,
            jwks_cache_ttl_secs = jwks_cache_ttl_secs,
            "JWT validator initialized"
        );

        let client = reqwest::ClientBuilder::new()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .map_err(|e| format!("Failed to build HTTP client for JWKS: {}", e))?;

        Ok(Self {
            keycloak_internal_url,
            realm,
            expected_issuer,
            expected_audience,
            client,
            jwks_cache: RwLock::new(None),
            cache_ttl: Duration::from_secs(jwks_cache_ttl_secs),
        })
    }

    pub fn expected_issuer(&self) -> &str {
        &self.expected_issuer
    }

    /// Verify signature, expiry, issuer (and audience when configured) and return the claims
    pub async fn validate_async(&self, token: &str) -> Result<Claims> {
        tracing::debug!(token_len = token.len(), "Validating JWT token (async)");

        let header = decode_header(token).context("Invalid token header")?;
        let kid = header.kid.context("Token missing kid")?;

        let decoding_key = match self.get_cached_key(&kid).await? {
            Some(key) => key,
            None => {
                // Key rotation: refresh once and try again
                tracing::warn!(kid = %kid, "Key ID not found in cache, forcing JWKS refresh");
                self.refresh_jwks().await?;

                match self.get_cached_key(&kid).await? {
                    Some(key) => key,
                    None => {
                        let cache = self.jwks_cache.read().await;
                        let available_kids: Vec<_> = cache
                            .as_ref()
                            .map(|c| c.keys.keys().collect())
                            .unwrap_or_default();
                        tracing::error!(
                            kid = %kid,
                            available_kids = ?available_kids,
                            "Unknown key ID - kid not found in JWKS even after refresh"
                        );
                        anyhow::bail!("Unknown key ID: {}", kid);
                    }
                }
            }
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.set_issuer(&[&self.expected_issuer]);
        match &self.expected_audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let token_data = match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => data,
            Err(e) => {
                // Never log the token itself
                let token_hash = format!("{:x}", md5::compute(token));
                tracing::error!(
                    error = ?e,
                    kid = %kid,
                    alg = ?header.alg,
                    token_hash = %token_hash,
                    token_len = token.len(),
                    "JWT decode/validation failed"
                );
                anyhow::bail!("Token validation failed: {}", e);
            }
        };

        tracing::debug!(
            sub = %token_data.claims.sub,
            username = ?token_data.claims.preferred_username,
            "Token validated successfully"
        );

        Ok(token_data.claims)
    }

    /// Check if JWKS is cached (for health checks)
    pub async fn is_jwks_cached(&self) -> bool {
        self.jwks_cache.read().await.is_some()
    }

    /// Prefetch JWKS at startup so readiness checks pass immediately
    pub async fn prefetch_jwks(&self) -> Result<()> {
        tracing::info!("Prefetching JWKS at startup for readiness");
        self.refresh_jwks().await
    }

    /// Get cached key if available and not expired
    async fn get_cached_key(&self, kid: &str) -> Result<Option<DecodingKey>> {
        {
            let cache = self.jwks_cache.read().await;

            if let Some(jwks_cache) = cache.as_ref() {
                if jwks_cache.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(jwks_cache.keys.get(kid).cloned());
                }
                tracing::info!(
                    elapsed_secs = jwks_cache.fetched_at.elapsed().as_secs(),
                    ttl_secs = self.cache_ttl.as_secs(),
                    "JWKS cache expired, will refresh"
                );
            }
        } // Lock is dropped here

        self.refresh_jwks().await?;

        let cache = self.jwks_cache.read().await;
        Ok(cache.as_ref().and_then(|c| c.keys.get(kid).cloned()))
    }

    /// Refresh JWKS cache from Keycloak
    async fn refresh_jwks(&self) -> Result<()> {
        let url = format!(
            "{}/realms/{}/protocol/openid-connect/certs",
            self.keycloak_internal_url, self.realm
        );

        tracing::info!(url = %url, "Fetching JWKS from Keycloak");

        let response: JwksResponse = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch JWKS")?
            .error_for_status()
            .context("JWKS endpoint returned an error status")?
            .json()
            .await
            .context("Failed to parse JWKS")?;

        let mut keys = HashMap::new();
        for jwk in response.keys {
            // Realms also publish encryption keys; only RSA signing keys are usable here
            if jwk.kty.as_deref().is_some_and(|k| k != "RSA")
                || jwk.key_use.as_deref().is_some_and(|u| u != "sig")
            {
                tracing::debug!(kid = %jwk.kid, "Skipping non-signing JWK");
                continue;
            }
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                continue;
            };
            let key = DecodingKey::from_rsa_components(n, e)
                .context("Failed to create decoding key")?;
            tracing::debug!(kid = %jwk.kid, "Added key to cache");
            keys.insert(jwk.kid, key);
        }

        tracing::info!(key_count = keys.len(), "JWKS fetched successfully");

        let mut cache = self.jwks_cache.write().await;
        *cache = Some(JwksCache {
            keys,
            fetched_at: Instant::now(),
        });

        Ok(())
    }
}
