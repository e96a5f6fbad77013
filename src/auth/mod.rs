//! Authentication module
//!
//! This module provides OAuth2/OIDC authentication against the tenant's Keycloak realm.
//!
//! ## Structure
//!
//! - `claims`: Token claims and organization/role extraction
//! - `extractors`: Axum extractor for the session admitted by the route guard
//! - `jwt`: JWT validation and JWKS caching
//! - `oidc`: OAuth2 client and token response conversion
//! - `helpers`: Pure helper functions (URL builders, cookie extraction)
//! - `handlers`: HTTP handlers for sign-in, callback and logout flows
//!
//! ## Authentication Flow
//!
//! 1. User visits `/auth/signin` → redirect to Keycloak with `kc_idp_hint=<tenant>`
//! 2. Keycloak authenticates → redirect to `/auth/callback`
//! 3. Portal exchanges code for tokens → issues the session cookie → redirect to callback path
//! 4. User visits `/auth/logout` → session cookie cleared → Keycloak end-session

pub mod claims;
pub mod extractors;
pub mod handlers;
pub mod helpers;
pub mod jwt;
pub mod oidc;

// Re-export handlers for convenient routing
pub use handlers::{
    callback_handler, logout_callback_handler, logout_handler, signin_handler, CallbackParams,
    SignInQuery,
};

pub use claims::Claims;
pub use extractors::{AuthError, CurrentSession};
