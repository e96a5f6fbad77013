//! Tenant portal service library
//!
//! One deployment serves one tenant: sessions are issued only to members of the
//! tenant's organization and every request passes the route guard.

#![deny(dead_code)]

pub mod auth;
pub mod config;
pub mod session;
pub mod tenant;
pub mod web;

#[cfg(test)]
mod test_support;

use auth::jwt::JwtValidator;
use config::Config;
use session::{SessionRefresher, SessionSealer};
use std::sync::Arc;
use tenant::RouteTable;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jwt_validator: Arc<JwtValidator>,
    /// Route table, immutable after startup
    pub routes: Arc<RouteTable>,
    pub sealer: Arc<SessionSealer>,
    pub refresher: Arc<SessionRefresher>,
}
