//! Session cookie transport
//!
//! The session is sealed into an HS256 JWT signed with the deployment's session
//! secret. Sealed values that do not fit in one cookie are split across numbered
//! chunks (`portal_session.0`, `portal_session.1`, ...).

use anyhow::{Context, Result};
use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::Session;
use crate::auth::helpers::extract_cookie;
use crate::config::Config;

pub const SESSION_COOKIE: &str = "portal_session";

/// Largest cookie value written; keeps name + attributes under the 4096 byte limit
pub const MAX_CHUNK_SIZE: usize = 3800;

#[derive(Serialize, Deserialize)]
struct SealedSession {
    iat: u64,
    exp: u64,
    #[serde(flatten)]
    session: Session,
}

pub struct SessionSealer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    max_age_secs: u64,
}

impl SessionSealer {
    pub fn new(secret: &[u8], max_age_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            max_age_secs,
        }
    }

    pub fn max_age_secs(&self) -> u64 {
        self.max_age_secs
    }

    pub fn seal(&self, session: &Session, now: u64) -> Result<String> {
        let sealed = SealedSession {
            iat: now,
            exp: now.saturating_add(self.max_age_secs),
            session: session.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &sealed, &self.encoding_key)
            .context("Failed to seal session")
    }

    /// Verify signature and cookie lifetime, then return the session
    pub fn unseal(&self, value: &str) -> Result<Session> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<SealedSession>(value, &self.decoding_key, &validation)
            .context("Invalid session cookie")?;
        Ok(data.claims.session)
    }
}

/// Names of all session cookies (single or chunked) present on the request
pub fn session_cookie_names(headers: &HeaderMap) -> Vec<String> {
    let mut names = Vec::new();
    for header_value in headers.get_all("cookie") {
        let Ok(cookie_str) = header_value.to_str() else {
            continue;
        };
        for name in cookie_str
            .split(';')
            .filter_map(|c| c.trim().split_once('=').map(|(n, _)| n))
        {
            let is_session = name == SESSION_COOKIE
                || name
                    .strip_prefix(SESSION_COOKIE)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .is_some_and(|idx| idx.parse::<usize>().is_ok());
            if is_session && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Reassemble the sealed value from the request cookies
pub fn read_sealed(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = extract_cookie(headers, SESSION_COOKIE) {
        return Some(value);
    }

    let mut sealed = String::new();
    for index in 0.. {
        match extract_cookie(headers, &format!("{}.{}", SESSION_COOKIE, index)) {
            Some(chunk) => sealed.push_str(&chunk),
            None => break,
        }
    }

    if sealed.is_empty() {
        None
    } else {
        Some(sealed)
    }
}

/// Read the session from the request, treating an invalid cookie as no session
pub fn read_session(headers: &HeaderMap, sealer: &SessionSealer) -> Option<Session> {
    let sealed = read_sealed(headers)?;
    match sealer.unseal(&sealed) {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring invalid session cookie");
            None
        }
    }
}

fn cookie_line(config: &Config, name: &str, value: &str, max_age: u64) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax{}{}",
        name,
        value,
        max_age,
        config.cookie_domain_attr(),
        config.cookie_secure_flag()
    )
}

/// `Set-Cookie` values that store `sealed` and expire stale cookies from `existing`
pub fn session_set_cookies(
    config: &Config,
    sealed: &str,
    max_age: u64,
    existing: &[String],
) -> Vec<String> {
    let mut written: Vec<(String, &str)> = Vec::new();
    if sealed.len() <= MAX_CHUNK_SIZE {
        written.push((SESSION_COOKIE.to_string(), sealed));
    } else {
        // JWT text is ASCII, so byte chunks are valid strings
        for (index, start) in (0..sealed.len()).step_by(MAX_CHUNK_SIZE).enumerate() {
            let end = (start + MAX_CHUNK_SIZE).min(sealed.len());
            written.push((format!("{}.{}", SESSION_COOKIE, index), &sealed[start..end]));
        }
    }

    let mut lines: Vec<String> = written
        .iter()
        .map(|(name, value)| cookie_line(config, name, value, max_age))
        .collect();

    for name in existing {
        if !written.iter().any(|(n, _)| n == name) {
            lines.push(cookie_line(config, name, "", 0));
        }
    }

    lines
}

/// `Set-Cookie` values that remove every session cookie on the request
///
/// The plain cookie name is always cleared, even if the request did not carry it.
pub fn session_clear_cookies(config: &Config, existing: &[String]) -> Vec<String> {
    let mut lines = vec![cookie_line(config, SESSION_COOKIE, "", 0)];
    for name in existing.iter().filter(|n| n.as_str() != SESSION_COOKIE) {
        lines.push(cookie_line(config, name, "", 0));
    }
    lines
}
