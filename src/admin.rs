#![forbid(unsafe_code)]

//! Timed admin gate.
//!
//! A password login hands out a random bearer token valid for one hour. The
//! token only guards the `/admin/*` pages; mutation endpoints stay reachable
//! without it.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use parking_lot::Mutex;
use rand_core::{OsRng, RngCore};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ServiceError;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);
const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminSession {
    pub token: String,
    pub expires_at: String,
    pub expires_in_secs: u64,
}

pub struct AdminGate {
    password_digest: Option<blake3::Hash>,
    ttl: Duration,
    sessions: Mutex<HashMap<String, Instant>>,
}

impl AdminGate {
    /// A gate without a password rejects every login.
    pub fn new(password: Option<&str>) -> Self {
        Self::with_ttl(password, SESSION_TTL)
    }

    pub fn with_ttl(password: Option<&str>, ttl: Duration) -> Self {
        Self {
            password_digest: password
                .filter(|value| !value.is_empty())
                .map(|value| blake3::hash(value.as_bytes())),
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.password_digest.is_some()
    }

    pub fn login(&self, password: &str) -> Option<AdminSession> {
        let expected = self.password_digest?;
        // `Hash` equality is constant-time.
        if blake3::hash(password.as_bytes()) != expected {
            warn!("admin login rejected");
            return None;
        }

        let mut raw = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut raw);
        let token = URL_SAFE_NO_PAD.encode(raw);
        let now = Instant::now();
        {
            let mut sessions = self.sessions.lock();
            sessions.retain(|_, expires| *expires > now);
            sessions.insert(token.clone(), now + self.ttl);
        }
        info!("admin session started");

        let expires_in_secs = self.ttl.as_secs();
        let expires_at = Utc::now() + chrono::Duration::seconds(expires_in_secs as i64);
        Some(AdminSession {
            token,
            expires_at: expires_at.to_rfc3339(),
            expires_in_secs,
        })
    }

    /// True while the token is known and unexpired. Expired sessions are
    /// dropped on every check.
    pub fn verify(&self, token: &str) -> bool {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        sessions.retain(|_, expires| *expires > now);
        sessions.contains_key(token)
    }

    pub fn logout(&self, token: &str) -> bool {
        self.sessions.lock().remove(token).is_some()
    }

    pub fn active_sessions(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .lock()
            .values()
            .filter(|expires| **expires > now)
            .count()
    }
}

pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Route layer for the admin pages.
pub async fn require_admin(
    State(gate): State<Arc<AdminGate>>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    if !gate.is_enabled() {
        return Err(ServiceError::ServiceUnavailable(
            "ADMIN_PASSWORD is not configured".into(),
        ));
    }
    match token_from_headers(request.headers()) {
        Some(token) if gate.verify(token) => Ok(next.run(request).await),
        _ => Err(ServiceError::Unauthorized(
            "admin session missing or expired".into(),
        )),
    }
}
