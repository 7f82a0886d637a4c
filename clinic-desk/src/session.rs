use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metrics::Metrics;

pub const SESSION_COOKIE: &str = "sessionId";
const TOKEN_PREFIX: &str = "cdsess_";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub clinic_id: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, clinic_id: &str) -> Session;

    /// Live session for the token, or `None` when unknown or expired.
    async fn get(&self, token: &str) -> Option<Session>;

    async fn revoke(&self, token: &str) -> bool;

    /// Drops expired entries. Returns how many were removed.
    async fn purge_expired(&self) -> usize;

    fn ttl(&self) -> Duration;
}

fn generate_token() -> String {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    format!("{}{}", TOKEN_PREFIX, rand_string)
}

/// Keyed cache with a fixed time-to-live per entry.
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, clinic_id: &str) -> Session {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::hours(8));
        let session = Session {
            id: generate_token(),
            clinic_id: clinic_id.to_string(),
            expires_at: Utc::now() + ttl,
        };
        self.sessions.insert(session.id.clone(), session.clone());
        Metrics::session_opened();
        debug!(clinic_id, "session opened");
        session
    }

    async fn get(&self, token: &str) -> Option<Session> {
        if !token.starts_with(TOKEN_PREFIX) {
            return None;
        }

        let session = self.sessions.get(token).map(|s| s.clone())?;
        if session.is_expired(Utc::now()) {
            if self.sessions.remove(token).is_some() {
                Metrics::sessions_closed(1);
            }
            return None;
        }
        Some(session)
    }

    async fn revoke(&self, token: &str) -> bool {
        let removed = self.sessions.remove(token).is_some();
        if removed {
            Metrics::sessions_closed(1);
        }
        removed
    }

    async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            Metrics::sessions_closed(removed);
            debug!(removed, "purged expired sessions");
        }
        removed
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Pulls the session token out of a `Cookie` header value.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(session: &Session, ttl: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        session.id,
        ttl.as_secs()
    )
}

pub fn cleared_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}
