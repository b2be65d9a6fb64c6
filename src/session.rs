//! Per-browser session state and the store it lives in.
//!
//! The browser only ever sees a random session id in a cookie. The store is keyed by the SHA-512
//! digest of that id, so the stored keys cannot be replayed as cookies.

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::model::TokenSet;

pub mod memory;
pub mod postgres;

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;

pub const SESSION_COOKIE: &str = "grader_session";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session store query failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored session is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Everything the server remembers about one browser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Anti-CSRF nonce for the login currently in flight.
    pub oauth_state: Option<String>,
    pub tokens: Option<TokenSet>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

impl SessionData {
    pub fn store_tokens(&mut self, tokens: TokenSet, obtained_at: DateTime<Utc>) {
        self.token_expires_at = tokens.expires_at(obtained_at);
        self.tokens = Some(tokens);
    }

    pub fn clear_tokens(&mut self) {
        self.tokens = None;
        self.token_expires_at = None;
    }

    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// Storage key derived from a session id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(Vec<u8>);

impl SessionKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// The random id carried in the session cookie.
#[derive(Clone)]
pub struct SessionId([u8; 16]);

impl SessionId {
    pub fn generate() -> Self {
        let mut id = [0u8; 16];
        rand::fill(&mut id);
        Self(id)
    }

    /// Reads the session id from the cookie jar, ignoring cookies that do not decode.
    pub fn from_jar(jar: &CookieJar) -> Option<Self> {
        let cookie = jar.get(SESSION_COOKIE)?;
        let bytes = BASE64_URL_SAFE_NO_PAD.decode(cookie.value()).ok()?;
        let id: [u8; 16] = bytes.try_into().ok()?;
        Some(Self(id))
    }

    pub fn key(&self) -> SessionKey {
        SessionKey(Sha512::digest(self.0).to_vec())
    }

    pub fn cookie(&self, secure: bool) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, BASE64_URL_SAFE_NO_PAD.encode(self.0)))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .build()
    }
}

/// Backing storage for sessions. Routes only talk to this trait, so the store can be swapped
/// without touching them.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &SessionKey) -> Result<Option<SessionData>, SessionError>;

    async fn set(&self, key: &SessionKey, data: SessionData) -> Result<(), SessionError>;

    async fn clear(&self, key: &SessionKey) -> Result<(), SessionError>;
}
