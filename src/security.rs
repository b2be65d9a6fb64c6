//! The gate in front of the submission routes.
//!
//! A request only reaches a protected handler if its session holds an access token. The token is
//! handed to the handler as an [`AccessToken`] request extension, so handlers never touch the
//! session store themselves.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::AppError;
use crate::session::{SessionData, SessionId, SessionKey};
use crate::state::AppState;

/// The bearer token for the current request. Immutable for the life of the request.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<hidden>)")
    }
}

/// Rejects the request with 401 before any vendor call is made if the session has no token.
pub async fn require_access_token(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let id = SessionId::from_jar(&jar).ok_or(AppError::Unauthenticated)?;
    let key = id.key();
    let session = state
        .sessions
        .get(&key)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let token = current_access_token(&state, &key, session).await?;
    request.extensions_mut().insert(token);

    Ok(next.run(request).await)
}

/// Returns the session's access token, refreshing it first if its known expiry has passed.
async fn current_access_token(
    state: &AppState,
    key: &SessionKey,
    session: SessionData,
) -> Result<AccessToken, AppError> {
    let Some(tokens) = session.tokens.as_ref() else {
        return Err(AppError::Unauthenticated);
    };

    if !session.token_expired(Utc::now()) {
        return Ok(AccessToken(tokens.access_token.clone()));
    }

    refresh(state, key).await
}

/// Refreshes the session's tokens. At most one refresh per session runs at a time.
async fn refresh(state: &AppState, key: &SessionKey) -> Result<AccessToken, AppError> {
    let lock = state.refresh_locks.for_session(key).await;
    let _guard = lock.lock().await;

    // Another request may have refreshed while this one waited.
    let mut session = state
        .sessions
        .get(key)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    let Some(tokens) = session.tokens.clone() else {
        return Err(AppError::Unauthenticated);
    };
    if !session.token_expired(Utc::now()) {
        return Ok(AccessToken(tokens.access_token));
    }

    let Some(refresh_token) = tokens.refresh_token else {
        info!("Access token expired and no refresh token is held");
        session.clear_tokens();
        state.sessions.set(key, session).await?;
        return Err(AppError::Unauthenticated);
    };

    let result = state.oauth.refresh_access_token(&refresh_token).await;

    // Re-read so tokens from a concurrent login or logout are not overwritten.
    let Some(mut session) = state.sessions.get(key).await? else {
        return Err(AppError::Unauthenticated);
    };
    let still_current = session
        .tokens
        .as_ref()
        .and_then(|t| t.refresh_token.as_deref())
        == Some(refresh_token.as_str());

    match result {
        Ok(refreshed) => {
            let access_token = AccessToken(refreshed.access_token.clone());
            if still_current {
                session.store_tokens(refreshed, Utc::now());
                state.sessions.set(key, session).await?;
            }
            Ok(access_token)
        }
        Err(e) => {
            warn!("Token refresh failed: {e}");
            if still_current {
                session.clear_tokens();
                state.sessions.set(key, session).await?;
            }
            Err(AppError::Unauthenticated)
        }
    }
}

/// One lock per session, held while that session's tokens are being refreshed.
#[derive(Default)]
pub struct RefreshLocks(Mutex<HashMap<SessionKey, Arc<Mutex<()>>>>);

impl RefreshLocks {
    async fn for_session(&self, key: &SessionKey) -> Arc<Mutex<()>> {
        let mut locks = self.0.lock().await;
        // Drop locks nobody is holding or waiting on.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(key.clone()).or_default().clone()
    }
}
