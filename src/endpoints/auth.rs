//! The OAuth round trip: `/login` sends the browser to the vendor, `/oauth/callback` brings it
//! back with a code, `/logout` forgets everything.

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::session::{SESSION_COOKIE, SessionId};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// 302 to `location`.
fn found(location: impl Into<String>) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.into())]).into_response()
}

/// Random hex nonce for the OAuth `state` parameter.
fn generate_state() -> String {
    let mut nonce = [0u8; 16];
    rand::fill(&mut nonce);
    nonce.iter().map(|b| format!("{b:02x}")).collect()
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Response), AppError> {
    let id = SessionId::from_jar(&jar).unwrap_or_else(SessionId::generate);
    let key = id.key();

    // A fresh nonce replaces whatever an earlier, abandoned login left behind.
    let mut session = state.sessions.get(&key).await?.unwrap_or_default();
    let nonce = generate_state();
    session.oauth_state = Some(nonce.clone());
    state.sessions.set(&key, session).await?;

    let url = state.oauth.build_authorization_url(&nonce);
    info!("Redirecting to the vendor login");

    Ok((jar.add(id.cookie(state.secure_cookies)), found(url.to_string())))
}

pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    let (Some(code), Some(returned_state)) = (
        params.code.filter(|c| !c.is_empty()),
        params.state.filter(|s| !s.is_empty()),
    ) else {
        return Err(AppError::MissingCallbackParams);
    };

    let key = SessionId::from_jar(&jar)
        .ok_or(AppError::CsrfStateMismatch)?
        .key();
    let mut session = state
        .sessions
        .get(&key)
        .await?
        .ok_or(AppError::CsrfStateMismatch)?;

    if session.oauth_state.as_deref() != Some(returned_state.as_str()) {
        return Err(AppError::CsrfStateMismatch);
    }

    // Nothing is written to the session unless the exchange succeeds.
    let tokens = state
        .oauth
        .exchange_code_for_tokens(&code)
        .await
        .map_err(AppError::OAuthExchange)?;

    session.oauth_state = None;
    session.store_tokens(tokens, Utc::now());
    state.sessions.set(&key, session).await?;

    info!("Login complete");
    Ok(found("/"))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Response), AppError> {
    if let Some(id) = SessionId::from_jar(&jar) {
        state.sessions.clear(&id.key()).await?;
    }

    Ok((
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        found("/"),
    ))
}

pub async fn session_status(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<SessionStatus>, AppError> {
    let session = match SessionId::from_jar(&jar) {
        Some(id) => state.sessions.get(&id.key()).await?,
        None => None,
    };

    let status = match session {
        Some(session) if session.tokens.is_some() => SessionStatus {
            authenticated: true,
            expires_at: session.token_expires_at,
        },
        _ => SessionStatus {
            authenticated: false,
            expires_at: None,
        },
    };
    Ok(Json(status))
}
