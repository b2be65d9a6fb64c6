use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::model::ParseError;
use crate::oauth::OAuthError;
use crate::remote::RemoteError;
use crate::session::SessionError;

/// JSON body returned for every failure. `code` lets the UI tell "not logged in" apart from
/// everything else without parsing messages.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing code or state")]
    MissingCallbackParams,
    #[error("Invalid state")]
    CsrfStateMismatch,
    #[error("Authentication failed")]
    OAuthExchange(#[source] OAuthError),
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("{message}")]
    RemoteApi {
        status: Option<u16>,
        message: String,
    },
    #[error("Unexpected response from the learning platform: {0}")]
    RemoteShape(#[from] ParseError),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::MissingCallbackParams => (StatusCode::BAD_REQUEST, "MISSING_PARAMS"),
            AppError::CsrfStateMismatch => (StatusCode::BAD_REQUEST, "INVALID_STATE"),
            AppError::OAuthExchange(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "AUTHENTICATION_FAILED")
            }
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "NOT_AUTHENTICATED"),
            AppError::RemoteApi { status, .. } => (
                status
                    .and_then(|s| StatusCode::from_u16(s).ok())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                "REMOTE_API_FAILURE",
            ),
            AppError::RemoteShape(_) => (StatusCode::BAD_GATEWAY, "REMOTE_SHAPE"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Status { status, message } => AppError::RemoteApi {
                status: Some(status),
                message,
            },
            RemoteError::Transport(e) => AppError::RemoteApi {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            RemoteError::Parse(e) => AppError::RemoteShape(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        match &self {
            AppError::OAuthExchange(e) => tracing::error!("Failed to exchange code: {e}"),
            AppError::Session(e) => tracing::error!("Session store error: {e}"),
            AppError::RemoteApi { .. } | AppError::RemoteShape(_) => {
                tracing::warn!(%status, "Remote call failed: {}", self)
            }
            _ => tracing::debug!(%status, "{}", self),
        }

        let error = match &self {
            AppError::Session(_) => "Internal Server Error.".to_owned(),
            other => other.to_string(),
        };

        (status, Json(ErrorBody { code, error })).into_response()
    }
}
