//! Route table and the handlers that do not belong to a more specific group.
//!
//! The OAuth routes are public and live in `auth`. Everything under `/api/submissions` goes
//! through [`security::require_access_token`] first and lives in `submissions`.

use std::path::Path;

use axum::{
    Json, Router,
    extract::{FromRequest, Request, rejection::JsonRejection},
    handler::HandlerWithoutStateExt,
    middleware::from_fn_with_state,
    response::Html,
    routing::get,
};
use serde::de::DeserializeOwned;
use tower_http::services::ServeDir;

use crate::{error::AppError, security, state::AppState};

pub mod auth;
pub mod submissions;

const INDEX_HTML: &str = include_str!("../web/index.html");

/// Builds the application. Routes added before a `layer` call sit inside that layer.
pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let app = Router::new()
        .route("/api/submissions", get(submissions::list))
        .route(
            "/api/submissions/{id}",
            get(submissions::get).post(submissions::update),
        )
        .layer(from_fn_with_state(
            state.clone(),
            security::require_access_token,
        ));

    let app = app
        .route("/login", get(auth::login))
        .route("/oauth/callback", get(auth::callback))
        .route("/logout", get(auth::logout))
        .route("/api/session", get(auth::session_status));

    // Unmatched GETs get the UI shell so client-side deep links resolve. ServeDir answers other
    // methods with 405 itself.
    let app = match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir).fallback(spa_shell.into_service())),
        None => app.fallback(get(spa_shell)),
    };

    app.with_state(state)
}

pub async fn spa_shell() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// `Json<T>` whose rejection is an [`AppError`], so malformed bodies still get a JSON error.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(AppJson(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header::CONTENT_TYPE},
    };
    use tower::ServiceExt;

    use crate::test_support::{FakeVendor, TestApp};

    #[tokio::test]
    async fn unknown_paths_serve_the_ui_shell() {
        let vendor = FakeVendor::start(axum::Router::new()).await;
        let app = TestApp::new(&vendor);

        for uri in ["/", "/submissions/42"] {
            let response = app
                .router()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert!(
                response.headers()[CONTENT_TYPE]
                    .to_str()
                    .unwrap()
                    .starts_with("text/html")
            );
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert!(String::from_utf8_lossy(&body).contains("Assignment Submissions"));
        }
        assert_eq!(vendor.hits(), 0);
    }

    #[test]
    fn ui_shell_shows_login_on_401_and_keeps_state_on_failed_update() {
        let script = super::INDEX_HTML;
        assert!(script.contains("err.status === 401"));
        assert!(script.contains("'not_authenticated'"));

        // A failed update alerts and returns before the list is re-fetched or the row collapsed.
        let decide = &script[script.find("async function decide").unwrap()..];
        let alert = decide.find("window.alert").unwrap();
        let collapse = decide.find("state.selectedId = null").unwrap();
        let reload = decide.find("await loadList()").unwrap();
        assert!(alert < collapse && collapse < reload);
        assert!(decide[alert..collapse].contains("return;"));
    }

    #[tokio::test]
    async fn only_gets_fall_back_to_the_shell() {
        let vendor = FakeVendor::start(axum::Router::new()).await;
        let app = TestApp::new(&vendor);

        let response = app
            .router()
            .oneshot(Request::post("/anything").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(vendor.hits(), 0);
    }
}
