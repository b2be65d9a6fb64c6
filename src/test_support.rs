//! Test fixtures: an in-process stand-in for the vendor and a router wired to it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    body::Body,
    extract::Request,
    http::{Response, StatusCode},
    middleware::{Next, from_fn},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::{Value, json};

use crate::config::VendorConfig;
use crate::endpoints;
use crate::model::TokenSet;
use crate::oauth::OAuthClient;
use crate::remote::RemoteClient;
use crate::session::{MemorySessionStore, SessionData, SessionId, SessionStore};
use crate::state::AppState;

/// A vendor API served on an ephemeral local port. Counts every request it receives.
pub struct FakeVendor {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl FakeVendor {
    pub async fn start(routes: Router) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let app = routes
            .fallback(|| async { StatusCode::NOT_FOUND })
            .layer(from_fn(move |request: Request, next: Next| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    next.run(request).await
                }
            }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            hits,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub fn vendor_config(base_url: &str) -> VendorConfig {
    VendorConfig {
        base_url: base_url.to_owned(),
        client_id: "client-id".into(),
        client_secret: "client-secret".into(),
        scopes: vec!["assignment:read".into(), "assignment:update".into()],
        ..Default::default()
    }
}

pub fn sample_submission(id: &str) -> Value {
    json!({
        "id": id,
        "status": "pending review",
        "user": { "name": "A" },
        "course": { "name": "C" },
        "submitted_at": "2024-01-01T00:00:00Z",
    })
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// The real router backed by an in-memory session store and pointed at a [`FakeVendor`].
pub struct TestApp {
    state: AppState,
    sessions: Arc<MemorySessionStore>,
}

impl TestApp {
    pub fn new(vendor: &FakeVendor) -> Self {
        let config = vendor_config(&vendor.base_url);
        let http = reqwest::Client::new();
        let sessions = Arc::new(MemorySessionStore::new());

        let state = AppState {
            sessions: sessions.clone(),
            oauth: OAuthClient::new(http.clone(), &config).unwrap(),
            remote: RemoteClient::new(http, &config).unwrap(),
            secure_cookies: false,
            refresh_locks: Default::default(),
        };
        Self { state, sessions }
    }

    pub fn router(&self) -> Router {
        endpoints::router(self.state.clone(), None)
    }

    pub async fn with_session(&self, data: SessionData) -> SessionId {
        let id = SessionId::generate();
        self.sessions.set(&id.key(), data).await.unwrap();
        id
    }

    /// A logged-in session holding `access_token` with no known expiry.
    pub async fn with_tokens(&self, access_token: &str) -> SessionId {
        let tokens: TokenSet =
            serde_json::from_value(json!({ "access_token": access_token, "refresh_token": "rt" }))
                .unwrap();
        self.with_session(SessionData {
            tokens: Some(tokens),
            ..Default::default()
        })
        .await
    }

    pub async fn session(&self, id: &SessionId) -> Option<SessionData> {
        self.sessions.get(&id.key()).await.unwrap()
    }

    /// Looks up the session named by a `Set-Cookie` header value.
    pub async fn session_for_cookie(&self, set_cookie: &str) -> Option<SessionData> {
        let cookie = Cookie::parse(set_cookie.to_owned()).ok()?;
        let id = SessionId::from_jar(&CookieJar::new().add(cookie))?;
        self.session(&id).await
    }

    pub fn cookie_header(id: &SessionId) -> String {
        let cookie = id.cookie(false);
        format!("{}={}", cookie.name(), cookie.value())
    }
}
