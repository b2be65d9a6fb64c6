use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum_server::tls_rustls::RustlsConfig;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;
use crate::oauth::OAuthClient;
use crate::remote::RemoteClient;
use crate::session::{MemorySessionStore, PgSessionStore, SessionStore};
use crate::state::AppState;

mod config;
mod endpoints;
mod error;
mod model;
mod oauth;
mod remote;
mod security;
mod session;
mod state;
#[cfg(test)]
mod test_support;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    // Begin logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    info!(vendor = ?config.vendor, "Configuration loaded");

    // Sessions live in Postgres when a database is configured, in memory otherwise
    let sessions: Arc<dyn SessionStore> = match &config.server.database_url {
        Some(url) => Arc::new(PgSessionStore::connect(url).await?),
        None => Arc::new(MemorySessionStore::new()),
    };

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let state = AppState {
        sessions,
        oauth: OAuthClient::new(http.clone(), &config.vendor)?,
        remote: RemoteClient::new(http, &config.vendor)?,
        secure_cookies: config.server.secure_cookies,
        refresh_locks: Default::default(),
    };

    // The UI is served from the same origin as the redirect URI, so only that origin may call
    // the API with credentials
    let origin = url::Url::parse(&config.vendor.redirect_uri)?
        .origin()
        .ascii_serialization();
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(AllowOrigin::exact(HeaderValue::from_str(&origin)?))
        .allow_credentials(true);

    let app = endpoints::router(state, config.server.static_dir.as_deref())
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = config.server.bind_addr;
    match (&config.server.tls_cert, &config.server.tls_key) {
        (Some(cert), Some(key)) => {
            // Both ring (via reqwest) and aws-lc-rs are linked, so pick one explicitly
            let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
            let tls = RustlsConfig::from_pem_file(cert, key).await?;
            info!("Serving HTTPS on {addr}");
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await?;
        }
        _ => {
            info!("Serving HTTP on {addr}");
            axum_server::bind(addr)
                .serve(app.into_make_service())
                .await?;
        }
    }

    Ok(())
}
