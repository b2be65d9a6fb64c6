//! Runtime configuration: an optional TOML file, overridden by environment variables.

use std::env::var;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "grader-bff.toml";
const PLACEHOLDER_PREFIX: &str = "REPLACE_WITH_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration value `{0}` is missing")]
    Missing(&'static str),
    #[error("configuration value `{key}` is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Connection parameters for the vendor's OAuth2 client registration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct VendorConfig {
    /// Tenant base URL, e.g. `https://acme.docebosaas.com`.
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Path of the submissions resource under `base_url`.
    pub submissions_path: String,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://docebo70.docebosaas.com".into(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:5000/oauth/callback".into(),
            scopes: vec![
                "assignment:read".into(),
                "assignment:update".into(),
                "user:read".into(),
            ],
            submissions_path: "/assignment/v1/submissions".into(),
        }
    }
}

impl std::fmt::Debug for VendorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<hidden>")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("submissions_path", &self.submissions_path)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory of built UI assets. The embedded shell is served when unset.
    pub static_dir: Option<PathBuf>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    /// Postgres URL for the session store. Sessions stay in memory when unset.
    pub database_url: Option<String>,
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            static_dir: None,
            tls_cert: None,
            tls_key: None,
            database_url: None,
            secure_cookies: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub vendor: VendorConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Loads `.env`, then the TOML file named by `BFF_CONFIG` (if present), then environment
    /// overrides, and finally checks that the OAuth client is actually configured.
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();

        let path = var("BFF_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let vendor = &mut self.vendor;
        if let Some(v) = lookup("DOCEBO_BASE_URL") {
            vendor.base_url = v;
        }
        if let Some(v) = lookup("DOCEBO_CLIENT_ID") {
            vendor.client_id = v;
        }
        if let Some(v) = lookup("DOCEBO_CLIENT_SECRET") {
            vendor.client_secret = v;
        }
        if let Some(v) = lookup("DOCEBO_REDIRECT_URI") {
            vendor.redirect_uri = v;
        }
        if let Some(v) = lookup("DOCEBO_SCOPES") {
            vendor.scopes = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("DOCEBO_SUBMISSIONS_PATH") {
            vendor.submissions_path = v;
        }

        let server = &mut self.server;
        if let Some(v) = lookup("BIND_ADDR") {
            server.bind_addr = v.parse().map_err(|e| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: format!("{e}"),
            })?;
        } else if let Some(v) = lookup("PORT") {
            server.bind_addr.set_port(v.parse().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                reason: format!("{e}"),
            })?);
        }
        if let Some(v) = lookup("STATIC_DIR") {
            server.static_dir = Some(v.into());
        }
        if let Some(v) = lookup("TLS_CERT") {
            server.tls_cert = Some(v.into());
        }
        if let Some(v) = lookup("TLS_KEY") {
            server.tls_key = Some(v.into());
        }
        if let Some(v) = lookup("DATABASE_URL") {
            server.database_url = Some(v);
        }
        if let Some(v) = lookup("SESSION_COOKIE_SECURE") {
            server.secure_cookies = v.parse().map_err(|e| ConfigError::Invalid {
                key: "SESSION_COOKIE_SECURE",
                reason: format!("{e}"),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let vendor = &self.vendor;
        let required = [
            ("base_url", &vendor.base_url),
            ("client_id", &vendor.client_id),
            ("client_secret", &vendor.client_secret),
            ("redirect_uri", &vendor.redirect_uri),
        ];
        for (key, value) in required {
            if value.trim().is_empty() || value.starts_with(PLACEHOLDER_PREFIX) {
                return Err(ConfigError::Missing(key));
            }
        }

        url::Url::parse(&vendor.base_url).map_err(|e| ConfigError::Invalid {
            key: "base_url",
            reason: e.to_string(),
        })?;
        url::Url::parse(&vendor.redirect_uri).map_err(|e| ConfigError::Invalid {
            key: "redirect_uri",
            reason: e.to_string(),
        })?;

        if self.server.tls_cert.is_some() != self.server.tls_key.is_some() {
            return Err(ConfigError::Missing("tls_cert/tls_key pair"));
        }
        Ok(())
    }
}
