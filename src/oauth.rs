//! Authorization-code and refresh-token grants against the vendor's OAuth2 endpoints.

use reqwest::Client as HttpClient;
use tracing::{debug, info};
use url::Url;

use crate::config::VendorConfig;
use crate::model::TokenSet;

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("invalid OAuth endpoint URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("token endpoint rejected the grant ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct OAuthClient {
    http: HttpClient,
    authorize_url: Url,
    token_url: Url,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl OAuthClient {
    pub fn new(http: HttpClient, vendor: &VendorConfig) -> Result<Self, OAuthError> {
        let base = Url::parse(&vendor.base_url)?;
        Ok(Self {
            http,
            authorize_url: base.join("/oauth2/authorize")?,
            token_url: base.join("/oauth2/token")?,
            client_id: vendor.client_id.clone(),
            client_secret: vendor.client_secret.clone(),
            redirect_uri: vendor.redirect_uri.clone(),
            scopes: vendor.scopes.clone(),
        })
    }

    /// Where to send the browser to log in. `state` comes back untouched on the callback.
    pub fn build_authorization_url(&self, state: &str) -> Url {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", self.client_id.as_str())
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state);
        url
    }

    #[tracing::instrument(skip_all)]
    pub async fn exchange_code_for_tokens(&self, code: &str) -> Result<TokenSet, OAuthError> {
        info!("Exchanging authorization code");
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ])
        .await
    }

    #[tracing::instrument(skip_all)]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet, OAuthError> {
        info!("Refreshing access token");
        let mut tokens = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .await?;

        // Some servers only rotate the access token.
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_owned());
        }
        Ok(tokens)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenSet, OAuthError> {
        let response = self
            .http
            .post(self.token_url.clone())
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, "Token endpoint rejected the request");
            return Err(OAuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<TokenSet>().await?)
    }
}
