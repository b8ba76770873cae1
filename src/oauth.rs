//! Google OAuth relay for the Photos integration.
//!
//! The backend only brokers the authorization-code flow: it redirects the
//! browser to Google's consent screen, exchanges the returned code for an
//! access token and hands that token to the frontend through a redirect.
//! Tokens are never stored.

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::error::OAuthError;

/// Google's consent endpoint.
pub const DEFAULT_GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google's token endpoint.
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope requested for Photos uploads.
pub const PHOTOS_APPEND_SCOPE: &str = "https://www.googleapis.com/auth/photoslibrary.appendonly";

/// Callback path registered with Google, relative to the backend URL.
pub const CALLBACK_PATH: &str = "/auth/google/callback";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// OAuth client settings and endpoints.
#[derive(Clone)]
pub struct GoogleOAuth {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    frontend_url: Url,
    auth_url: Url,
    token_url: Url,
}

impl GoogleOAuth {
    /// Create a relay.
    ///
    /// # Arguments
    /// * `backend_url` - Public URL of this server; the callback is derived from it
    /// * `frontend_url` - Where the browser is sent with the access token
    pub fn new(
        http: reqwest::Client,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        backend_url: &Url,
        frontend_url: Url,
    ) -> Result<Self, OAuthError> {
        let parse = |s: &str| Url::parse(s).map_err(|_| OAuthError::NotConfigured);
        Ok(Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: format!(
                "{}{}",
                backend_url.as_str().trim_end_matches('/'),
                CALLBACK_PATH
            ),
            frontend_url,
            auth_url: parse(DEFAULT_GOOGLE_AUTH_URL)?,
            token_url: parse(DEFAULT_GOOGLE_TOKEN_URL)?,
        })
    }

    /// Override the Google endpoints.
    pub fn with_endpoints(mut self, auth_url: Url, token_url: Url) -> Self {
        self.auth_url = auth_url;
        self.token_url = token_url;
        self
    }

    /// The registered callback URL.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Consent screen URL requesting offline access to the Photos append scope.
    pub fn authorization_url(&self) -> Url {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("access_type", "offline")
            .append_pair("scope", PHOTOS_APPEND_SCOPE)
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri);
        url
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        if code.is_empty() {
            return Err(OAuthError::MissingCode);
        }

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "Token endpoint rejected the code");
            return Err(OAuthError::Exchange(format!("{}: {}", status, body)));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;
        let token = tokens
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OAuthError::Exchange("no access_token in response".to_string()))?;

        info!("Google authorization code exchanged");
        Ok(token)
    }

    /// Frontend URL carrying the access token as a query parameter.
    pub fn frontend_redirect(&self, access_token: &str) -> Url {
        let mut url = self.frontend_url.clone();
        url.query_pairs_mut()
            .append_pair("access_token", access_token);
        url
    }
}
