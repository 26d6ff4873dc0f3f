//! OAuth2 authorization-code flow against Google's endpoints.

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;

use crate::config::GoogleSettings;
use crate::models::Credential;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("token endpoint request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint refused the grant (4xx), e.g. `invalid_grant` for a revoked
    /// refresh token. Retrying with the same grant cannot succeed.
    #[error("token endpoint rejected the request ({status}): {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("token endpoint failed ({status}): {body}")]
    Upstream { status: StatusCode, body: String },
}

impl OAuthError {
    /// True when the grant itself is no longer valid.
    pub fn is_invalidation(&self) -> bool {
        matches!(self, OAuthError::Rejected { .. })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// An `expires_in` too large to represent is treated as no expiry.
    fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
    }
}

/// A freshly refreshed access token.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expiry: Option<DateTime<Utc>>,
}

pub struct OAuthClient {
    http: Client,
    settings: GoogleSettings,
}

impl OAuthClient {
    pub fn new(http: Client, settings: GoogleSettings) -> Self {
        Self { http, settings }
    }

    /// Consent-screen URL requesting offline access with a forced consent prompt,
    /// so Google always hands back a refresh token.
    pub fn authorization_url(&self, state: &str) -> String {
        let scope = self.settings.scopes.join(" ");
        let params = [
            ("client_id", self.settings.client_id.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", state),
            ("access_type", "offline"),
            ("include_granted_scopes", "true"),
            ("prompt", "consent"),
        ];

        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        let separator = if self.settings.auth_uri.contains('?') {
            '&'
        } else {
            '?'
        };

        format!("{}{}{}", self.settings.auth_uri, separator, query)
    }

    /// Exchange an authorization code for a full credential set.
    pub async fn exchange_code(&self, code: &str) -> Result<Credential, OAuthError> {
        let token_uri = self.settings.token_uri().to_string();
        let client_secret = self.settings.client_secret.expose_secret();

        let tokens = self
            .token_request(
                &token_uri,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("client_id", self.settings.client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("redirect_uri", self.settings.redirect_uri.as_str()),
                ],
            )
            .await?;

        let expiry = tokens.expiry();
        let scopes = match &tokens.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => self.settings.scopes.clone(),
        };

        Ok(Credential {
            token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_uri,
            client_id: self.settings.client_id.clone(),
            client_secret: client_secret.clone(),
            scopes,
            expiry,
        })
    }

    /// Refresh using the endpoint and client identity stored in the credential.
    pub async fn refresh(&self, credential: &Credential) -> Result<RefreshedToken, OAuthError> {
        let refresh_token = credential.refresh_token.as_deref().unwrap_or_default();

        let tokens = self
            .token_request(
                &credential.token_uri,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", credential.client_id.as_str()),
                    ("client_secret", credential.client_secret.as_str()),
                ],
            )
            .await?;

        Ok(RefreshedToken {
            expiry: tokens.expiry(),
            access_token: tokens.access_token,
        })
    }

    async fn token_request(
        &self,
        token_uri: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, OAuthError> {
        let response = self
            .http
            .post(token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(token_uri = %token_uri, error = %e, "Token endpoint unreachable");
                OAuthError::Transport(e)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<TokenResponse>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, body = %body, "Token endpoint returned an error");

        if status.is_client_error() {
            Err(OAuthError::Rejected { status, body })
        } else {
            Err(OAuthError::Upstream { status, body })
        }
    }
}
