//! Session-held OAuth credentials.
//!
//! Every authenticated request goes through [`authorize`], which refreshes an
//! expired access token in place and fails closed otherwise.

use thiserror::Error;
use tower_sessions::{session, Session};

use crate::models::Credential;
use crate::services::oauth::{OAuthClient, OAuthError};

pub const CREDENTIALS_KEY: &str = "credentials";
pub const OAUTH_STATE_KEY: &str = "oauth_state";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no Drive credentials in session")]
    Missing,

    #[error("access token expired and no refresh token is available")]
    Expired,

    /// Terminal: the refresh token was rejected and has been removed.
    #[error("refresh token rejected: {0}")]
    Invalidated(#[source] OAuthError),

    /// Possibly temporary: the credential was kept.
    #[error("token refresh failed: {0}")]
    RefreshFailed(#[source] OAuthError),

    #[error("session store error: {0}")]
    Session(#[from] session::Error),
}

impl CredentialError {
    /// Whether the caller should be told to sign in again, as opposed to a
    /// fault in the session store itself.
    pub fn is_unauthenticated(&self) -> bool {
        !matches!(self, CredentialError::Session(_))
    }
}

pub async fn load(session: &Session) -> Result<Option<Credential>, session::Error> {
    session.get::<Credential>(CREDENTIALS_KEY).await
}

pub async fn store(session: &Session, credential: &Credential) -> Result<(), session::Error> {
    session.insert(CREDENTIALS_KEY, credential).await
}

pub async fn clear(session: &Session) -> Result<(), session::Error> {
    session.remove::<Credential>(CREDENTIALS_KEY).await?;
    Ok(())
}

/// Return a usable credential, refreshing and persisting a new access token
/// when the stored one has expired.
pub async fn authorize(
    session: &Session,
    oauth: &OAuthClient,
) -> Result<Credential, CredentialError> {
    let mut credential = load(session).await?.ok_or(CredentialError::Missing)?;

    if !credential.is_expired() {
        return Ok(credential);
    }

    if !credential.can_refresh() {
        return Err(CredentialError::Expired);
    }

    match oauth.refresh(&credential).await {
        Ok(refreshed) => {
            credential.token = refreshed.access_token;
            credential.expiry = refreshed.expiry;
            store(session, &credential).await?;

            tracing::info!("Refreshed expired Drive access token");
            Ok(credential)
        }
        Err(e) if e.is_invalidation() => {
            tracing::warn!(error = %e, "Refresh token rejected, clearing stored credentials");
            clear(session).await?;
            Err(CredentialError::Invalidated(e))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Token refresh failed, keeping stored credentials");
            Err(CredentialError::RefreshFailed(e))
        }
    }
}
