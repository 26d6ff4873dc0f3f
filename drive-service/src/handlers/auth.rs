use anyhow::{anyhow, bail};
use axum::{
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use service_core::error::AppError;
use tower_sessions::Session;

use super::session_error;
use crate::services::credentials::{self, OAUTH_STATE_KEY};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user denied consent.
    pub error: Option<String>,
}

/// Starts the OAuth flow: remembers a fresh `state` value and sends the browser
/// to Google's consent screen.
pub async fn login(State(state): State<AppState>, session: Session) -> Result<Redirect, AppError> {
    let csrf_state = uuid::Uuid::new_v4().simple().to_string();
    session
        .insert(OAUTH_STATE_KEY, &csrf_state)
        .await
        .map_err(session_error)?;

    tracing::info!("Redirecting to Google consent screen");

    Ok(Redirect::to(&state.oauth.authorization_url(&csrf_state)))
}

/// Completes the OAuth flow and stores the credential set in the session.
pub async fn oauth2callback(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<OAuthCallbackParams>,
) -> Result<Redirect, AppError> {
    match complete_authorization(&state, &session, params).await {
        Ok(()) => {
            tracing::info!("Drive authorization completed");
            Ok(Redirect::to("/"))
        }
        Err(e) => {
            tracing::warn!(error = %e, "OAuth callback failed");
            Err(AppError::BadRequest(anyhow!("OAuth failed: {}", e)))
        }
    }
}

async fn complete_authorization(
    state: &AppState,
    session: &Session,
    params: OAuthCallbackParams,
) -> anyhow::Result<()> {
    if let Some(error) = params.error {
        bail!("provider returned error '{}'", error);
    }

    // Single use: a replayed callback finds no state
    let expected: Option<String> = session.remove(OAUTH_STATE_KEY).await?;
    match (expected, params.state) {
        (Some(expected), Some(received)) if expected == received => {}
        _ => bail!("state parameter does not match this session"),
    }

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| anyhow!("missing authorization code"))?;

    let credential = state.oauth.exchange_code(&code).await?;
    if credential.refresh_token.is_none() {
        tracing::warn!("Token response carried no refresh token; the session cannot outlive the access token");
    }

    session.cycle_id().await?;
    credentials::store(session, &credential).await?;

    Ok(())
}

pub async fn logout(session: Session) -> Result<Redirect, AppError> {
    credentials::clear(&session).await.map_err(session_error)?;
    tracing::info!("Drive credentials cleared");
    Ok(Redirect::to("/"))
}
