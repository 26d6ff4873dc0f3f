pub mod app;
pub mod auth;
pub mod documents;
pub mod metrics;
pub mod search;

use serde::de::DeserializeOwned;
use serde_json::Value;
use service_core::error::AppError;
use tower_sessions::{session, Session};

use crate::services::{credentials, DriveClient};
use crate::AppState;

/// Build a Drive client from the session credential, refreshing it if needed.
/// Every auth failure collapses into the same 400 for the caller.
pub(crate) async fn build_drive_client(
    state: &AppState,
    session: &Session,
) -> Result<DriveClient, AppError> {
    let credential = credentials::authorize(session, &state.oauth)
        .await
        .map_err(|e| {
            if e.is_unauthenticated() {
                tracing::warn!(error = %e, "Drive credentials unavailable");
                AppError::bad_request("Missing or expired Drive credentials")
            } else {
                AppError::InternalError(anyhow::Error::new(e))
            }
        })?;

    Ok(DriveClient::new(
        state.http.clone(),
        state.settings.drive.api_base.clone(),
        credential.token,
    ))
}

/// Request bodies must be JSON objects; arrays and scalars are rejected even
/// when they would line up with the target struct's fields.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8], message: &str) -> Result<T, AppError> {
    let reject = |e: &dyn std::fmt::Display| {
        tracing::debug!(error = %e, "Rejected request body");
        AppError::bad_request(message)
    };

    let payload: Value = serde_json::from_slice(body).map_err(|e| reject(&e))?;
    if !payload.is_object() {
        return Err(reject(&"body is not a JSON object"));
    }

    serde_json::from_value(payload).map_err(|e| reject(&e))
}

pub(crate) fn session_error(err: session::Error) -> AppError {
    AppError::InternalError(anyhow::Error::new(err))
}
