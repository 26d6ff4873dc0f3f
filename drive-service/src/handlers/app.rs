use askama::Template;
use axum::{extract::State, response::IntoResponse};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use tower_sessions::Session;

use super::session_error;
use crate::services::credentials;
use crate::AppState;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub signed_in: bool,
    pub client_id: String,
    pub api_key: String,
    /// JSON array consumed by the Picker's mime filter.
    pub allowed_mimes: String,
}

pub async fn index(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let signed_in = credentials::load(&session)
        .await
        .map_err(session_error)?
        .is_some();

    let mut allowed: Vec<&str> = state.policy.allowed().collect();
    allowed.sort_unstable();
    let allowed_mimes = serde_json::to_string(&allowed)
        .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;

    Ok(IndexTemplate {
        signed_in,
        client_id: state.settings.google.client_id.clone(),
        api_key: state.settings.google.api_key.expose_secret().clone(),
        allowed_mimes,
    })
}

pub async fn health_check() -> &'static str {
    "OK"
}
