use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use service_core::error::AppError;
use tower_sessions::Session;

use super::{build_drive_client, parse_body};
use crate::models::{FetchRequest, FetchResponse};
use crate::services::traversal::Traversal;
use crate::AppState;

/// Echoes the submitted `docs` value back unchanged.
pub async fn metadata(body: Bytes) -> Result<Json<Value>, AppError> {
    let mut payload: Map<String, Value> = parse_body(&body, "bad json")?;

    Ok(Json(
        payload
            .remove("docs")
            .unwrap_or_else(|| Value::Array(Vec::new())),
    ))
}

/// Downloads or exports every selected item, expanding folders.
///
/// Answers 500 when nothing at all was written, even if every item was
/// skipped on purpose.
pub async fn fetch(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: FetchRequest = parse_body(&body, "Invalid JSON payload")?;
    let drive = build_drive_client(&state, &session).await?;

    let selected = request.docs.len();
    let report = Traversal::new(&drive, state.storage.as_ref(), &state.policy)
        .run(request.docs)
        .await
        .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;

    tracing::info!(
        selected = selected,
        downloaded = report.downloaded.len(),
        exported = report.exported,
        folders = report.folders,
        skipped = report.skipped,
        "Fetch completed"
    );

    let status = if report.downloaded.is_empty() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(FetchResponse {
            downloaded: report.downloaded,
        }),
    )
        .into_response())
}
