use std::collections::HashSet;

use anyhow::anyhow;
use axum::{body::Bytes, extract::State, Json};
use service_core::error::AppError;
use tower_sessions::Session;

use super::{build_drive_client, parse_body};
use crate::services::search::{self, SearchRequest, SearchResponse};
use crate::AppState;

pub async fn search_drive(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> Result<Json<SearchResponse>, AppError> {
    let request: SearchRequest = parse_body(&body, "Invalid JSON payload")?;

    let words = search::tokenize(&request.query);
    if words.is_empty() {
        return Ok(Json(SearchResponse::empty()));
    }

    let drive = build_drive_client(&state, &session).await?;
    let selected_ids: HashSet<String> = request.selected_ids.into_iter().collect();

    let results = search::search(
        &drive,
        &words,
        &selected_ids,
        state.settings.drive.search_page_size,
    )
    .await
    .map_err(|e| AppError::Upstream(anyhow!("Search failed: {}", e)))?;

    tracing::info!(
        words = words.len(),
        selected_by_name = results.selected.by_name.len(),
        global_by_name = results.global.by_name.len(),
        selected_by_fulltext = results.selected.by_fulltext.len(),
        global_by_fulltext = results.global.by_fulltext.len(),
        "Search completed"
    );

    Ok(Json(SearchResponse::Found(results)))
}
