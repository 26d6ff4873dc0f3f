use axum::response::IntoResponse;
use service_core::error::AppError;

pub async fn metrics() -> Result<impl IntoResponse, AppError> {
    crate::services::metrics::get_metrics()
        .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))
}
