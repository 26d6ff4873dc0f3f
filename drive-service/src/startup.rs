use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::middleware::{request_id_middleware, request_id_of};
use time::Duration;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::handlers::{
    app::{health_check, index},
    auth::{login, logout, oauth2callback},
    documents::{fetch, metadata},
    search::search_drive,
};
use crate::middleware::metrics_middleware;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    // Session setup
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(state.settings.server.secure_cookies)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            state.settings.server.session_ttl_hours,
        )));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(crate::handlers::metrics::metrics))
        .route("/login", get(login))
        .route("/oauth2callback", get(oauth2callback))
        .route("/logout", get(logout))
        .route("/metadata", post(metadata))
        .route("/fetch", post(fetch))
        .route("/search", post(search_drive))
        .route_layer(from_fn(metrics_middleware))
        .layer(session_layer)
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    request_id = %request_id_of(request),
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
