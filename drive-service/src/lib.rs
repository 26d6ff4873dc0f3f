pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use config::Settings;
use services::{
    oauth::OAuthClient, storage::LocalStorage, storage::Storage, traversal::MimePolicy,
};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state: configuration plus the clients every request reuses.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub http: reqwest::Client,
    pub oauth: Arc<OAuthClient>,
    pub storage: Arc<dyn Storage>,
    pub policy: Arc<MimePolicy>,
}

impl AppState {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("drive-service/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.drive.request_timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        let storage: Arc<dyn Storage> =
            Arc::new(LocalStorage::new(settings.drive.download_dir.clone()));
        let oauth = Arc::new(OAuthClient::new(http.clone(), settings.google.clone()));
        let policy = Arc::new(MimePolicy::from_settings(&settings.drive));

        Ok(Self {
            settings: Arc::new(settings),
            http,
            oauth,
            storage,
            policy,
        })
    }
}
