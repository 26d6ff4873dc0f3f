use dotenvy::dotenv;
use drive_service::config::get_configuration;
use drive_service::startup::build_router;
use drive_service::AppState;
use service_core::observability::logging::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "drive-service",
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    )?;

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    info!(
        download_dir = %configuration.drive.download_dir.display(),
        allowed_mime_types = configuration.drive.allowed_mime_types.len(),
        "Loaded configuration"
    );

    let state = AppState::new(configuration)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting drive-service on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
