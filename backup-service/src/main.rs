use backup_service::config::BackupConfig;
use backup_service::startup::build_router;
use backup_service::AppState;
use dotenvy::dotenv;
use service_core::observability::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = BackupConfig::load().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        &configuration.service_name,
        &configuration.log_level,
        configuration.otlp_endpoint.as_deref(),
    );

    backup_service::services::metrics::init_metrics()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics recorder: {}", e))?;

    let address = format!(
        "{}:{}",
        configuration.common.host, configuration.common.port
    );
    let modules = configuration.backup.modules.len();

    let state = AppState::new(configuration).map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize application state");
        anyhow::anyhow!("Startup error: {}", e)
    })?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!(modules, "Starting backup-service on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
