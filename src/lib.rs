pub mod aggregator;
pub mod api;
pub mod chat;
pub mod collector;
pub mod config;
pub mod family;
pub mod generation;
pub mod models;
pub mod prediction;
pub mod records;
pub mod report;
pub mod session;
pub mod wizard;

use tracing_subscriber::EnvFilter;

use crate::api::{start_server, ApiContext, ServerError};
use crate::config::AppConfig;

pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(config)) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn serve(config: AppConfig) -> Result<(), ServerError> {
    let addr = config.bind_addr;
    tracing::info!(
        prediction_url = %config.prediction_url,
        fhir_base_url = %config.fhir_base_url,
        timeout_secs = config.request_timeout_secs,
        "Configured services"
    );

    let ctx = ApiContext::from_config(config)?;
    let mut server = start_server(ctx, addr).await?;
    tracing::info!(
        addr = %server.session.server_addr,
        session_id = %server.session.session_id,
        "Listening"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for shutdown signal: {e}");
    }
    server.shutdown();
    server.wait().await;
    Ok(())
}
