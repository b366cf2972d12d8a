use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::info;

mod api;
mod config;
mod error;
mod render;
mod selection;
mod service;

use crate::config::AppConfig;
use crate::service::SheetService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!("Starting sheetsnap service v{}", env!("CARGO_PKG_VERSION"));

    // Optional config file, then SHEETSNAP__* environment overrides
    let config = Arc::new(AppConfig::load()?);

    info!(
        host = %config.server.host,
        port = config.server.port,
        max_upload_bytes = config.limits.max_upload_bytes,
        "Configuration loaded"
    );

    let metrics = PrometheusBuilder::new().install_recorder()?;

    let service = Arc::new(SheetService::new(config.clone())?);

    // Build the router
    let app = api::router(service, metrics);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sheetsnap_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
