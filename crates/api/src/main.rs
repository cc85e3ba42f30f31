use std::sync::Arc;

use anyhow::Context;

use assessly_api::app::{self, services};
use assessly_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    assessly_observability::init();

    let config = ApiConfig::from_env();
    let services = Arc::new(services::build_services(&config.jobs));
    let app = app::router(services.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    services.shutdown().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for ctrl-c; shutting down");
    }
}
