use std::sync::Arc;

use anyhow::Context;

use antibiostock_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `.env` must be loaded before the subscriber reads RUST_LOG/LOG_FORMAT.
    dotenvy::dotenv().ok();
    antibiostock_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let bind_addr = config.http.bind_addr;

    let services = antibiostock_api::app::services::build_services(config)
        .await
        .context("failed to initialize stock store")?;
    let app = antibiostock_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
