use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use spindle_core::EngineBuilder;
use spindle_server::{AppState, ServerConfig, build_router, operations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .init();

    let config = ServerConfig::load()?;

    let builder = EngineBuilder::new().config(config.engine.clone());
    let scheduler = operations::register_builtin(builder)?
        .expect_operations(operations::BUILTIN)
        .build()?;
    let state = Arc::new(AppState::new(scheduler));
    let app = build_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    info!(
        addr = %config.addr(),
        concurrency = config.engine.concurrency,
        queue_capacity = config.engine.queue_capacity,
        "Server listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let report = state.scheduler.shutdown().await;
    info!(drained = report.drained, abandoned = report.abandoned, "Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received; draining");
}
