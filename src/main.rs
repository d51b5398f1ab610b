//! FinHub server entry point

use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use finhub::config::ServerConfig;
use finhub::handlers::{self, AppContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    config.print_summary();

    let context = Arc::new(AppContext::new(config.clone())?);

    // Background jobs share the request path's store and dispatcher.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let runner = context.job_runner();
    let runner_handle = runner.spawn(config.scheduler_interval_secs, shutdown_rx);

    let app = handlers::build_router(context.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(ConcurrencyLimitLayer::new(1024));

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!("listening on http://{}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the scheduler, then flush whatever the store buffers.
    let _ = shutdown_tx.send(true);
    if let Err(e) = runner_handle.await {
        error!(error = %e, "job runner did not stop cleanly");
    }
    if let Err(e) = context.store.flush() {
        error!(error = %e, "store flush on shutdown failed");
    }
    info!("shutdown complete");

    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
