//! Shadowbox Manager REST Service: loads persisted state, starts the proxy
//! and scraper supervisors, the limit-enforcement tick, and the metrics
//! publisher, then serves the admin REST API.

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use shadowbox_server::cli::Cli;
use shadowbox_server::state::AppState;
use shadowbox_server::router;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("shadowbox-server starting");

    let state = AppState::new(&cli).await?;
    let app = router::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.api_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
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

    info!("shutdown signal received, draining in-flight requests");
}
