use std::time::Duration;

use anyhow::Result;
use mobicare_core::config::{AppConfig, LoadOptions};
use mobicare_server::bootstrap;
use tokio_util::sync::CancellationToken;

fn init_logging(config: &AppConfig) {
    use mobicare_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        static_dir = %app.config.server.static_dir.display(),
        "mobicare-server listening"
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app.router())
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
    });

    wait_for_shutdown().await;
    shutdown.cancel();
    tracing::info!(
        event_name = "system.server.stopping",
        grace_secs = grace.as_secs(),
        "mobicare-server draining connections"
    );

    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!(
            event_name = "system.server.drain_timeout",
            grace_secs = grace.as_secs(),
            "connections still open after grace period"
        ),
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            error = %error,
            "failed to listen for shutdown signal"
        );
    }
}
