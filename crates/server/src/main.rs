mod api;
mod bootstrap;
mod health;
mod llm_http;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use shopmate_core::config::{AppConfig, LoadOptions};
use tower_http::trace::TraceLayer;

use crate::bootstrap::Services;

fn init_logging(config: &AppConfig) {
    use shopmate_core::config::LogFormat::*;
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

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let services = Arc::new(bootstrap::bootstrap_with_config(config)?);
    if services.config.sync.on_start {
        tokio::spawn(initial_sync(services.clone()));
    }

    let app = api::router(services.clone())
        .merge(health::router(services.index.clone()))
        .layer(TraceLayer::new_for_http());

    let address = format!("{}:{}", services.config.server.bind_address, services.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "shopmate-server listening"
    );

    let grace = Duration::from_secs(services.config.server.graceful_shutdown_secs);
    axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown(grace)).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "shopmate-server stopped"
    );
    Ok(())
}

/// Catalog and coupon refresh at startup. Failures leave the server up with
/// whatever the index already holds.
async fn initial_sync(services: Arc<Services>) {
    match services.sync.refresh_all().await {
        Ok(report) => tracing::info!(
            event_name = "system.sync.completed",
            correlation_id = "bootstrap",
            products = report.products,
            categories = report.categories,
            coupons = report.coupons,
            "initial catalog sync completed"
        ),
        Err(error) => tracing::warn!(
            event_name = "system.sync.failed",
            correlation_id = "bootstrap",
            error = %error,
            "initial catalog sync failed"
        ),
    }
}

async fn wait_for_shutdown(grace: Duration) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "could not listen for shutdown signal"
        );
        return;
    }
    tracing::info!(
        event_name = "system.server.draining",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "shutdown requested; draining connections"
    );
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        tracing::warn!(
            event_name = "system.server.forced_exit",
            correlation_id = "shutdown",
            "graceful shutdown window elapsed"
        );
        std::process::exit(0);
    });
}
