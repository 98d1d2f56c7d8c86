mod bootstrap;
mod digest;
mod health;
mod service;
mod slack_api;
mod socket_transport;

use std::time::Duration;

use anyhow::Result;
use docket_core::config::{AppConfig, LoadOptions};

use crate::health::HealthState;

fn init_logging(config: &AppConfig) {
    use docket_core::config::LogFormat::*;
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
    // Logging needs the config, so load it before anything else.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        HealthState::new(app.repo.clone()),
    )
    .await?;

    let mut scheduler = match &app.digest {
        Some(digest) => digest.clone().schedule(&app.config.schedule).await?,
        None => None,
    };

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let runner = app.slack_runner;
    let mut socket_task = tokio::spawn(async move { runner.start().await });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "docket-server started"
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                "shutdown signal received"
            );
            socket_task.abort();
        }
        outcome = &mut socket_task => {
            tracing::warn!(
                event_name = "system.server.socket_stopped",
                correlation_id = "shutdown",
                finished_cleanly = matches!(outcome, Ok(Ok(()))),
                "socket mode runner stopped"
            );
        }
    }

    if let Some(scheduler) = scheduler.as_mut() {
        match tokio::time::timeout(grace, scheduler.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => tracing::warn!(
                event_name = "system.server.scheduler_shutdown_failed",
                correlation_id = "shutdown",
                error = %error,
                "digest scheduler did not shut down cleanly"
            ),
            Err(_) => tracing::warn!(
                event_name = "system.server.scheduler_shutdown_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "digest scheduler shutdown timed out"
            ),
        }
    }

    tracing::info!(event_name = "system.server.stopped", correlation_id = "shutdown", "docket-server stopped");
    Ok(())
}
