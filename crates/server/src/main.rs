mod bootstrap;
mod health;
mod sender;

use std::time::Duration;

use anyhow::Result;

use cartly_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use cartly_core::config::LogFormat::{Compact, Json, Pretty};
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
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let sweeper = std::sync::Arc::clone(&app.lock_manager)
        .spawn_sweeper(Duration::from_secs(app.config.agent.sweep_interval_secs));

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "cartly-server started; inbound webhook ingress is wired by the embedding deployment"
    );

    wait_for_shutdown().await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "cartly-server stopping"
    );
    sweeper.abort();

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
