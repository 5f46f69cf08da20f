mod bootstrap;
mod delivery;
mod entry;
mod health;
mod modules;
mod verify;

use anyhow::Result;
use parley_core::config::{AppConfig, LoadOptions};
use tracing::info;

fn init_logging(config: &AppConfig) {
    use parley_core::config::LogFormat::*;
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

    let application = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &application.config.server.bind_address,
        application.config.server.health_check_port,
    )
    .await?;

    if application.config.server.register_commands {
        application.push_commands().await?;
        info!(
            event_name = "system.server.commands_pushed",
            "global command registration replaced"
        );
    }

    let address = format!(
        "{}:{}",
        application.config.server.bind_address, application.config.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.server.started",
        bind_address = %address,
        "webhook endpoint listening"
    );

    axum::serve(listener, entry::router(application.gateway.clone()))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    info!(event_name = "system.server.stopping", "parley-server stopping");

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
