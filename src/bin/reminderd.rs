use anyhow::{Context, Result};
use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

use reminderd::core::Config;
use reminderd::features::reminders::ReminderScheduler;
use reminderd::http::HttpServer;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting reminder microservice...");

    let scheduler = ReminderScheduler::new();
    let server = Arc::new(HttpServer::new(scheduler.clone(), config.max_connections));
    let handle = server.start(&config.bind_addr).await.map_err(|e| {
        error!("Failed to start HTTP server: {e:#}");
        e
    })?;

    info!(
        "🚀 Reminder microservice running at http://{}",
        handle.local_addr()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    handle
        .shutdown(Duration::from_secs(config.shutdown_grace_secs))
        .await;
    scheduler.shutdown();

    Ok(())
}
