//! `raincheck-server`: the raincheck code review API.

use anyhow::{Context, Result};
use raincheck_web::config::LogFormat;
use raincheck_web::{ServerConfig, WebServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();

    let config = ServerConfig::load().context("failed to load server configuration")?;
    init_tracing(config.log_format, "info");

    info!(addr = %config.addr(), analyze_auth = ?config.analyze_auth, "configuration loaded");

    let server = WebServer::from_config(&config)
        .await
        .context("failed to initialize server")?;
    server.start().await
}

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(format: LogFormat, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}
