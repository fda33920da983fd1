//! API Server Binary Entry Point

use anyhow::Context;
use receipt_api_server::{start_server, ApiState, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "receipt_api_server=info,receipt_fusion=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("Invalid server configuration")?;

    tracing::info!("Starting Receipt Analyzer API Server");
    let state = ApiState::from_config(&config);

    start_server(&config.addr, state, &config.cors_origins)
        .await
        .with_context(|| format!("Server on {} stopped", config.addr))?;

    Ok(())
}
