use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info};

use server::config::ServerConfig;
use server::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    // Read before logging starts; `DEBUG` picks the default filter.
    let config = ServerConfig::from_env();
    let default_filter = config.as_ref().map(ServerConfig::log_filter).unwrap_or("info");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let config = config.map_err(|e| {
        error!("Invalid configuration: {e}");
        e
    })?;
    async_main(config).await
}

async fn async_main(config: ServerConfig) -> anyhow::Result<()> {
    info!("Starting chat relay server...");
    info!(
        "Server configuration loaded: port={}, debug={}, llm_timeout={}s, request_timeout={}s",
        config.port, config.debug, config.llm_timeout_secs, config.request_timeout_secs
    );

    let port = config.port;
    let state = AppState::from_config(config).await?;
    let app = build_app(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
