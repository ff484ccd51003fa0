use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

mod app;
mod error;
mod http;
mod orchestrator;
mod session;
mod ws;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "termhub_gateway=info".into()),
        )
        .init();

    let config_path = std::env::var("TERMHUB_CONFIG").ok();
    let mut config = termhub_core::TermhubConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({e}), using defaults");
        termhub_core::TermhubConfig::default()
    });

    // The bare `PORT` env var takes precedence over both the config file and
    // `TERMHUB_GATEWAY_PORT` — this is the convention callers of this binary
    // expect (platform-provided port assignment).
    if let Ok(port) = std::env::var("PORT") {
        match port.parse() {
            Ok(port) => config.gateway.port = port,
            Err(e) => tracing::warn!("ignoring invalid PORT env var ({e})"),
        }
    }

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let state = Arc::new(app::AppState::new(config)?);
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("termhub gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
