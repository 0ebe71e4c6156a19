use std::net::SocketAddr;

use peerconnect_server::config::Config;
use peerconnect_server::{app, State};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    let state = State::from_config(&config)?;

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!(%addr, "listening");
    axum::Server::bind(&addr).serve(app(state).into_make_service()).await?;
    Ok(())
}
