use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use activity_relay::config::ServerArgs;
use activity_relay::server::{self, AppState};
use activity_relay::telemetry::init_logging;

/// Relay server
/// Producers POST /log, dashboards subscribe over the websocket
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging("info,tower_http=info");
    let args = ServerArgs::parse();

    let addr = args.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Server running on http://{}", addr);
    info!("WebSocket running on ws://{}", addr);

    server::serve(listener, AppState::default(), shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
