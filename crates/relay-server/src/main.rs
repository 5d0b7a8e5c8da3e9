#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use relay_server::config::{Args, ServerConfig};
use relay_server::metrics::start_probe_server;
use relay_server::registry::Registry;
use relay_server::run;
use relay_server::server::ServerState;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config: ServerConfig = args.into();

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        anyhow::bail!("configuration error: {}", e);
    }

    let listen = config.listen;
    let probe_addr = config.probe_addr;

    let state = Arc::new(ServerState {
        registry: Registry::new(),
        config,
        active_connections: AtomicUsize::new(0),
    });

    let listener = TcpListener::bind(listen).await?;
    info!("bound to {}", listen);

    tokio::spawn({
        let state = Arc::clone(&state);
        async move {
            if let Err(e) = start_probe_server(probe_addr, state).await {
                warn!("probe server error: {}", e);
            }
        }
    });

    tokio::select! {
        result = run(listener, state) => {
            if let Err(e) = result {
                tracing::error!("server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    Ok(())
}
