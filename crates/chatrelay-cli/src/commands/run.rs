use std::future::Future;
use std::io;

use anyhow::Result;
use chatrelay_core::channel::ChannelError;
use chatrelay_core::{RelayConfig, RelayHandler};
use tracing::{info, warn};

pub async fn run(config: RelayConfig) -> Result<()> {
    let handler = RelayHandler::from_config(&config);
    if !handler.channel().is_configured() {
        return Err(ChannelError::NotConfigured("Telegram").into());
    }

    let stats = handler.run(shutdown_signal(tokio::signal::ctrl_c())).await;
    println!(
        "Relay stopped: {} replies sent, {} failed",
        stats.handled, stats.failed
    );
    Ok(())
}

/// Resolve once `signal` fires; if it cannot be listened for, never resolve
async fn shutdown_signal<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            warn!("Failed to listen for Ctrl-C, running until the stream ends: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
