//! Leela game event-processing server.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod events;
mod notifier;
mod processor;
mod protocol;
mod server;
mod store;

use leela_core::Engine;
use notifier::BroadcastNotifier;
use processor::{EventProcessor, ProcessorConfig};
use server::ServerState;
use store::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse address from env or use default
    let addr: SocketAddr = std::env::var("SERVER_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".into())
        .parse()?;

    info!("Starting Leela server...");

    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(BroadcastNotifier::new(256));
    let processor = EventProcessor::new(
        Engine::standard(),
        store,
        Arc::clone(&notifier),
        ProcessorConfig::default(),
    );

    let state = Arc::new(ServerState::new(processor, notifier));

    server::run_server(addr, state).await
}
