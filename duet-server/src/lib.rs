mod config;
mod room;
mod signaling;

pub use config::*;
pub use room::*;
pub use signaling::*;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use tracing::info;

/// Shared state handed to every connection worker.
pub struct AppState {
    pub signaling: SignalingService,
    pub registry: RoomRegistry,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        let signaling = SignalingService::new(config.ice_servers.clone());
        let registry = RoomRegistry::with_command_buffer(
            Arc::new(signaling.clone()),
            config.room_command_buffer,
        );

        Self {
            signaling,
            registry,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Bind and serve the signaling endpoint until the process is stopped.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let state = Arc::new(AppState::new(&config));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Signaling server listening on ws://{}/ws", config.bind_addr);

    axum::serve(listener, app)
        .await
        .context("Signaling server stopped")?;
    Ok(())
}
