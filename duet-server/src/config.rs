use anyhow::{Context, Result};
use duet_core::IceServerConfig;
use std::env;
use std::net::SocketAddr;

pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

/// Signaling server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Pushed to every client in `ice_config` on connect.
    pub ice_servers: Vec<IceServerConfig>,
    /// Capacity of each room's command queue.
    pub room_command_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_URL.to_owned()],
                username: None,
                credential: None,
            }],
            room_command_buffer: 100,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `DUET_BIND`, `TURN_URL`, `TURN_USERNAME` and `TURN_CREDENTIAL`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(bind) = env::var("DUET_BIND") {
            config.bind_addr = bind
                .parse()
                .with_context(|| format!("DUET_BIND is not a socket address: {bind}"))?;
        }

        if let Ok(turn_url) = env::var("TURN_URL") {
            config.ice_servers.push(IceServerConfig {
                urls: vec![turn_url],
                username: env::var("TURN_USERNAME").ok(),
                credential: env::var("TURN_CREDENTIAL").ok(),
            });
        }

        Ok(config)
    }
}
