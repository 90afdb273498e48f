use crate::media::MediaConstraints;
use duet_core::IceServerConfig;
use std::time::Duration;

pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

/// ICE configuration for the media transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_URL.to_owned()],
                username: None,
                credential: None,
            }],
        }
    }
}

/// Per-call settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time allowed between local media becoming ready and the transport connecting.
    pub negotiation_deadline: Duration,
    /// Period of `ElapsedTick` events while connected.
    pub tick_interval: Duration,
    pub constraints: MediaConstraints,
    /// Replaced by the server's `ice_config` when one arrives before the transport exists.
    pub transport: TransportConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            negotiation_deadline: Duration::from_secs(30),
            tick_interval: Duration::from_secs(1),
            constraints: MediaConstraints::default(),
            transport: TransportConfig::default(),
        }
    }
}
