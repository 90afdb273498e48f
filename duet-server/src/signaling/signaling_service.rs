use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use dashmap::DashMap;
use duet_core::{IceServerConfig, MemberId, SignalMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

struct SignalingInner {
    members: DashMap<MemberId, mpsc::UnboundedSender<String>>,
    ice_servers: Vec<IceServerConfig>,
}

/// Registry of connected members' outbound queues. Messages are encoded once here and
/// written to the socket by each connection's writer task.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                members: DashMap::new(),
                ice_servers,
            }),
        }
    }

    pub fn get_ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.ice_servers.clone()
    }

    pub fn add_member(&self, member_id: MemberId, tx: mpsc::UnboundedSender<String>) {
        self.inner.members.insert(member_id, tx);
    }

    pub fn remove_member(&self, member_id: &MemberId) {
        self.inner.members.remove(member_id);
    }

    pub fn is_connected(&self, member_id: &MemberId) -> bool {
        self.inner.members.contains_key(member_id)
    }

    pub fn send(&self, member_id: &MemberId, msg: &SignalMessage) -> bool {
        let Some(member) = self.inner.members.get(member_id) else {
            warn!(
                "Attempted to send {} to disconnected member {}",
                msg.kind(),
                member_id
            );
            return false;
        };

        let json = match msg.encode() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize signal message: {}", e);
                return false;
            }
        };

        debug!("-> {} {}", member_id, msg.kind());
        if let Err(e) = member.send(json) {
            error!("Failed to queue message for {}: {:?}", member_id, e);
            return false;
        }
        true
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn send_signal(&self, member_id: &MemberId, msg: SignalMessage) -> bool {
        self.send(member_id, &msg)
    }
}
