use crate::room::{RegistryError, RoomRegistry};
use crate::signaling::SignalingService;
use duet_core::{ErrorKind, MemberId, RoomId, SignalMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Server side of one member's duplex signaling connection.
///
/// Decodes inbound frames, hands membership changes and relays to the registry, and
/// replies through the member's outbound queue. Malformed input is logged and dropped;
/// the connection stays open.
pub struct SignalingChannel {
    member_id: MemberId,
    service: SignalingService,
    registry: RoomRegistry,
    room: Option<RoomId>,
}

impl SignalingChannel {
    /// Register the member's outbound queue and push the ICE configuration.
    pub fn open(
        member_id: MemberId,
        service: SignalingService,
        registry: RoomRegistry,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Self {
        service.add_member(member_id, outbound);
        service.send(
            &member_id,
            &SignalMessage::IceConfig {
                ice_servers: service.get_ice_servers(),
            },
        );

        Self {
            member_id,
            service,
            registry,
            room: None,
        }
    }

    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    pub fn room(&self) -> Option<&RoomId> {
        self.room.as_ref()
    }

    pub async fn handle_text(&mut self, text: &str) {
        match SignalMessage::decode(text) {
            Ok(msg) => self.handle_message(msg).await,
            Err(e) => warn!("Malformed message from {}: {}", self.member_id, e),
        }
    }

    pub async fn handle_message(&mut self, msg: SignalMessage) {
        debug!("<- {} {}", self.member_id, msg.kind());

        match msg {
            SignalMessage::Join { room_id } => self.join(room_id).await,

            SignalMessage::Leave { room_id } => {
                if self.room.as_ref() == Some(&room_id) {
                    self.leave().await;
                } else {
                    warn!(
                        "Member {} asked to leave room {} it is not in",
                        self.member_id, room_id
                    );
                }
            }

            msg if msg.is_relayable() => self.relay(msg).await,

            other => warn!(
                "Dropping server-only message {} from {}",
                other.kind(),
                self.member_id
            ),
        }
    }

    /// Channel closure implies leaving the current room.
    pub async fn close(mut self) {
        self.leave().await;
        self.service.remove_member(&self.member_id);
        info!("Signaling channel closed for {}", self.member_id);
    }

    /// The previous room is left only once the new one has accepted the member.
    async fn join(&mut self, room_id: RoomId) {
        match self.registry.join(&room_id, self.member_id).await {
            Ok(outcome) => {
                info!(
                    "Member {} is {} in room {} (peer present: {})",
                    self.member_id, outcome.role, room_id, outcome.peer_present
                );
                if let Some(previous) = self.room.replace(room_id) {
                    if Some(&previous) != self.room.as_ref() {
                        self.registry.leave(&previous, self.member_id).await;
                    }
                }
            }
            // The room already told the joiner with `room_full`.
            Err(RegistryError::RoomFull(_)) => {}
            Err(e) => {
                warn!("Join of {} to {} failed: {}", self.member_id, room_id, e);
                self.report(Some(room_id), e.kind());
            }
        }
    }

    async fn leave(&mut self) {
        let Some(room_id) = self.room.take() else {
            return;
        };
        self.registry.leave(&room_id, self.member_id).await;
    }

    async fn relay(&mut self, msg: SignalMessage) {
        let Some(room_id) = msg.room_id().cloned() else {
            return;
        };
        let kind = msg.kind();

        if let Err(e) = self.registry.relay(&room_id, self.member_id, msg).await {
            debug!("Relay of {} from {} dropped: {}", kind, self.member_id, e);
            self.report(Some(room_id), e.kind());
        }
    }

    fn report(&self, room_id: Option<RoomId>, kind: ErrorKind) {
        self.service
            .send(&self.member_id, &SignalMessage::Error { room_id, kind });
    }
}
