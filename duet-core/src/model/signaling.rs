use crate::model::descriptor::Payload;
use crate::model::error::{ErrorKind, ModelError};
use crate::model::member::Role;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Structured message exchanged over a signaling channel.
///
/// Encoded as a flat JSON object: `{"type": "offer", "roomId": "abc123", "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SignalMessage {
    Join {
        room_id: RoomId,
    },
    Offer {
        room_id: RoomId,
        payload: Payload,
    },
    Answer {
        room_id: RoomId,
        payload: Payload,
    },
    Candidate {
        room_id: RoomId,
        payload: Payload,
    },
    Leave {
        room_id: RoomId,
    },
    RoomFull {
        room_id: RoomId,
    },
    Joined {
        room_id: RoomId,
        role: Role,
        peer_present: bool,
    },
    PeerJoined {
        room_id: RoomId,
    },
    PeerLeft {
        room_id: RoomId,
    },
    /// Responder asking the Initiator to open a fresh negotiation round.
    Renegotiate {
        room_id: RoomId,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
        kind: ErrorKind,
    },
    IceConfig {
        ice_servers: Vec<IceServerConfig>,
    },
}

impl SignalMessage {
    pub fn decode(text: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            SignalMessage::Join { room_id }
            | SignalMessage::Offer { room_id, .. }
            | SignalMessage::Answer { room_id, .. }
            | SignalMessage::Candidate { room_id, .. }
            | SignalMessage::Leave { room_id }
            | SignalMessage::RoomFull { room_id }
            | SignalMessage::Joined { room_id, .. }
            | SignalMessage::PeerJoined { room_id }
            | SignalMessage::PeerLeft { room_id }
            | SignalMessage::Renegotiate { room_id } => Some(room_id),
            SignalMessage::Error { room_id, .. } => room_id.as_ref(),
            SignalMessage::IceConfig { .. } => None,
        }
    }

    /// Messages a member may ask the registry to forward to its counterpart.
    pub fn is_relayable(&self) -> bool {
        matches!(
            self,
            SignalMessage::Offer { .. }
                | SignalMessage::Answer { .. }
                | SignalMessage::Candidate { .. }
                | SignalMessage::Renegotiate { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SignalMessage::Join { .. } => "join",
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::Candidate { .. } => "candidate",
            SignalMessage::Leave { .. } => "leave",
            SignalMessage::RoomFull { .. } => "room_full",
            SignalMessage::Joined { .. } => "joined",
            SignalMessage::PeerJoined { .. } => "peer_joined",
            SignalMessage::PeerLeft { .. } => "peer_left",
            SignalMessage::Renegotiate { .. } => "renegotiate",
            SignalMessage::Error { .. } => "error",
            SignalMessage::IceConfig { .. } => "ice_config",
        }
    }
}
