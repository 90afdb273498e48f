use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid room id {0:?}: expected 6-8 alphanumeric characters")]
    InvalidRoomId(String),

    #[error("invalid member id {0:?}")]
    InvalidMemberId(String),

    #[error("malformed signal message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failure classification shared by the wire contract and the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[error("camera or microphone access was denied")]
    MediaAccessDenied,

    #[error("the room already has two participants")]
    RoomFull,

    #[error("malformed signaling message")]
    MalformedMessage,

    #[error("signaling connection lost")]
    SignalingDisconnected,

    #[error("call could not be established in time")]
    NegotiationTimeout,

    #[error("the other participant disconnected")]
    PeerDisconnected,

    #[error("the media transport rejected the session")]
    NegotiationFailed,

    #[error("the other participant is not in the room")]
    PeerAbsent,

    #[error("room does not exist")]
    RoomNotFound,
}
