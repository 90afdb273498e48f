use duet_core::{ErrorKind, MemberId, RoomId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("room {0} is full")]
    RoomFull(RoomId),

    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    #[error("no counterpart present in room {0}")]
    PeerAbsent(RoomId),

    #[error("member {member} is not in room {room}")]
    NotAMember { room: RoomId, member: MemberId },

    /// The room's event loop shut down while the command was in flight.
    #[error("room {0} closed")]
    RoomClosed(RoomId),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::RoomFull(_) => ErrorKind::RoomFull,
            RegistryError::PeerAbsent(_) => ErrorKind::PeerAbsent,
            RegistryError::RoomNotFound(_)
            | RegistryError::NotAMember { .. }
            | RegistryError::RoomClosed(_) => ErrorKind::RoomNotFound,
        }
    }
}
