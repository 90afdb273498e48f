use crate::room::RegistryError;
use duet_core::{MemberId, Role, RoomState, SignalMessage};
use tokio::sync::oneshot;

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    pub role: Role,
    pub peer_present: bool,
}

/// Point-in-time view of a room, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub state: RoomState,
    pub members: Vec<(MemberId, Role)>,
}

/// Commands processed one at a time by a room's event loop.
#[derive(Debug)]
pub enum RoomCommand {
    /// A member asks for a slot. Rejected with `RoomFull` when both slots are taken.
    Join {
        member_id: MemberId,
        reply: oneshot::Sender<Result<JoinOutcome, RegistryError>>,
    },

    /// Explicit leave or closed signaling channel.
    Leave {
        member_id: MemberId,
        reply: oneshot::Sender<bool>,
    },

    /// Forward a message verbatim to the other member.
    Relay {
        from: MemberId,
        message: SignalMessage,
        reply: oneshot::Sender<Result<(), RegistryError>>,
    },

    Inspect {
        reply: oneshot::Sender<RoomSnapshot>,
    },
}
