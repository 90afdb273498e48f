mod descriptor;
mod error;
mod member;
mod negotiation;
mod room;
mod signaling;

pub use descriptor::{CandidateDescriptor, Payload, SdpKind, SessionDescriptor};
pub use error::{ErrorKind, ModelError};
pub use member::{MemberId, Role};
pub use negotiation::NegotiationState;
pub use room::{RoomId, RoomState};
pub use signaling::{IceServerConfig, SignalMessage};
