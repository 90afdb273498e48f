use async_trait::async_trait;
use duet_core::{MemberId, SignalMessage};

/// Outbound half of the signaling layer, used by rooms to reach their members.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Deliver `msg` to a member's channel. Returns `false` if the member is not connected.
    async fn send_signal(&self, member_id: &MemberId, msg: SignalMessage) -> bool;
}
