use async_trait::async_trait;
use duet_core::{MemberId, SignalMessage};
use duet_server::SignalingOutput;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Mock SignalingOutput that captures every message a room sends.
#[derive(Clone)]
pub struct MockSignalingOutput {
    tx: mpsc::UnboundedSender<(MemberId, SignalMessage)>,
    signals: Arc<Mutex<Vec<(MemberId, SignalMessage)>>>,
    /// Members whose channel is treated as closed.
    disconnected: Arc<Mutex<HashSet<MemberId>>>,
}

impl MockSignalingOutput {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(MemberId, SignalMessage)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            tx,
            signals: Arc::new(Mutex::new(Vec::new())),
            disconnected: Arc::new(Mutex::new(HashSet::new())),
        };
        (signaling, rx)
    }

    pub async fn disconnect(&self, member_id: MemberId) {
        self.disconnected.lock().await.insert(member_id);
    }

    /// All messages delivered to `member_id`, in delivery order.
    pub async fn messages_for(&self, member_id: &MemberId) -> Vec<SignalMessage> {
        self.signals
            .lock()
            .await
            .iter()
            .filter(|(id, _)| id == member_id)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub async fn kinds_for(&self, member_id: &MemberId) -> Vec<&'static str> {
        self.messages_for(member_id)
            .await
            .iter()
            .map(SignalMessage::kind)
            .collect()
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn send_signal(&self, member_id: &MemberId, msg: SignalMessage) -> bool {
        tracing::debug!("[MockSignaling] {} to {}", msg.kind(), member_id);

        if self.disconnected.lock().await.contains(member_id) {
            return false;
        }

        self.signals.lock().await.push((*member_id, msg.clone()));
        let _ = self.tx.send((*member_id, msg));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_core::RoomId;

    #[tokio::test]
    async fn test_mock_signaling_captures_messages() {
        let (signaling, mut rx) = MockSignalingOutput::new();
        let member = MemberId::new();
        let room_id = RoomId::parse("abc123").unwrap();

        assert!(
            signaling
                .send_signal(&member, SignalMessage::PeerLeft { room_id })
                .await
        );

        let (to, msg) = rx.recv().await.unwrap();
        assert_eq!(to, member);
        assert_eq!(msg.kind(), "peer_left");
        assert_eq!(signaling.kinds_for(&member).await, vec!["peer_left"]);
    }

    #[tokio::test]
    async fn test_mock_signaling_refuses_disconnected() {
        let (signaling, _rx) = MockSignalingOutput::new();
        let member = MemberId::new();
        signaling.disconnect(member).await;

        let room_id = RoomId::parse("abc123").unwrap();
        assert!(
            !signaling
                .send_signal(&member, SignalMessage::PeerJoined { room_id })
                .await
        );
        assert!(signaling.messages_for(&member).await.is_empty());
    }
}
