use async_trait::async_trait;
use duet_client::{
    LocalMedia, LocalTrack, PeerTransport, ReplaceOutcome, TrackKind, TransportConfig,
    TransportError, TransportEvent, TransportFactory, TransportState,
};
use duet_core::{CandidateDescriptor, Payload, SdpKind, SessionDescriptor};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

/// Everything the engine asked of a transport, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    AttachMedia(usize),
    CreateOffer,
    CreateAnswer,
    RemoteDescription(SdpKind),
    Candidate(Payload),
    ReplaceTrack(String),
    SetTrackEnabled(TrackKind, bool),
    Close,
}

/// Mock PeerTransport that records calls and lets tests drive state changes.
pub struct MockTransport {
    calls: Mutex<Vec<TransportCall>>,
    events: mpsc::Sender<TransportEvent>,
    replace_outcome: ReplaceOutcome,
    reject_remote: bool,
    reject_candidates: bool,
    offers: AtomicUsize,
}

impl MockTransport {
    pub fn new(events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            events,
            replace_outcome: ReplaceOutcome::Replaced,
            reject_remote: false,
            reject_candidates: false,
            offers: AtomicUsize::new(0),
        }
    }

    /// Standalone transport for driving the engine directly.
    pub fn standalone() -> (Arc<Self>, mpsc::Receiver<TransportEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (Arc::new(Self::new(tx)), rx)
    }

    pub fn with_replace_outcome(mut self, outcome: ReplaceOutcome) -> Self {
        self.replace_outcome = outcome;
        self
    }

    pub fn rejecting_remote(mut self) -> Self {
        self.reject_remote = true;
        self
    }

    /// Every remote candidate fails to parse, as a garbled blob would.
    pub fn rejecting_candidates(mut self) -> Self {
        self.reject_candidates = true;
        self
    }

    pub async fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().await.clone()
    }

    pub async fn close_count(&self) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| **call == TransportCall::Close)
            .count()
    }

    pub async fn candidates(&self) -> Vec<Payload> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                TransportCall::Candidate(payload) => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn emit_state(&self, state: TransportState) {
        let _ = self.events.send(TransportEvent::StateChanged(state)).await;
    }

    pub async fn emit_candidate(&self, payload: Payload) {
        let _ = self
            .events
            .send(TransportEvent::CandidateGenerated(CandidateDescriptor::new(
                payload,
            )))
            .await;
    }

    /// Poll until a recorded call satisfies `pred`.
    pub async fn wait_for_call(&self, pred: impl Fn(&TransportCall) -> bool) -> bool {
        for _ in 0..400 {
            if self.calls.lock().await.iter().any(&pred) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    async fn record(&self, call: TransportCall) {
        tracing::debug!("[MockTransport] {:?}", call);
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn attach_media(&self, media: &LocalMedia) -> Result<(), TransportError> {
        self.record(TransportCall::AttachMedia(media.tracks.len()))
            .await;
        Ok(())
    }

    async fn create_offer(&self) -> Result<Payload, TransportError> {
        self.record(TransportCall::CreateOffer).await;
        let n = self.offers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Payload(json!({"type": "offer", "sdp": format!("mock offer {n}")})))
    }

    async fn create_answer(&self) -> Result<Payload, TransportError> {
        self.record(TransportCall::CreateAnswer).await;
        Ok(Payload(json!({"type": "answer", "sdp": "mock answer"})))
    }

    async fn apply_remote_description(
        &self,
        desc: &SessionDescriptor,
    ) -> Result<(), TransportError> {
        if self.reject_remote {
            return Err(anyhow::anyhow!("remote description rejected").into());
        }
        self.record(TransportCall::RemoteDescription(desc.kind)).await;
        Ok(())
    }

    async fn add_candidate(&self, candidate: &CandidateDescriptor) -> Result<(), TransportError> {
        self.record(TransportCall::Candidate(candidate.payload.clone()))
            .await;
        if self.reject_candidates {
            return Err(anyhow::anyhow!("Failed to parse ICE candidate JSON").into());
        }
        Ok(())
    }

    async fn replace_track(&self, track: &LocalTrack) -> Result<ReplaceOutcome, TransportError> {
        self.record(TransportCall::ReplaceTrack(track.id.clone()))
            .await;
        Ok(self.replace_outcome)
    }

    async fn set_track_enabled(
        &self,
        kind: TrackKind,
        enabled: bool,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::SetTrackEnabled(kind, enabled))
            .await;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.record(TransportCall::Close).await;
        Ok(())
    }
}

/// Hands out MockTransports and keeps them for inspection.
#[derive(Clone)]
pub struct MockTransportFactory {
    created: Arc<Mutex<Vec<Arc<MockTransport>>>>,
    replace_outcome: ReplaceOutcome,
    reject_candidates: bool,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self {
            created: Arc::new(Mutex::new(Vec::new())),
            replace_outcome: ReplaceOutcome::Replaced,
            reject_candidates: false,
        }
    }

    /// Transports that cannot swap producers live.
    pub fn without_live_replace() -> Self {
        Self {
            replace_outcome: ReplaceOutcome::NeedsRenegotiation,
            ..Self::new()
        }
    }

    /// Transports whose `add_candidate` always fails.
    pub fn rejecting_candidates() -> Self {
        Self {
            reject_candidates: true,
            ..Self::new()
        }
    }

    pub async fn created_count(&self) -> usize {
        self.created.lock().await.len()
    }

    /// Poll until the session has created its transport.
    pub async fn wait_for_transport(&self) -> Option<Arc<MockTransport>> {
        for _ in 0..400 {
            if let Some(transport) = self.created.lock().await.first() {
                return Some(Arc::clone(transport));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create(
        &self,
        _config: TransportConfig,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let mut transport = MockTransport::new(events).with_replace_outcome(self.replace_outcome);
        if self.reject_candidates {
            transport = transport.rejecting_candidates();
        }
        let transport = Arc::new(transport);
        self.created.lock().await.push(Arc::clone(&transport));
        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_records_calls_in_order() {
        let (transport, mut events) = MockTransport::standalone();

        transport.create_offer().await.unwrap();
        transport
            .add_candidate(&CandidateDescriptor::new(Payload::text("c1")))
            .await
            .unwrap();
        transport.close().await.unwrap();

        assert_eq!(
            transport.calls().await,
            vec![
                TransportCall::CreateOffer,
                TransportCall::Candidate(Payload::text("c1")),
                TransportCall::Close,
            ]
        );
        assert_eq!(transport.close_count().await, 1);

        transport.emit_state(TransportState::Connected).await;
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::StateChanged(TransportState::Connected))
        );
    }
}
