mod transport_event;
mod webrtc_transport;

pub use transport_event::*;
pub use webrtc_transport::*;

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::media::{LocalMedia, LocalTrack, TrackKind};
use async_trait::async_trait;
use duet_core::{CandidateDescriptor, Payload, SessionDescriptor};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outcome of swapping a local producer on a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// Swapped in place; the remote side keeps receiving on the same stream.
    Replaced,
    /// The transport cannot swap live; a fresh negotiation round is required.
    NeedsRenegotiation,
}

/// The platform's real-time media transport, driven by the negotiation engine.
///
/// Descriptions and candidates stay opaque to the engine; only the transport
/// interprets their payloads.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn attach_media(&self, media: &LocalMedia) -> Result<(), TransportError>;

    /// Create an offer and install it as the local description.
    async fn create_offer(&self) -> Result<Payload, TransportError>;

    /// Create an answer to the applied remote offer and install it locally.
    async fn create_answer(&self) -> Result<Payload, TransportError>;

    async fn apply_remote_description(&self, desc: &SessionDescriptor)
    -> Result<(), TransportError>;

    async fn add_candidate(&self, candidate: &CandidateDescriptor) -> Result<(), TransportError>;

    async fn replace_track(&self, track: &LocalTrack) -> Result<ReplaceOutcome, TransportError>;

    /// Mute or unmute a producer without renegotiating.
    async fn set_track_enabled(&self, kind: TrackKind, enabled: bool)
    -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// Creates one transport per call attempt.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        config: TransportConfig,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError>;
}
