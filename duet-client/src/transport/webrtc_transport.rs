use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::media::{LocalMedia, LocalTrack, TrackKind};
use crate::transport::{
    PeerTransport, ReplaceOutcome, TransportEvent, TransportFactory, TransportState,
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use duet_core::{CandidateDescriptor, Payload, SdpKind, SessionDescriptor};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const STREAM_ID: &str = "duet";

struct LocalSender {
    sender: Arc<RTCRtpSender>,
    track: Arc<TrackLocalStaticSample>,
}

/// `PeerTransport` backed by a webrtc-rs peer connection.
///
/// Local tracks are sample tracks: the embedding application writes encoded frames into
/// [`WebRtcTransport::local_track`]; this crate only wires them into the session.
pub struct WebRtcTransport {
    peer_connection: Arc<RTCPeerConnection>,
    senders: Mutex<HashMap<TrackKind, LocalSender>>,
}

impl WebRtcTransport {
    /// event_tx receives trickled candidates and connection state changes.
    pub async fn new(config: TransportConfig, event_tx: mpsc::Sender<TransportEvent>) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .into_iter()
                .map(|server| RTCIceServer {
                    urls: server.urls,
                    username: server.username.unwrap_or_default(),
                    credential: server.credential.unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_tx = event_tx.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();

                Box::pin(async move {
                    info!("Peer connection state changed: {:?}", s);
                    let state = match s {
                        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => {
                            TransportState::New
                        }
                        RTCPeerConnectionState::Connecting => TransportState::Connecting,
                        RTCPeerConnectionState::Connected => TransportState::Connected,
                        RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
                        RTCPeerConnectionState::Failed => TransportState::Failed,
                        RTCPeerConnectionState::Closed => TransportState::Closed,
                    };
                    let _ = tx.send(TransportEvent::StateChanged(state)).await;
                })
            },
        ));

        let ice_tx = event_tx;
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let Ok(value) = serde_json::to_value(&init) else {
                    return;
                };
                let _ = tx
                    .send(TransportEvent::CandidateGenerated(CandidateDescriptor::new(
                        Payload(value),
                    )))
                    .await;
            })
        }));

        Ok(Self {
            peer_connection,
            senders: Mutex::new(HashMap::new()),
        })
    }

    /// Sample track feeding the producer of `kind`, if one is attached.
    pub async fn local_track(&self, kind: TrackKind) -> Option<Arc<TrackLocalStaticSample>> {
        self.senders
            .lock()
            .await
            .get(&kind)
            .map(|local| Arc::clone(&local.track))
    }

    fn sample_track(track: &LocalTrack) -> Arc<TrackLocalStaticSample> {
        let codec = match track.kind {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
        };
        Arc::new(TrackLocalStaticSample::new(
            codec,
            track.id.clone(),
            STREAM_ID.to_owned(),
        ))
    }

    async fn describe(&self, kind: SdpKind) -> Result<Payload> {
        let description = match kind {
            SdpKind::Offer => self.peer_connection.create_offer(None).await?,
            SdpKind::Answer => self.peer_connection.create_answer(None).await?,
        };
        self.peer_connection
            .set_local_description(description.clone())
            .await
            .context("Failed to set local description")?;

        Ok(Payload(json!({
            "type": sdp_type(kind),
            "sdp": description.sdp,
        })))
    }
}

fn sdp_type(kind: SdpKind) -> &'static str {
    match kind {
        SdpKind::Offer => "offer",
        SdpKind::Answer => "answer",
    }
}

/// Accepts either a bare SDP string or an `{type, sdp}` object.
fn sdp_text(payload: &Payload) -> Result<String> {
    match &payload.0 {
        serde_json::Value::String(sdp) => Ok(sdp.clone()),
        serde_json::Value::Object(fields) => fields
            .get("sdp")
            .and_then(|sdp| sdp.as_str())
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("session description object has no sdp field")),
        _ => Err(anyhow!("unsupported session description payload")),
    }
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    async fn attach_media(&self, media: &LocalMedia) -> Result<(), TransportError> {
        let mut senders = self.senders.lock().await;

        for local in &media.tracks {
            let track = Self::sample_track(local);
            let sender = self
                .peer_connection
                .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .with_context(|| format!("Failed to add {} track", local.kind))?;
            debug!("Attached local {} track {}", local.kind, local.id);
            senders.insert(local.kind, LocalSender { sender, track });
        }
        Ok(())
    }

    async fn create_offer(&self) -> Result<Payload, TransportError> {
        Ok(self.describe(SdpKind::Offer).await?)
    }

    async fn create_answer(&self) -> Result<Payload, TransportError> {
        Ok(self.describe(SdpKind::Answer).await?)
    }

    async fn apply_remote_description(
        &self,
        desc: &SessionDescriptor,
    ) -> Result<(), TransportError> {
        let sdp = sdp_text(&desc.payload)?;
        let description = match desc.kind {
            SdpKind::Offer => RTCSessionDescription::offer(sdp),
            SdpKind::Answer => RTCSessionDescription::answer(sdp),
        }
        .context("Invalid remote description")?;

        self.peer_connection
            .set_remote_description(description)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn add_candidate(&self, candidate: &CandidateDescriptor) -> Result<(), TransportError> {
        let init: RTCIceCandidateInit = serde_json::from_value(candidate.payload.0.clone())
            .context("Failed to parse ICE candidate JSON")?;
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn replace_track(&self, track: &LocalTrack) -> Result<ReplaceOutcome, TransportError> {
        let mut senders = self.senders.lock().await;
        let Some(local) = senders.get_mut(&track.kind) else {
            return Ok(ReplaceOutcome::NeedsRenegotiation);
        };

        let replacement = Self::sample_track(track);
        let swapped = local
            .sender
            .replace_track(Some(
                Arc::clone(&replacement) as Arc<dyn TrackLocal + Send + Sync>
            ))
            .await;

        match swapped {
            Ok(()) => {
                local.track = replacement;
                Ok(ReplaceOutcome::Replaced)
            }
            Err(e) => {
                warn!("Live {} replacement rejected: {}", track.kind, e);
                Ok(ReplaceOutcome::NeedsRenegotiation)
            }
        }
    }

    async fn set_track_enabled(
        &self,
        kind: TrackKind,
        enabled: bool,
    ) -> Result<(), TransportError> {
        let senders = self.senders.lock().await;
        let local = senders
            .get(&kind)
            .ok_or(TransportError::NoTrack(kind.as_str()))?;

        let track = enabled.then(|| Arc::clone(&local.track) as Arc<dyn TrackLocal + Send + Sync>);
        local
            .sender
            .replace_track(track)
            .await
            .with_context(|| format!("Failed to toggle {kind} track"))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.peer_connection
            .close()
            .await
            .context("Failed to close peer connection")?;
        Ok(())
    }
}

/// Builds a [`WebRtcTransport`] per call attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebRtcTransportFactory;

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        config: TransportConfig,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let transport = WebRtcTransport::new(config, events).await?;
        Ok(Arc::new(transport))
    }
}
