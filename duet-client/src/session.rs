use crate::config::SessionConfig;
use crate::engine::{NegotiationEngine, Outbound};
use crate::error::{MediaError, NegotiationError};
use crate::link::SignalingLink;
use crate::media::{FacingMode, LocalMedia, MediaConstraints, MediaSource, TrackKind, VideoSource};
use crate::supervisor::ConnectionSupervisor;
use crate::transport::{TransportEvent, TransportFactory};
use duet_core::{
    CandidateDescriptor, ErrorKind, NegotiationState, Role, RoomId, SdpKind, SessionDescriptor,
    SignalMessage,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Lifecycle notifications for the view layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    Joined { role: Role, peer_present: bool },
    PeerJoined,
    StateChanged(NegotiationState),
    Connected,
    PeerLeft,
    RoomFull,
    Error(ErrorKind),
    /// Whole seconds since Connected.
    ElapsedTick(u64),
    /// Always the last event of a session.
    Ended {
        state: NegotiationState,
        elapsed: Option<Duration>,
    },
}

#[derive(Debug)]
enum CallCommand {
    Hangup { done: oneshot::Sender<()> },
    SetTrackEnabled { kind: TrackKind, enabled: bool },
    FlipCamera,
    StartScreenShare,
    StopScreenShare,
}

/// Command surface of a running call. Dropping every handle hangs up.
#[derive(Clone)]
pub struct CallHandle {
    commands: mpsc::UnboundedSender<CallCommand>,
}

impl CallHandle {
    /// Tear the call down. Idempotent: later calls, or calls after the call
    /// ended on its own, return immediately.
    pub async fn hangup(&self) {
        let (done, rx) = oneshot::channel();
        if self.commands.send(CallCommand::Hangup { done }).is_err() {
            return;
        }
        let _ = rx.await;
    }

    pub fn set_audio_enabled(&self, enabled: bool) {
        self.send(CallCommand::SetTrackEnabled {
            kind: TrackKind::Audio,
            enabled,
        });
    }

    pub fn set_video_enabled(&self, enabled: bool) {
        self.send(CallCommand::SetTrackEnabled {
            kind: TrackKind::Video,
            enabled,
        });
    }

    pub fn flip_camera(&self) {
        self.send(CallCommand::FlipCamera);
    }

    pub fn start_screen_share(&self) {
        self.send(CallCommand::StartScreenShare);
    }

    pub fn stop_screen_share(&self) {
        self.send(CallCommand::StopScreenShare);
    }

    pub fn is_active(&self) -> bool {
        !self.commands.is_closed()
    }

    fn send(&self, cmd: CallCommand) {
        let _ = self.commands.send(cmd);
    }
}

enum MediaResult {
    Initial {
        attempt: u64,
        result: Result<LocalMedia, MediaError>,
    },
    Replacement {
        attempt: u64,
        result: Result<LocalMedia, MediaError>,
    },
}

/// One participant's call: the explicit owner of everything a call needs
/// (signaling link, transport, local media, timers).
pub struct CallSession {
    room_id: RoomId,
    config: SessionConfig,
    link: SignalingLink,
    link_open: bool,
    media_source: Arc<dyn MediaSource>,
    transports: Arc<dyn TransportFactory>,
    engine: NegotiationEngine,
    supervisor: ConnectionSupervisor,
    events: mpsc::UnboundedSender<CallEvent>,
    command_rx: mpsc::UnboundedReceiver<CallCommand>,
    transport_tx: mpsc::Sender<TransportEvent>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    media_tx: mpsc::Sender<MediaResult>,
    media_rx: mpsc::Receiver<MediaResult>,
    /// Bumped on teardown so late acquisitions are discarded.
    media_attempt: u64,
    media: Option<LocalMedia>,
    facing: FacingMode,
    joined: bool,
    ticker: Option<Interval>,
    last_state: NegotiationState,
}

impl CallSession {
    /// A `None` room id generates a fresh token.
    pub fn new(
        room_id: Option<RoomId>,
        config: SessionConfig,
        link: SignalingLink,
        media_source: Arc<dyn MediaSource>,
        transports: Arc<dyn TransportFactory>,
    ) -> (Self, CallHandle, mpsc::UnboundedReceiver<CallEvent>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::channel(256);
        let (media_tx, media_rx) = mpsc::channel(8);

        let facing = match config.constraints.video {
            Some(VideoSource::Camera(facing)) => facing,
            _ => FacingMode::User,
        };

        let session = Self {
            room_id: room_id.unwrap_or_else(RoomId::generate),
            supervisor: ConnectionSupervisor::new(config.negotiation_deadline),
            config,
            link,
            link_open: true,
            media_source,
            transports,
            engine: NegotiationEngine::new(),
            events,
            command_rx,
            transport_tx,
            transport_rx,
            media_tx,
            media_rx,
            media_attempt: 0,
            media: None,
            facing,
            joined: false,
            ticker: None,
            last_state: NegotiationState::Idle,
        };

        (session, CallHandle { commands }, events_rx)
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn spawn(self) -> JoinHandle<NegotiationState> {
        tokio::spawn(self.run())
    }

    /// Drive the call until it reaches a terminal state. Returns that state.
    pub async fn run(mut self) -> NegotiationState {
        info!("Call session for room {} started", self.room_id);

        self.send(SignalMessage::Join {
            room_id: self.room_id.clone(),
        });
        self.start_media();

        while !self.is_finished() {
            let deadline = self.supervisor.deadline();

            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        info!("All call handles dropped, hanging up");
                        self.hangup().await;
                    }
                },

                frame = self.link.inbound.recv(), if self.link_open => match frame {
                    Some(text) => self.handle_frame(&text).await,
                    None => self.signaling_lost().await,
                },

                Some(event) = self.transport_rx.recv() => self.handle_transport_event(event).await,

                Some(result) = self.media_rx.recv() => self.handle_media(result).await,

                _ = sleep_until_deadline(deadline) => self.negotiation_timeout().await,

                _ = next_tick(&mut self.ticker) => self.tick(),
            }

            self.publish_state();
            if self.engine.state().is_exchanging() {
                self.supervisor.arm(Instant::now());
            }
        }

        let state = self.engine.state();
        info!("Call session for room {} finished: {}", self.room_id, state);
        state
    }

    fn is_finished(&self) -> bool {
        self.engine.state().is_terminal() && self.supervisor.is_torn_down()
    }

    async fn handle_command(&mut self, cmd: CallCommand) {
        match cmd {
            CallCommand::Hangup { done } => {
                self.hangup().await;
                let _ = done.send(());
            }

            CallCommand::SetTrackEnabled { kind, enabled } => {
                if let Some(media) = self.media.as_mut() {
                    media.set_enabled(kind, enabled);
                }
                let Some(transport) = self.engine.transport().cloned() else {
                    return;
                };
                if let Err(e) = transport.set_track_enabled(kind, enabled).await {
                    warn!("Failed to set {} enabled={}: {}", kind, enabled, e);
                }
            }

            CallCommand::FlipCamera => {
                if self.can_replace() {
                    self.facing = self.facing.flipped();
                    self.start_replacement(VideoSource::Camera(self.facing));
                }
            }

            CallCommand::StartScreenShare => {
                if self.can_replace() {
                    self.start_replacement(VideoSource::Display);
                }
            }

            CallCommand::StopScreenShare => {
                if self.can_replace() {
                    self.start_replacement(VideoSource::Camera(self.facing));
                }
            }
        }
    }

    async fn handle_frame(&mut self, text: &str) {
        let msg = match SignalMessage::decode(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Malformed frame from signaling server: {}", e);
                return;
            }
        };

        if let Some(room_id) = msg.room_id() {
            if room_id != &self.room_id {
                debug!("Ignoring {} for foreign room {}", msg.kind(), room_id);
                return;
            }
        }

        self.handle_signal(msg).await;
    }

    async fn handle_signal(&mut self, msg: SignalMessage) {
        match msg {
            SignalMessage::IceConfig { ice_servers } => {
                if self.engine.transport().is_none() && !ice_servers.is_empty() {
                    debug!("Using {} ICE servers from signaling", ice_servers.len());
                    self.config.transport.ice_servers = ice_servers;
                }
            }

            SignalMessage::Joined {
                role, peer_present, ..
            } => {
                self.joined = true;
                info!("Joined room {} as {}", self.room_id, role);
                self.emit(CallEvent::Joined { role, peer_present });
                let outcome = self.engine.assign_role(role, peer_present).await;
                self.dispatch(outcome).await;
            }

            SignalMessage::RoomFull { .. } => {
                warn!("Room {} is full", self.room_id);
                self.emit(CallEvent::RoomFull);
                self.engine.fail();
                self.teardown().await;
            }

            SignalMessage::PeerJoined { .. } => {
                self.emit(CallEvent::PeerJoined);
                let outcome = self.engine.peer_joined().await;
                self.dispatch(outcome).await;
            }

            SignalMessage::PeerLeft { .. } => {
                info!("Peer left room {}", self.room_id);
                self.emit(CallEvent::PeerLeft);
                self.engine.end();
                self.teardown().await;
            }

            SignalMessage::Offer { payload, .. } => {
                let outcome = self
                    .engine
                    .remote_offer(SessionDescriptor::offer(payload))
                    .await;
                self.dispatch(outcome).await;
            }

            SignalMessage::Answer { payload, .. } => {
                let outcome = self
                    .engine
                    .remote_answer(SessionDescriptor::answer(payload))
                    .await;
                self.dispatch(outcome).await;
            }

            SignalMessage::Candidate { payload, .. } => {
                let outcome = self
                    .engine
                    .remote_candidate(CandidateDescriptor::new(payload))
                    .await
                    .map(|_| None);
                self.dispatch(outcome).await;
            }

            SignalMessage::Renegotiate { .. } => {
                let outcome = self.engine.renegotiation_requested().await;
                self.dispatch(outcome).await;
            }

            SignalMessage::Error { kind, .. } => {
                warn!("Signaling reported {:?} in room {}", kind, self.room_id);
                self.emit(CallEvent::Error(kind));
            }

            other => warn!("Unexpected {} from signaling server", other.kind()),
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::CandidateGenerated(candidate) => {
                if !self.engine.state().is_terminal() {
                    self.send(SignalMessage::Candidate {
                        room_id: self.room_id.clone(),
                        payload: candidate.payload,
                    });
                }
            }

            TransportEvent::StateChanged(state) => {
                let was_connected = self.engine.state() == NegotiationState::Connected;
                match self.engine.transport_state(state) {
                    Some(NegotiationState::Connected) => self.connected().await,
                    Some(NegotiationState::Failed) => {
                        let kind = if was_connected {
                            ErrorKind::PeerDisconnected
                        } else {
                            ErrorKind::NegotiationFailed
                        };
                        self.emit(CallEvent::Error(kind));
                        self.teardown().await;
                    }
                    Some(NegotiationState::Ended) => self.teardown().await,
                    _ => {}
                }
            }
        }
    }

    async fn handle_media(&mut self, result: MediaResult) {
        match result {
            MediaResult::Initial { attempt, result } => {
                let current = attempt == self.media_attempt
                    && self.engine.state() == NegotiationState::AwaitingMedia;
                match result {
                    Ok(media) if current => self.media_ready(media).await,
                    Ok(media) => {
                        debug!("Discarding media acquired after cancellation");
                        self.release_media(&media).await;
                    }
                    Err(e) if current => {
                        warn!("Local media unavailable: {}", e);
                        self.fail(e.kind()).await;
                    }
                    Err(_) => {}
                }
            }

            MediaResult::Replacement { attempt, result } => {
                let current =
                    attempt == self.media_attempt && !self.engine.state().is_terminal();
                match result {
                    Ok(media) if current => {
                        for track in media.tracks {
                            self.replace_producer(track).await;
                        }
                    }
                    Ok(media) => self.release_media(&media).await,
                    Err(e) if current => {
                        // The call keeps its current producer.
                        warn!("Replacement media unavailable: {}", e);
                        self.emit(CallEvent::Error(e.kind()));
                    }
                    Err(_) => {}
                }
            }
        }
    }

    async fn media_ready(&mut self, media: LocalMedia) {
        let transport = match self
            .transports
            .create(self.config.transport.clone(), self.transport_tx.clone())
            .await
        {
            Ok(transport) => transport,
            Err(e) => {
                error!("Failed to create transport: {}", e);
                self.release_media(&media).await;
                self.fail(ErrorKind::NegotiationFailed).await;
                return;
            }
        };

        if let Err(e) = transport.attach_media(&media).await {
            error!("Failed to attach local media: {}", e);
            let _ = transport.close().await;
            self.release_media(&media).await;
            self.fail(ErrorKind::NegotiationFailed).await;
            return;
        }
        self.media = Some(media);

        let outcome = self.engine.media_ready(transport).await;
        self.dispatch(outcome).await;
    }

    async fn replace_producer(&mut self, track: crate::media::LocalTrack) {
        let outcome = self.engine.replace_producer(&track).await;
        let previous = match self.media.as_mut() {
            Some(media) => media.replace(track),
            None => None,
        };
        if let Some(previous) = previous {
            self.media_source.release(&previous).await;
        }
        self.dispatch(outcome).await;
    }

    async fn connected(&mut self) {
        self.publish_state();
        if self.supervisor.start_clock(Instant::now()) {
            let period = self.config.tick_interval.max(Duration::from_millis(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.ticker = Some(ticker);

            info!("Call connected in room {}", self.room_id);
            self.emit(CallEvent::Connected);
        }

        let outcome = self.engine.resume_deferred_renegotiation().await;
        self.dispatch(outcome).await;
    }

    fn tick(&mut self) {
        let seconds = self.supervisor.elapsed(Instant::now()).as_secs();
        self.emit(CallEvent::ElapsedTick(seconds));
    }

    async fn negotiation_timeout(&mut self) {
        if !self.supervisor.is_expired(Instant::now()) {
            return;
        }
        warn!(
            "Negotiation in room {} did not connect within {:?}",
            self.room_id, self.config.negotiation_deadline
        );
        self.fail(ErrorKind::NegotiationTimeout).await;
    }

    async fn signaling_lost(&mut self) {
        self.link_open = false;
        if self.engine.state().is_terminal() {
            return;
        }
        warn!("Signaling connection lost for room {}", self.room_id);
        self.fail(ErrorKind::SignalingDisconnected).await;
    }

    async fn hangup(&mut self) {
        if self.engine.state().is_terminal() {
            debug!("Hangup ignored: call already {}", self.engine.state());
            return;
        }
        info!("Hanging up call in room {}", self.room_id);
        self.engine.end();
        self.teardown().await;
    }

    async fn fail(&mut self, kind: ErrorKind) {
        if self.engine.fail() {
            self.emit(CallEvent::Error(kind));
        }
        self.teardown().await;
    }

    /// Close the transport, stop local media, free the room slot and stop the clock.
    /// Runs once per session no matter how many terminal paths reach it.
    async fn teardown(&mut self) {
        if !self.supervisor.begin_teardown() {
            return;
        }
        self.media_attempt += 1;

        if let Some(transport) = self.engine.transport().cloned() {
            if let Err(e) = transport.close().await {
                warn!("Failed to close transport: {}", e);
            }
        }
        if let Some(media) = self.media.take() {
            self.release_media(&media).await;
        }
        if self.joined {
            self.send(SignalMessage::Leave {
                room_id: self.room_id.clone(),
            });
            self.joined = false;
        }

        self.ticker = None;
        let elapsed = self.supervisor.stop_clock(Instant::now());
        self.publish_state();
        self.emit(CallEvent::Ended {
            state: self.engine.state(),
            elapsed,
        });
        info!("Call in room {} torn down", self.room_id);
    }

    async fn dispatch(&mut self, outcome: Result<Option<Outbound>, NegotiationError>) {
        match outcome {
            Ok(Some(Outbound::Description(desc))) => {
                let room_id = self.room_id.clone();
                let payload = desc.payload;
                self.send(match desc.kind {
                    SdpKind::Offer => SignalMessage::Offer { room_id, payload },
                    SdpKind::Answer => SignalMessage::Answer { room_id, payload },
                });
            }
            Ok(Some(Outbound::RequestRenegotiation)) => self.send(SignalMessage::Renegotiate {
                room_id: self.room_id.clone(),
            }),
            Ok(None) => {}
            Err(NegotiationError::Terminal(state)) => {
                debug!("Ignoring signal: negotiation already {}", state);
            }
            Err(e) if e.is_fatal() => {
                error!("Negotiation failed in room {}: {}", self.room_id, e);
                self.fail(ErrorKind::NegotiationFailed).await;
            }
            Err(e) => warn!("Dropped out-of-sequence signal: {}", e),
        }
    }

    fn start_media(&mut self) {
        if let Err(e) = self.engine.request_media() {
            warn!("Cannot request media: {}", e);
            return;
        }
        self.publish_state();
        self.media_attempt += 1;
        self.spawn_acquisition(self.config.constraints.clone(), |attempt, result| {
            MediaResult::Initial { attempt, result }
        });
    }

    fn can_replace(&self) -> bool {
        let ready = self.engine.transport().is_some() && !self.engine.state().is_terminal();
        if !ready {
            debug!("No live producer to replace yet");
        }
        ready
    }

    fn start_replacement(&mut self, source: VideoSource) {
        self.spawn_acquisition(MediaConstraints::video_only(source), |attempt, result| {
            MediaResult::Replacement { attempt, result }
        });
    }

    fn spawn_acquisition(
        &self,
        constraints: MediaConstraints,
        wrap: fn(u64, Result<LocalMedia, MediaError>) -> MediaResult,
    ) {
        let attempt = self.media_attempt;
        let source = Arc::clone(&self.media_source);
        let tx = self.media_tx.clone();

        tokio::spawn(async move {
            let result = source.acquire(&constraints).await;
            // The session is gone: nobody will use these tracks.
            if let Err(mpsc::error::SendError(unused)) = tx.send(wrap(attempt, result)).await {
                if let MediaResult::Initial {
                    result: Ok(media), ..
                }
                | MediaResult::Replacement {
                    result: Ok(media), ..
                } = unused
                {
                    for track in &media.tracks {
                        source.release(track).await;
                    }
                }
            }
        });
    }

    async fn release_media(&self, media: &LocalMedia) {
        for track in &media.tracks {
            self.media_source.release(track).await;
        }
    }

    fn send(&self, msg: SignalMessage) {
        if !self.link_open {
            return;
        }
        match msg.encode() {
            Ok(text) => {
                if self.link.outbound.send(text).is_err() {
                    warn!("Signaling link closed, dropped {}", msg.kind());
                }
            }
            Err(e) => error!("Failed to serialize {}: {}", msg.kind(), e),
        }
    }

    fn emit(&self, event: CallEvent) {
        let _ = self.events.send(event);
    }

    fn publish_state(&mut self) {
        let state = self.engine.state();
        if state != self.last_state {
            self.last_state = state;
            self.emit(CallEvent::StateChanged(state));
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) -> Instant {
    match ticker {
        Some(ticker) => ticker.tick().await,
        None => std::future::pending().await,
    }
}
