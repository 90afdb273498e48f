use crate::error::NegotiationError;
use crate::media::LocalTrack;
use crate::transport::{PeerTransport, ReplaceOutcome, TransportState};
use duet_core::{CandidateDescriptor, NegotiationState, Role, SdpKind, SessionDescriptor};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the engine wants sent to the other member.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Description(SessionDescriptor),
    /// Ask the Initiator to open a fresh round (Offers are Initiator-only).
    RequestRenegotiation,
}

/// Where an inbound candidate went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateDisposition {
    Applied,
    /// Held until the round's remote description is applied.
    Buffered,
    /// The transport refused it; the call goes on without that path.
    Rejected,
}

/// Per-member negotiation state machine.
///
/// Every method that talks to the transport suspends only this member; the caller owns
/// the engine and serializes access to it.
pub struct NegotiationEngine {
    state: NegotiationState,
    role: Option<Role>,
    peer_present: bool,
    transport: Option<Arc<dyn PeerTransport>>,
    round: u32,
    local_description: Option<SessionDescriptor>,
    remote_description: Option<SessionDescriptor>,
    /// Offer that reached a Responder before its media was ready.
    pending_offer: Option<SessionDescriptor>,
    pending_candidates: VecDeque<CandidateDescriptor>,
    /// A producer swap needed renegotiation before the first round finished.
    renegotiation_pending: bool,
}

impl Default for NegotiationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NegotiationEngine {
    pub fn new() -> Self {
        Self {
            state: NegotiationState::Idle,
            role: None,
            peer_present: false,
            transport: None,
            round: 0,
            local_description: None,
            remote_description: None,
            pending_offer: None,
            pending_candidates: VecDeque::new(),
            renegotiation_pending: false,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn transport(&self) -> Option<&Arc<dyn PeerTransport>> {
        self.transport.as_ref()
    }

    pub fn buffered_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn local_description(&self) -> Option<&SessionDescriptor> {
        self.local_description.as_ref()
    }

    pub fn remote_description(&self) -> Option<&SessionDescriptor> {
        self.remote_description.as_ref()
    }

    /// Record the role from the join reply. Roles never change once assigned.
    pub async fn assign_role(
        &mut self,
        role: Role,
        peer_present: bool,
    ) -> Result<Option<Outbound>, NegotiationError> {
        self.ensure_live()?;
        match self.role {
            Some(existing) if existing != role => return Err(NegotiationError::RoleChanged(existing)),
            _ => self.role = Some(role),
        }
        self.peer_present |= peer_present;
        self.advance().await
    }

    pub async fn peer_joined(&mut self) -> Result<Option<Outbound>, NegotiationError> {
        self.ensure_live()?;
        self.peer_present = true;
        self.advance().await
    }

    /// Idle -> AwaitingMedia. Only an Idle member may request local media.
    pub fn request_media(&mut self) -> Result<(), NegotiationError> {
        self.ensure_live()?;
        if self.state != NegotiationState::Idle {
            return Err(self.invalid("request media"));
        }
        self.transition(NegotiationState::AwaitingMedia);
        Ok(())
    }

    /// Local media is attached to `transport`; open negotiation.
    pub async fn media_ready(
        &mut self,
        transport: Arc<dyn PeerTransport>,
    ) -> Result<Option<Outbound>, NegotiationError> {
        self.ensure_live()?;
        if self.state != NegotiationState::AwaitingMedia {
            return Err(self.invalid("accept media"));
        }
        self.transport = Some(transport);
        self.round = 1;
        self.transition(NegotiationState::ReadyToNegotiate);
        self.advance().await
    }

    pub async fn remote_offer(
        &mut self,
        offer: SessionDescriptor,
    ) -> Result<Option<Outbound>, NegotiationError> {
        self.ensure_live()?;
        self.require_role(Role::Responder, "consume an offer")?;

        match self.state {
            NegotiationState::Idle
            | NegotiationState::AwaitingMedia
            | NegotiationState::ReadyToNegotiate => {
                if self.pending_offer.replace(offer).is_some() {
                    warn!("Replacing an offer that was still waiting for local media");
                }
                Ok(None)
            }
            NegotiationState::AwaitingOffer => self.answer(offer).await.map(Some),
            NegotiationState::Connected => {
                self.open_round();
                self.answer(offer).await.map(Some)
            }
            _ => Err(self.invalid("consume an offer")),
        }
    }

    /// Apply the Answer to the outstanding Offer. A renegotiation deferred behind that
    /// Offer opens its round here.
    pub async fn remote_answer(
        &mut self,
        answer: SessionDescriptor,
    ) -> Result<Option<Outbound>, NegotiationError> {
        self.ensure_live()?;
        self.require_role(Role::Initiator, "consume an answer")?;

        let awaiting = match self.state {
            NegotiationState::OfferSent => true,
            NegotiationState::Connected => self.offer_outstanding(),
            _ => false,
        };
        if !awaiting {
            return Err(self.invalid("consume an answer"));
        }

        self.apply_remote(answer).await?;
        if self.state == NegotiationState::OfferSent {
            self.transition(NegotiationState::AnswerExchanged);
            return Ok(None);
        }
        info!("Renegotiation round {} complete", self.round);
        self.resume_deferred_renegotiation().await
    }

    /// Apply a remote candidate now, or buffer it until the remote description is set.
    pub async fn remote_candidate(
        &mut self,
        candidate: CandidateDescriptor,
    ) -> Result<CandidateDisposition, NegotiationError> {
        self.ensure_live()?;

        let described = self.remote_description.is_some();
        match self.transport.clone() {
            Some(transport) if described => match transport.add_candidate(&candidate).await {
                Ok(()) => Ok(CandidateDisposition::Applied),
                Err(e) => {
                    warn!("Failed to apply remote candidate: {}", e);
                    Ok(CandidateDisposition::Rejected)
                }
            },
            _ => {
                self.pending_candidates.push_back(candidate);
                debug!(
                    "Buffered early candidate ({} pending)",
                    self.pending_candidates.len()
                );
                Ok(CandidateDisposition::Buffered)
            }
        }
    }

    /// Fold a transport state change into the lifecycle. Returns the new state if it changed.
    pub fn transport_state(&mut self, state: TransportState) -> Option<NegotiationState> {
        if self.state.is_terminal() {
            return None;
        }

        let next = match (self.state, state) {
            (NegotiationState::AnswerExchanged, TransportState::Connected) => {
                NegotiationState::Connected
            }
            (_, TransportState::Failed) => NegotiationState::Failed,
            (NegotiationState::Connected, TransportState::Closed) => NegotiationState::Ended,
            _ => return None,
        };
        self.transition(next);
        Some(next)
    }

    /// The Initiator opens a fresh round at the Responder's request.
    pub async fn renegotiation_requested(&mut self) -> Result<Option<Outbound>, NegotiationError> {
        self.ensure_live()?;
        self.require_role(Role::Initiator, "open a negotiation round")?;
        self.start_renegotiation().await
    }

    /// Swap a local producer. Falls back to a fresh round when the transport cannot swap live.
    pub async fn replace_producer(
        &mut self,
        track: &LocalTrack,
    ) -> Result<Option<Outbound>, NegotiationError> {
        self.ensure_live()?;
        let transport = self.transport.clone().ok_or(NegotiationError::NoTransport)?;

        match transport.replace_track(track).await? {
            ReplaceOutcome::Replaced => {
                debug!("Replaced local {} producer in place", track.kind);
                Ok(None)
            }
            ReplaceOutcome::NeedsRenegotiation => {
                info!(
                    "Live {} replacement unsupported, renegotiating",
                    track.kind
                );
                self.start_renegotiation().await
            }
        }
    }

    /// Run a renegotiation that was deferred while another round was in flight.
    pub async fn resume_deferred_renegotiation(
        &mut self,
    ) -> Result<Option<Outbound>, NegotiationError> {
        if self.state != NegotiationState::Connected || !self.renegotiation_pending {
            return Ok(None);
        }
        self.renegotiation_pending = false;
        self.start_renegotiation().await
    }

    /// Move to Ended. Returns false if already terminal.
    pub fn end(&mut self) -> bool {
        self.finish(NegotiationState::Ended)
    }

    /// Move to Failed. Returns false if already terminal.
    pub fn fail(&mut self) -> bool {
        self.finish(NegotiationState::Failed)
    }

    async fn start_renegotiation(&mut self) -> Result<Option<Outbound>, NegotiationError> {
        if self.state != NegotiationState::Connected {
            // The in-flight round will carry the new producer or finish first.
            if self.state.is_negotiating() {
                self.renegotiation_pending = true;
                return Ok(None);
            }
            return Err(self.invalid("renegotiate"));
        }

        match self.role {
            Some(Role::Initiator) if self.offer_outstanding() => {
                debug!("Offer for round {} still unanswered, deferring", self.round);
                self.renegotiation_pending = true;
                Ok(None)
            }
            Some(Role::Initiator) => {
                self.open_round();
                self.offer().await.map(Some)
            }
            Some(Role::Responder) => Ok(Some(Outbound::RequestRenegotiation)),
            None => Err(self.invalid("renegotiate")),
        }
    }

    /// Drive ReadyToNegotiate forward once role, peer and media allow it.
    async fn advance(&mut self) -> Result<Option<Outbound>, NegotiationError> {
        if self.state != NegotiationState::ReadyToNegotiate {
            return Ok(None);
        }

        match self.role {
            Some(Role::Initiator) if self.peer_present => {
                let offer = self.offer().await?;
                self.transition(NegotiationState::OfferSent);
                Ok(Some(offer))
            }
            Some(Role::Responder) => {
                self.transition(NegotiationState::AwaitingOffer);
                match self.pending_offer.take() {
                    Some(offer) => self.answer(offer).await.map(Some),
                    None => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    async fn offer(&mut self) -> Result<Outbound, NegotiationError> {
        if self.local_description.is_some() {
            return Err(self.invalid("produce a second offer in one round"));
        }
        let transport = self.transport.clone().ok_or(NegotiationError::NoTransport)?;

        let offer = SessionDescriptor::offer(transport.create_offer().await?);
        self.local_description = Some(offer.clone());
        info!("Produced offer for round {}", self.round);
        Ok(Outbound::Description(offer))
    }

    async fn answer(&mut self, offer: SessionDescriptor) -> Result<Outbound, NegotiationError> {
        if offer.kind != SdpKind::Offer || self.remote_description.is_some() {
            return Err(self.invalid("answer"));
        }
        self.apply_remote(offer).await?;

        let transport = self.transport.clone().ok_or(NegotiationError::NoTransport)?;
        let answer = SessionDescriptor::answer(transport.create_answer().await?);
        self.local_description = Some(answer.clone());
        if self.state == NegotiationState::AwaitingOffer {
            self.transition(NegotiationState::AnswerExchanged);
        }
        info!("Produced answer for round {}", self.round);
        Ok(Outbound::Description(answer))
    }

    /// Apply the round's remote description, then replay buffered candidates in arrival order.
    async fn apply_remote(&mut self, desc: SessionDescriptor) -> Result<(), NegotiationError> {
        let transport = self.transport.clone().ok_or(NegotiationError::NoTransport)?;
        transport.apply_remote_description(&desc).await?;
        self.remote_description = Some(desc);

        let replayed = self.pending_candidates.len();
        while let Some(candidate) = self.pending_candidates.pop_front() {
            if let Err(e) = transport.add_candidate(&candidate).await {
                warn!("Failed to apply buffered candidate: {}", e);
            }
        }
        if replayed > 0 {
            debug!("Replayed {} buffered candidates", replayed);
        }
        Ok(())
    }

    fn offer_outstanding(&self) -> bool {
        self.role == Some(Role::Initiator)
            && self.local_description.is_some()
            && self.remote_description.is_none()
    }

    fn open_round(&mut self) {
        self.round += 1;
        self.local_description = None;
        self.remote_description = None;
        debug!("Opened negotiation round {}", self.round);
    }

    fn finish(&mut self, state: NegotiationState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.transition(state);
        self.pending_offer = None;
        self.pending_candidates.clear();
        true
    }

    fn transition(&mut self, next: NegotiationState) {
        debug!("Negotiation {} -> {}", self.state, next);
        self.state = next;
    }

    fn ensure_live(&self) -> Result<(), NegotiationError> {
        if self.state.is_terminal() {
            return Err(NegotiationError::Terminal(self.state));
        }
        Ok(())
    }

    fn require_role(&self, expected: Role, action: &'static str) -> Result<(), NegotiationError> {
        match self.role {
            Some(role) if role == expected => Ok(()),
            Some(_) => Err(NegotiationError::WrongRole { action, expected }),
            // A Responder may receive the offer before its join reply is processed.
            None if expected == Role::Responder => Ok(()),
            None => Err(self.invalid(action)),
        }
    }

    fn invalid(&self, action: &'static str) -> NegotiationError {
        NegotiationError::InvalidTransition {
            action,
            state: self.state,
        }
    }
}
