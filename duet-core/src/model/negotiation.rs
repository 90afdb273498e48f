use std::fmt;

/// Per-member negotiation lifecycle. `Ended` and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Idle,
    AwaitingMedia,
    /// Local media is ready, waiting for the round to open (Initiator waits for a peer).
    ReadyToNegotiate,
    /// Initiator sent its Offer and waits for the Answer.
    OfferSent,
    /// Responder has media and waits for the Initiator's Offer.
    AwaitingOffer,
    AnswerExchanged,
    Connected,
    Ended,
    Failed,
}

impl NegotiationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Ended | NegotiationState::Failed)
    }

    /// Between local media becoming ready and Connected.
    pub fn is_negotiating(self) -> bool {
        matches!(
            self,
            NegotiationState::ReadyToNegotiate
                | NegotiationState::OfferSent
                | NegotiationState::AwaitingOffer
                | NegotiationState::AnswerExchanged
        )
    }

    /// A round is open: descriptions are in flight and the deadline runs. An
    /// Initiator still waiting for its peer is not here yet.
    pub fn is_exchanging(self) -> bool {
        matches!(
            self,
            NegotiationState::OfferSent
                | NegotiationState::AwaitingOffer
                | NegotiationState::AnswerExchanged
        )
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::AwaitingMedia => "awaiting-media",
            NegotiationState::ReadyToNegotiate => "ready-to-negotiate",
            NegotiationState::OfferSent => "offer-sent",
            NegotiationState::AwaitingOffer => "awaiting-offer",
            NegotiationState::AnswerExchanged => "answer-exchanged",
            NegotiationState::Connected => "connected",
            NegotiationState::Ended => "ended",
            NegotiationState::Failed => "failed",
        };
        f.write_str(name)
    }
}
