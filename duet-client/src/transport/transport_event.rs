use duet_core::CandidateDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Events the transport emits towards the call session's loop.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Local candidate to trickle to the other member.
    CandidateGenerated(CandidateDescriptor),

    StateChanged(TransportState),
}
