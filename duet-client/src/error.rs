use duet_core::{ErrorKind, NegotiationState, Role};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media access denied: {0}")]
    AccessDenied(String),

    #[error("no device satisfies the constraints: {0}")]
    Unavailable(String),
}

impl MediaError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MediaAccessDenied
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("no local {0} track attached")]
    NoTrack(&'static str),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("{action} is not allowed in state {state}")]
    InvalidTransition {
        action: &'static str,
        state: NegotiationState,
    },

    #[error("{action} is reserved for the {expected}")]
    WrongRole { action: &'static str, expected: Role },

    #[error("role is already assigned as {0}")]
    RoleChanged(Role),

    #[error("negotiation already {0}")]
    Terminal(NegotiationState),

    #[error("no transport has been created yet")]
    NoTransport,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl NegotiationError {
    /// Protocol violations are dropped; transport failures end the attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NegotiationError::Transport(_))
    }
}
