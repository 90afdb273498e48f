use serde::{Deserialize, Serialize};

/// Opaque blob carried by descriptors. Relayed verbatim, never inspected by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(pub serde_json::Value);

impl Payload {
    pub fn text(value: impl Into<String>) -> Self {
        Self(serde_json::Value::String(value.into()))
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdpKind {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionDescriptor {
    pub kind: SdpKind,
    pub payload: Payload,
}

impl SessionDescriptor {
    pub fn offer(payload: Payload) -> Self {
        Self {
            kind: SdpKind::Offer,
            payload,
        }
    }

    pub fn answer(payload: Payload) -> Self {
        Self {
            kind: SdpKind::Answer,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateDescriptor {
    pub payload: Payload,
}

impl CandidateDescriptor {
    pub fn new(payload: Payload) -> Self {
        Self { payload }
    }
}
