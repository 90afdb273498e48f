use crate::model::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const MIN_LEN: usize = 6;
const MAX_LEN: usize = 8;
const GENERATED_LEN: usize = 6;

/// Rendezvous token shared out of band by the two participants of a call.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Fresh 6-character lowercase alphanumeric token.
    pub fn generate() -> Self {
        let mut token = Uuid::new_v4().simple().to_string();
        token.truncate(GENERATED_LEN);
        Self(token)
    }

    pub fn parse(token: &str) -> Result<Self, ModelError> {
        let valid_len = (MIN_LEN..=MAX_LEN).contains(&token.len());
        if !valid_len || !token.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ModelError::InvalidRoomId(token.to_owned()));
        }
        Ok(Self(token.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a room as seen by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Waiting,
    Full,
    Closed,
}
