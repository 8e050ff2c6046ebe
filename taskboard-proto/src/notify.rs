//! Real-time hint channel messages.
//!
//! The hint channel is best-effort: a client announces that it changed
//! something, and the hub forwards the announcement to every other
//! connected client. The payload deliberately names no task; receivers
//! treat it as a cue to re-fetch, never as data to merge.
//!
//! Messages are postcard-encoded and carried in WebSocket binary frames.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error type for hint channel encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Identifies one connected client instance, so a client can recognise
/// its own announcements if the hub echoes them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Creates a new time-ordered client identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Messages exchanged on the hint channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HintMessage {
    /// Client joins the channel under its user identifier.
    Join {
        /// The authenticated user's identifier.
        user_id: String,
    },
    /// Client announces that it changed the board (client to hub).
    TaskUpdate {
        /// The announcing client.
        origin: ClientId,
    },
    /// Hub forwards another client's announcement (hub to clients).
    TaskUpdated {
        /// The client that made the change.
        origin: ClientId,
    },
}

/// Encodes a [`HintMessage`] into bytes using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the message cannot be serialized.
pub fn encode(msg: &HintMessage) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(msg).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`HintMessage`] from a byte slice using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes cannot be deserialized.
pub fn decode(bytes: &[u8]) -> Result<HintMessage, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}
