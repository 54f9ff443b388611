//! Transport message types.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::TransportResult;

/// An identifier correlating a message with the call or request it answers.
///
/// JSON-RPC permits either string or integer identifiers; both forms are
/// preserved so a server's choice round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    /// A string identifier.
    String(String),
    /// A numeric identifier.
    Number(i64),
}

impl MessageId {
    /// Returns the identifier as a string slice when it is the string form.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for MessageId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

/// A wrapper for a message being sent or received over a transport.
///
/// The payload is an opaque byte buffer; framing and parsing happen on
/// either side of the transport boundary, never inside it.
#[derive(Debug, Clone)]
pub struct TransportMessage {
    /// The identifier of the message. For inbound notifications the
    /// transport may supply any placeholder; correlation for those rides
    /// inside the payload.
    pub id: MessageId,

    /// The binary payload of the message.
    pub payload: Bytes,
}

impl TransportMessage {
    /// Creates a new `TransportMessage` with a given ID and payload.
    pub fn new(id: MessageId, payload: Bytes) -> Self {
        Self { id, payload }
    }

    /// Creates a message by serializing `value` as JSON.
    pub fn from_json<T: Serialize>(id: MessageId, value: &T) -> TransportResult<Self> {
        let payload = serde_json::to_vec(value)?;
        Ok(Self::new(id, Bytes::from(payload)))
    }

    /// Returns the size of the message payload in bytes.
    pub const fn size(&self) -> usize {
        self.payload.len()
    }
}
