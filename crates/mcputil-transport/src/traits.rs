//! Core transport trait.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::TransportResult;
use crate::message::TransportMessage;

/// The kind of channel a transport speaks over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// A child process connected over stdin/stdout pipes.
    Stdio,
    /// The MCP streamable-HTTP transport.
    StreamableHttp,
    /// HTTP server-sent events.
    Sse,
    /// An in-process channel, used in tests.
    InMemory,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stdio => "stdio",
            Self::StreamableHttp => "streamable-http",
            Self::Sse => "sse",
            Self::InMemory => "in-memory",
        };
        f.write_str(name)
    }
}

/// The core trait for all transport implementations.
///
/// A transport is a duplex, message-oriented channel to one MCP server. It
/// is exclusively owned by the session that drives it: exactly one task
/// calls [`Transport::receive`] in a loop, and all sends go through that
/// session. Implementations must deliver messages belonging to the same
/// call in the order the server emitted them.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Returns the kind of this transport.
    fn kind(&self) -> TransportKind;

    /// Establishes a connection to the remote endpoint.
    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Closes the connection to the remote endpoint.
    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Sends a single message over the transport.
    fn send(
        &self,
        message: TransportMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Receives a single message from the transport.
    ///
    /// Returns `Ok(None)` when no message is currently available; the
    /// caller is expected to poll again. Implementations may block until a
    /// message arrives or the connection closes.
    fn receive(
        &self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>>;

    /// Returns `true` while the transport holds a live connection.
    fn is_connected(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;

    /// Returns the endpoint address or identifier for this transport, if applicable.
    fn endpoint(&self) -> Option<String> {
        None
    }
}
