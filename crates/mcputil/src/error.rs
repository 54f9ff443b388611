//! Error types for the invocation core.

use thiserror::Error;

use mcputil_transport::TransportError;

use crate::calls::CallId;

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents errors surfaced by sessions, groups, proxies, and event streams.
///
/// Caller-input errors (`UnknownTool`, `UnknownSession`, `DuplicateCall`,
/// `InvalidArguments`) are returned synchronously before anything touches
/// the transport. `RemoteTool` and `Cancelled` arrive as a call's terminal
/// event rather than being thrown at dispatch.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A connection-level failure. Not retried by the core; reconnect and
    /// re-discover to recover.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server sent a message the client could not make sense of.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The requested tool is not in the session's discovered catalog.
    #[error("Unknown tool '{name}'. Available tools: {available:?}")]
    UnknownTool {
        /// The tool name that failed to resolve.
        name: String,
        /// Tool names present in the catalog at the time of the call.
        available: Vec<String>,
    },

    /// The requested session is not a member of the group.
    #[error("Unknown session '{name}'. Available sessions: {available:?}")]
    UnknownSession {
        /// The session name that failed to resolve.
        name: String,
        /// Session names present in the group.
        available: Vec<String>,
    },

    /// The supplied call identifier is already in use by an open call.
    #[error("Call id '{0}' is already active on this session")]
    DuplicateCall(CallId),

    /// The supplied arguments do not satisfy the tool's input schema.
    #[error("Invalid arguments for tool '{tool}': {violations:?}")]
    InvalidArguments {
        /// The tool whose schema rejected the arguments.
        tool: String,
        /// One entry per violation, prefixed with the offending field path.
        violations: Vec<String>,
    },

    /// The call was terminated before producing output, typically because
    /// the session was closed or the transport went away.
    #[error("Call cancelled: {0}")]
    Cancelled(String),

    /// The server reported that the tool itself failed while executing.
    #[error("Tool execution failed: {0}")]
    RemoteTool(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tool_lists_catalog() {
        let err = Error::UnknownTool {
            name: "frobnicate".into(),
            available: vec!["add".into(), "long_running_task".into()],
        };
        let text = err.to_string();
        assert!(text.contains("frobnicate"));
        assert!(text.contains("add"));
        assert!(text.contains("long_running_task"));
    }

    #[test]
    fn transport_errors_wrap() {
        let err: Error = TransportError::Timeout.into();
        assert!(matches!(err, Error::Transport(TransportError::Timeout)));
    }

    #[test]
    fn invalid_arguments_names_fields() {
        let err = Error::InvalidArguments {
            tool: "add".into(),
            violations: vec!["/a: \"one\" is not of type \"integer\"".into()],
        };
        assert!(err.to_string().contains("/a"));
    }
}
