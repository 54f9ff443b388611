//! # mcputil Transport Traits
//!
//! Transport abstraction for the mcputil MCP client core. This crate defines
//! the boundary between the invocation engine and whatever actually moves
//! bytes: a duplex, message-oriented channel to one MCP server.
//!
//! ## Overview
//!
//! This crate defines:
//! - **Trait**: [`Transport`] - the injected duplex channel
//! - **Types**: [`TransportMessage`], [`MessageId`], [`TransportKind`]
//! - **Errors**: [`TransportError`], [`TransportResult`]
//! - **Config**: [`TransportConfig`], [`StdioParams`], [`StreamableHttpParams`], [`SseParams`]
//!
//! Concrete transports (process pipes, streamable HTTP, SSE) implement
//! [`Transport`] and are constructed outside the core from a
//! [`TransportConfig`]. The core only requires that a transport delivers
//! messages belonging to one call in order and never reorders a call's
//! progress notifications relative to its terminal response.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

mod config;
mod error;
mod message;
mod traits;

pub use config::{SseParams, StdioParams, StreamableHttpParams, TransportConfig};
pub use error::{TransportError, TransportResult};
pub use message::{MessageId, TransportMessage};
pub use traits::{Transport, TransportKind};
