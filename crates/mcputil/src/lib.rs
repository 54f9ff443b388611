//! # mcputil
//!
//! A client core that lets callers treat remote MCP tool servers as
//! ordinary callable functions while correctly handling the asynchronous
//! progress notifications a single invocation may emit before its result.
//!
//! ## Overview
//!
//! - [`Session`] - one logical connection to one server: tool discovery,
//!   call dispatch, and a background demultiplexing loop that routes every
//!   inbound message to the call that produced it.
//! - [`EventStream`] - the ordered, lazy event sequence of one call: zero
//!   or more [`ProgressEvent`]s, then exactly one terminal output or error.
//! - [`Group`] - named sessions aggregated under one tool namespace, with
//!   per-session routing via [`Group::call_tool`].
//! - [`ToolProxy`] - a callable view over one discovered tool that
//!   validates arguments against the tool's declared input schema.
//! - [`codegen`] - deterministic signature rendering for stub generators.
//!
//! Transports are injected: anything implementing
//! [`mcputil_transport::Transport`] works, and concrete process-pipe or
//! HTTP transports live outside this crate.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mcputil::{CallEvent, CallId, Session};
//! use serde_json::json;
//!
//! # async fn run(transport: Arc<dyn mcputil_transport::Transport>) -> mcputil::Result<()> {
//! let session = Session::connect(transport).await?;
//!
//! // Plain call: await only the output.
//! let tools = session.tools().await?;
//! let output = tools[0].invoke(json!({"a": 1, "b": 2})).await?;
//!
//! // Progress-aware call: drain the event stream.
//! let mut stream = session
//!     .invoke("long_running_task", json!({"steps": 5}), Some(CallId::new("call-0")))
//!     .await?;
//! while let Some(event) = stream.next().await {
//!     match event? {
//!         CallEvent::Progress(p) => println!("progress: {}", p.progress),
//!         CallEvent::Output(v) => println!("output: {v}"),
//!     }
//! }
//! session.close().await;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

mod calls;
mod catalog;
mod error;
mod group;
mod proxy;
mod session;
mod stream;

pub mod codegen;
pub mod protocol;

pub use calls::CallId;
pub use catalog::SessionCatalog;
pub use error::{Error, Result};
pub use group::Group;
pub use proxy::ToolProxy;
pub use session::Session;
pub use stream::{CallEvent, EventStream, ProgressEvent};

pub use mcputil_transport::{Transport, TransportError};
pub use protocol::ToolDescriptor;
