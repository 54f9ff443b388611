//! Call identifiers and the per-session call table.
//!
//! The call table is the single point of shared mutable state between a
//! session's demultiplexing loop (the producer) and the event streams
//! handed to callers (one consumer per call). The producer only appends
//! events and marks termination; each entry is removed by its consumer
//! once the terminal event has been drained, so a late notification can
//! never race the table out from under an undelivered event.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::stream::ProgressEvent;

/// An opaque token correlating a dispatched invocation with its
/// asynchronous events.
///
/// Caller-supplied identifiers enable progress tracking; when the caller
/// does not need progress, the session generates one internally. An
/// identifier is unique among the calls concurrently open on one session
/// and becomes reusable only after the prior call's stream is drained.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallId(String);

impl CallId {
    /// Creates a call identifier from a caller-chosen token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier for a call without progress tracking.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty token, which carries no correlation.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One buffered item on a call's single-producer/single-consumer channel.
#[derive(Debug)]
pub(crate) enum StreamItem {
    /// An intermediate progress notification.
    Progress(ProgressEvent),
    /// The terminal output event.
    Output(Value),
    /// The terminal error event.
    Failed(Error),
}

struct CallEntry {
    tx: mpsc::UnboundedSender<StreamItem>,
    /// Set once the terminal event has been appended. The entry then
    /// lingers until the consumer drains it, keeping the identifier
    /// reserved and shielding the stream from late server messages.
    terminated: bool,
}

/// Map from call identifier to in-progress call state.
pub(crate) struct CallTable {
    entries: Mutex<HashMap<CallId, CallEntry>>,
}

impl CallTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Reserves `id` and returns the consumer half of its event channel.
    ///
    /// Fails with [`Error::DuplicateCall`] while a prior call holds the
    /// identifier, whether still running or terminated but not yet drained.
    pub(crate) fn register(&self, id: CallId) -> Result<mpsc::UnboundedReceiver<StreamItem>> {
        let mut entries = self.entries.lock().expect("call table mutex poisoned");
        if entries.contains_key(&id) {
            return Err(Error::DuplicateCall(id));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        entries.insert(
            id,
            CallEntry {
                tx,
                terminated: false,
            },
        );
        Ok(rx)
    }

    /// Appends a progress event to the call's stream.
    ///
    /// Returns `false` when the identifier is unknown or the call already
    /// terminated; the caller logs and discards the notification.
    pub(crate) fn push_progress(&self, id: &CallId, event: ProgressEvent) -> bool {
        let mut entries = self.entries.lock().expect("call table mutex poisoned");
        let Some(entry) = entries.get(id) else {
            return false;
        };
        if entry.terminated {
            return false;
        }
        if entry.tx.send(StreamItem::Progress(event)).is_err() {
            // Consumer dropped its stream without draining; reclaim now.
            entries.remove(id);
            return false;
        }
        true
    }

    /// Appends the terminal event and marks the call terminated.
    ///
    /// Returns `false` when the identifier is unknown or already terminated.
    pub(crate) fn complete(&self, id: &CallId, outcome: Result<Value>) -> bool {
        let item = match outcome {
            Ok(output) => StreamItem::Output(output),
            Err(err) => StreamItem::Failed(err),
        };
        let mut entries = self.entries.lock().expect("call table mutex poisoned");
        let Some(entry) = entries.get_mut(id) else {
            return false;
        };
        if entry.terminated {
            return false;
        }
        entry.terminated = true;
        if entry.tx.send(item).is_err() {
            entries.remove(id);
        }
        true
    }

    /// Synthesizes a terminal cancellation for every still-open call.
    ///
    /// Used on teardown and transport loss so that no stream consumer is
    /// left waiting forever. Idempotent per call.
    pub(crate) fn cancel_all(&self, reason: &str) {
        let mut entries = self.entries.lock().expect("call table mutex poisoned");
        entries.retain(|_, entry| {
            if entry.terminated {
                return true;
            }
            entry.terminated = true;
            entry
                .tx
                .send(StreamItem::Failed(Error::Cancelled(reason.to_owned())))
                .is_ok()
        });
    }

    /// Removes the call's entry. Called by the consumer after draining the
    /// terminal event, or when the stream is dropped undrained.
    pub(crate) fn finish(&self, id: &CallId) {
        self.entries
            .lock()
            .expect("call table mutex poisoned")
            .remove(id);
    }

    /// Removes an entry whose request was never sent (dispatch failed).
    pub(crate) fn abort(&self, id: &CallId) {
        self.finish(id);
    }

    /// Number of calls currently holding an identifier.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().expect("call table mutex poisoned").len()
    }
}

impl fmt::Debug for CallTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallTable").finish_non_exhaustive()
    }
}
