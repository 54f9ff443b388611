//! Per-call event streams.
//!
//! An [`EventStream`] is the lazy, single-consumer, forward-only view of
//! one call's lifecycle: zero or more progress events in transport arrival
//! order, then exactly one terminal event (output or error), then a
//! deterministic end of sequence.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::calls::{CallId, CallTable, StreamItem};
use crate::error::{Error, Result};

/// An intermediate notification reporting fractional completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Progress so far, in `[0, total]` when a total is known.
    pub progress: f64,
    /// Total progress required, if the server reported one.
    pub total: Option<f64>,
    /// Human-readable progress message.
    pub message: Option<String>,
}

impl ProgressEvent {
    /// Creates a progress event with neither total nor message.
    pub fn new(progress: f64) -> Self {
        Self {
            progress,
            total: None,
            message: None,
        }
    }
}

/// One event in a call's lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    /// An intermediate progress notification.
    Progress(ProgressEvent),
    /// The terminal output of the call. Always the last event.
    Output(Value),
}

/// The ordered event sequence of one in-flight call.
///
/// Yields `Ok(CallEvent::Progress(..))` zero or more times, then exactly
/// one `Ok(CallEvent::Output(..))` or `Err(..)`, then `None` forever.
/// [`EventStream::next`] suspends until the session's demultiplexing loop
/// appends an event; it never busy-waits. Dropping the stream without
/// draining it releases the call identifier.
#[derive(Debug)]
pub struct EventStream {
    id: CallId,
    rx: mpsc::UnboundedReceiver<StreamItem>,
    table: Arc<CallTable>,
    done: bool,
}

impl EventStream {
    pub(crate) fn new(
        id: CallId,
        rx: mpsc::UnboundedReceiver<StreamItem>,
        table: Arc<CallTable>,
    ) -> Self {
        Self {
            id,
            rx,
            table,
            done: false,
        }
    }

    /// The identifier of the call this stream observes.
    pub fn call_id(&self) -> &CallId {
        &self.id
    }

    /// Returns the next event, suspending until one is available.
    ///
    /// After the terminal event has been returned, every subsequent call
    /// yields `None`.
    pub async fn next(&mut self) -> Option<Result<CallEvent>> {
        std::future::poll_fn(|cx| self.poll_next_event(cx)).await
    }

    /// Drains the stream, discarding progress events, and returns the
    /// terminal output or the call's terminal error.
    pub async fn output(mut self) -> Result<Value> {
        while let Some(event) = self.next().await {
            match event? {
                CallEvent::Progress(_) => {}
                CallEvent::Output(value) => return Ok(value),
            }
        }
        // Unreachable in practice: termination always yields output or error.
        Err(Error::Cancelled(
            "event stream ended without a terminal event".to_owned(),
        ))
    }

    fn poll_next_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<CallEvent>>> {
        if self.done {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(StreamItem::Progress(event))) => {
                Poll::Ready(Some(Ok(CallEvent::Progress(event))))
            }
            Poll::Ready(Some(StreamItem::Output(value))) => {
                self.finish();
                Poll::Ready(Some(Ok(CallEvent::Output(value))))
            }
            Poll::Ready(Some(StreamItem::Failed(err))) => {
                self.finish();
                Poll::Ready(Some(Err(err)))
            }
            // Producer vanished without a terminal event; surface it as a
            // cancellation rather than hanging the consumer.
            Poll::Ready(None) => {
                self.finish();
                Poll::Ready(Some(Err(Error::Cancelled(
                    "call state dropped before completion".to_owned(),
                ))))
            }
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.table.finish(&self.id);
    }
}

impl futures::Stream for EventStream {
    type Item = Result<CallEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_next_event(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if !self.done {
            self.table.finish(&self.id);
        }
    }
}
