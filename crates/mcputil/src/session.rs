//! One logical connection to a single MCP server.
//!
//! A [`Session`] owns its transport exclusively. All inbound traffic is
//! consumed by one background demultiplexing task that classifies each
//! message and routes it: responses to discovery requests go to oneshot
//! waiters, progress notifications and tool-call responses go to the call
//! table, and anything unroutable is logged and discarded so that one bad
//! message never disturbs the other in-flight calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;

use mcputil_transport::{MessageId, Transport, TransportError, TransportMessage};

use crate::calls::{CallId, CallTable};
use crate::catalog::SessionCatalog;
use crate::error::{Error, Result};
use crate::protocol::{
    self, CallToolParams, CallToolResult, Implementation, InitializeParams, InitializeResult,
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, JsonRpcResponsePayload,
    JsonRpcVersion, ListToolsResult, ProgressParams, RequestMeta, methods,
};
use crate::proxy::ToolProxy;
use crate::stream::{EventStream, ProgressEvent};

/// How long the demultiplexing loop idles when the transport has nothing.
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Backoff after a transient receive error.
const RECEIVE_BACKOFF: Duration = Duration::from_millis(100);

type ResponseWaiters = Arc<Mutex<HashMap<String, oneshot::Sender<JsonRpcResponse>>>>;

/// A client session over one transport.
///
/// Cloning a `Session` is cheap and yields a handle to the same underlying
/// connection, catalog, and call table.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    transport: Arc<dyn Transport>,
    calls: Arc<CallTable>,
    waiters: ResponseWaiters,
    catalog: Mutex<Option<SessionCatalog>>,
    next_request_id: AtomicU64,
    shutdown: Arc<Notify>,
    closed: AtomicBool,
    demux: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInner")
            .field("transport", &self.transport.kind())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        // Last handle gone without an explicit close: stop the loop and
        // release anything still blocked on an event stream.
        self.shutdown.notify_one();
        self.calls.cancel_all("session dropped");
        self.waiters.lock().expect("waiters mutex poisoned").clear();
    }
}

impl Session {
    /// Connects the transport and performs the MCP initialization handshake.
    ///
    /// The demultiplexing loop starts before the handshake so the
    /// `initialize` response can be routed like any other.
    pub async fn connect(transport: Arc<dyn Transport>) -> Result<Self> {
        transport.connect().await.map_err(Error::Transport)?;

        let inner = Arc::new(SessionInner {
            transport,
            calls: Arc::new(CallTable::new()),
            waiters: Arc::new(Mutex::new(HashMap::new())),
            catalog: Mutex::new(None),
            next_request_id: AtomicU64::new(1),
            shutdown: Arc::new(Notify::new()),
            closed: AtomicBool::new(false),
            demux: Mutex::new(None),
        });

        let handle = spawn_demux_loop(
            Arc::clone(&inner.transport),
            Arc::clone(&inner.calls),
            Arc::clone(&inner.waiters),
            Arc::clone(&inner.shutdown),
        );
        *inner.demux.lock().expect("demux handle mutex poisoned") = Some(handle);

        let session = Self { inner };
        if let Err(err) = session.initialize().await {
            session.close().await;
            return Err(err);
        }
        Ok(session)
    }

    async fn initialize(&self) -> Result<()> {
        let params = InitializeParams {
            protocol_version: protocol::PROTOCOL_VERSION.to_owned(),
            capabilities: Value::Object(serde_json::Map::new()),
            client_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
            },
        };
        let response = self
            .request(methods::INITIALIZE, Some(encode_params(&params)?))
            .await?;
        let result: InitializeResult = match response.payload {
            JsonRpcResponsePayload::Success { result } => serde_json::from_value(result)
                .map_err(|e| Error::Protocol(format!("malformed initialize result: {e}")))?,
            JsonRpcResponsePayload::Error { error } => {
                return Err(Error::Protocol(format!(
                    "initialize rejected: {} (code {})",
                    error.message, error.code
                )));
            }
        };
        tracing::debug!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            protocol = %result.protocol_version,
            "session initialized"
        );

        let notification = JsonRpcNotification {
            jsonrpc: JsonRpcVersion,
            method: methods::INITIALIZED.to_owned(),
            params: None,
        };
        let message = TransportMessage::from_json(MessageId::from("notification"), &notification)
            .map_err(Error::Transport)?;
        self.inner
            .transport
            .send(message)
            .await
            .map_err(Error::Transport)
    }

    /// Queries the server for its tool catalog and caches the result.
    ///
    /// Fails with [`Error::Protocol`] on a malformed catalog or duplicate
    /// tool names, and with [`Error::Transport`] on connection failure.
    pub async fn refresh_catalog(&self) -> Result<SessionCatalog> {
        let response = self.request(methods::LIST_TOOLS, None).await?;
        let catalog = match response.payload {
            JsonRpcResponsePayload::Success { result } => {
                let list: ListToolsResult = serde_json::from_value(result)
                    .map_err(|e| Error::Protocol(format!("malformed tool catalog: {e}")))?;
                SessionCatalog::from_tools(list.tools)?
            }
            JsonRpcResponsePayload::Error { error } => {
                return Err(Error::Protocol(format!(
                    "tools/list failed: {} (code {})",
                    error.message, error.code
                )));
            }
        };
        *self.inner.catalog.lock().expect("catalog mutex poisoned") = Some(catalog.clone());
        Ok(catalog)
    }

    /// Returns the cached catalog, discovering it on first use.
    pub async fn catalog(&self) -> Result<SessionCatalog> {
        let cached = self
            .inner
            .catalog
            .lock()
            .expect("catalog mutex poisoned")
            .clone();
        match cached {
            Some(catalog) => Ok(catalog),
            None => self.refresh_catalog().await,
        }
    }

    /// Drops the cached catalog so the next use re-discovers.
    pub fn invalidate_catalog(&self) {
        *self.inner.catalog.lock().expect("catalog mutex poisoned") = None;
    }

    /// Returns one callable proxy per discovered tool, in server order.
    pub async fn tools(&self) -> Result<Vec<ToolProxy>> {
        self.filtered_tools(None, None).await
    }

    /// Like [`Session::tools`], restricted by name lists.
    ///
    /// A tool is kept when it is not in `exclude` and either `include` is
    /// `None` or names it.
    pub async fn filtered_tools(
        &self,
        include: Option<&[&str]>,
        exclude: Option<&[&str]>,
    ) -> Result<Vec<ToolProxy>> {
        let catalog = self.catalog().await?;
        catalog
            .iter()
            .filter(|descriptor| {
                let name = descriptor.name.as_str();
                if exclude.is_some_and(|list| list.contains(&name)) {
                    return false;
                }
                include.is_none_or(|list| list.contains(&name))
            })
            .map(|descriptor| ToolProxy::new(self.clone(), Arc::clone(descriptor)))
            .collect()
    }

    /// Dispatches a tool call and returns its event stream immediately.
    ///
    /// A non-empty `call_id` enables progress tracking; with `None` (or an
    /// empty token) the session generates an identifier and the call is
    /// fire-and-forget with respect to progress. Dispatch never waits for
    /// the result: the returned [`EventStream`] is the only way to observe
    /// the call's lifecycle.
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments: Value,
        call_id: Option<CallId>,
    ) -> Result<EventStream> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(Error::Cancelled("session is closed".to_owned()));
        }

        let catalog = self.catalog().await?;
        if !catalog.contains(tool_name) {
            return Err(Error::UnknownTool {
                name: tool_name.to_owned(),
                available: catalog.tool_names(),
            });
        }

        // An empty identifier carries no correlation; treat it as absent.
        let tracked = call_id.filter(|id| !id.is_empty());
        let (id, wants_progress) = match tracked {
            Some(id) => (id, true),
            None => (CallId::generate(), false),
        };

        // Reserve the identifier before anything touches the transport, so
        // a duplicate fails without sending a request.
        let rx = self.inner.calls.register(id.clone())?;

        let params = CallToolParams {
            name: tool_name.to_owned(),
            arguments: Some(arguments),
            meta: wants_progress.then(|| RequestMeta {
                progress_token: MessageId::String(protocol::encode_progress_token(&id)),
            }),
        };
        let request = JsonRpcRequest {
            jsonrpc: JsonRpcVersion,
            method: methods::CALL_TOOL.to_owned(),
            params: Some(encode_params(&params)?),
            id: MessageId::String(id.to_string()),
        };
        let message = match TransportMessage::from_json(MessageId::String(id.to_string()), &request)
        {
            Ok(message) => message,
            Err(err) => {
                self.inner.calls.abort(&id);
                return Err(Error::Transport(err));
            }
        };
        if let Err(err) = self.inner.transport.send(message).await {
            self.inner.calls.abort(&id);
            return Err(Error::Transport(err));
        }

        tracing::debug!(tool = tool_name, call_id = %id, "dispatched tool call");
        Ok(EventStream::new(id, rx, Arc::clone(&self.inner.calls)))
    }

    /// Closes the session.
    ///
    /// Stops the demultiplexing loop, disconnects the transport, and
    /// synthesizes a terminal cancellation for every still-open call so no
    /// stream consumer is left waiting. Idempotent.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.shutdown.notify_one();
        let handle = self
            .inner
            .demux
            .lock()
            .expect("demux handle mutex poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        if let Err(err) = self.inner.transport.disconnect().await {
            tracing::warn!(error = %err, "transport disconnect failed during close");
        }
        self.inner.calls.cancel_all("session closed");
        self.inner
            .waiters
            .lock()
            .expect("waiters mutex poisoned")
            .clear();
    }

    /// Sends a request and awaits its response through the demux loop.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse> {
        let seq = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        let id = format!("req-{seq}");

        let (tx, rx) = oneshot::channel();
        self.inner
            .waiters
            .lock()
            .expect("waiters mutex poisoned")
            .insert(id.clone(), tx);

        let request = JsonRpcRequest {
            jsonrpc: JsonRpcVersion,
            method: method.to_owned(),
            params,
            id: MessageId::String(id.clone()),
        };
        let message = TransportMessage::from_json(MessageId::String(id.clone()), &request)
            .map_err(Error::Transport)?;
        if let Err(err) = self.inner.transport.send(message).await {
            self.inner
                .waiters
                .lock()
                .expect("waiters mutex poisoned")
                .remove(&id);
            return Err(Error::Transport(err));
        }

        rx.await.map_err(|_| {
            Error::Transport(TransportError::ConnectionLost(
                "session closed while awaiting response".to_owned(),
            ))
        })
    }
}

fn encode_params<T: serde::Serialize>(params: &T) -> Result<Value> {
    serde_json::to_value(params).map_err(|e| Error::Protocol(format!("unencodable params: {e}")))
}

/// Spawns the background task that owns all inbound traffic.
fn spawn_demux_loop(
    transport: Arc<dyn Transport>,
    calls: Arc<CallTable>,
    waiters: ResponseWaiters,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("session demultiplexing loop started");
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    tracing::debug!("session demultiplexing loop shutting down");
                    break;
                }
                result = transport.receive() => {
                    match result {
                        Ok(Some(message)) => route_message(&message, &calls, &waiters),
                        Ok(None) => {
                            tokio::time::sleep(IDLE_POLL).await;
                        }
                        Err(err) => {
                            if !transport.is_connected().await {
                                tracing::error!(error = %err, "transport lost; failing open calls");
                                calls.cancel_all(&format!("transport lost: {err}"));
                                break;
                            }
                            tracing::warn!(error = %err, "transport receive error");
                            tokio::time::sleep(RECEIVE_BACKOFF).await;
                        }
                    }
                }
            }
        }
        calls.cancel_all("session closed");
        waiters.lock().expect("waiters mutex poisoned").clear();
        tracing::debug!("session demultiplexing loop terminated");
    })
}

/// Classifies one inbound message and routes it.
///
/// A message that fails to parse, or that answers no known call, is logged
/// and discarded; delivery for every other in-flight call is unaffected.
fn route_message(message: &TransportMessage, calls: &CallTable, waiters: &ResponseWaiters) {
    let parsed: JsonRpcMessage = match serde_json::from_slice(&message.payload) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(error = %err, "discarding unparseable inbound message");
            return;
        }
    };

    match parsed {
        JsonRpcMessage::Response(response) => route_response(response, calls, waiters),
        JsonRpcMessage::Notification(notification) => {
            route_notification(&notification, calls);
        }
        JsonRpcMessage::Request(request) => {
            // Server-initiated requests (sampling, elicitation) are out of
            // scope for this client; drop them rather than stall the loop.
            tracing::warn!(method = %request.method, "discarding unsupported server request");
        }
    }
}

fn route_response(response: JsonRpcResponse, calls: &CallTable, waiters: &ResponseWaiters) {
    let Some(id) = response.id.clone() else {
        tracing::warn!("discarding response with null id");
        return;
    };
    let key = id.to_string();

    let waiter = waiters
        .lock()
        .expect("waiters mutex poisoned")
        .remove(&key);
    if let Some(tx) = waiter {
        // Receiver may have given up; that is not an error.
        let _ = tx.send(response);
        return;
    }

    let call_id = CallId::from(key);
    let outcome = match response.payload {
        JsonRpcResponsePayload::Success { result } => {
            match serde_json::from_value::<CallToolResult>(result) {
                Ok(result) if result.is_error => Err(Error::RemoteTool(result.error_text())),
                Ok(result) => Ok(result.output_value()),
                Err(err) => Err(Error::Protocol(format!("malformed tool result: {err}"))),
            }
        }
        JsonRpcResponsePayload::Error { error } => Err(Error::RemoteTool(format!(
            "{} (code {})",
            error.message, error.code
        ))),
    };
    if !calls.complete(&call_id, outcome) {
        tracing::warn!(call_id = %call_id, "discarding response for unknown or finished call");
    }
}

fn route_notification(notification: &JsonRpcNotification, calls: &CallTable) {
    if notification.method != methods::PROGRESS {
        tracing::debug!(method = %notification.method, "ignoring notification");
        return;
    }
    let params: ProgressParams = match notification
        .params
        .clone()
        .map(serde_json::from_value)
        .transpose()
    {
        Ok(Some(params)) => params,
        Ok(None) => {
            tracing::warn!("discarding progress notification without params");
            return;
        }
        Err(err) => {
            tracing::warn!(error = %err, "discarding malformed progress notification");
            return;
        }
    };

    let MessageId::String(token) = &params.progress_token else {
        tracing::debug!("ignoring progress notification with non-string token");
        return;
    };
    let Some(call_id) = protocol::decode_progress_token(token) else {
        tracing::debug!(token = %token, "ignoring progress notification with foreign token");
        return;
    };

    let event = ProgressEvent {
        progress: params.progress,
        total: params.total,
        message: params.message.clone(),
    };
    if !calls.push_progress(&call_id, event) {
        tracing::debug!(call_id = %call_id, "discarding progress for unknown or finished call");
    }
}
