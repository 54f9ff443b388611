//! In-memory transport and scripted server for integration tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use bytes::Bytes;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};

use mcputil_transport::{
    MessageId, Transport, TransportError, TransportKind, TransportMessage, TransportResult,
};

static TRACING: Once = Once::new();

/// Installs the test log subscriber once per binary. Run tests with
/// `RUST_LOG=mcputil=debug` to watch the demux loop's routing decisions.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A duplex in-memory channel: the session sends into `outbound` (read by
/// the scripted server) and receives from `inbound` (fed by the server or
/// injected directly by a test).
pub struct InMemoryTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<TransportMessage>>,
    outbound: mpsc::UnboundedSender<TransportMessage>,
    connected: AtomicBool,
}

impl std::fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTransport")
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Transport for InMemoryTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::InMemory
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        })
    }

    fn send(
        &self,
        message: TransportMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if !self.connected.load(Ordering::SeqCst) {
                return Err(TransportError::SendFailed("not connected".into()));
            }
            self.outbound
                .send(message)
                .map_err(|_| TransportError::ConnectionLost("server side gone".into()))
        })
    }

    fn receive(
        &self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>> {
        Box::pin(async move {
            let mut inbound = self.inbound.lock().await;
            match inbound.recv().await {
                Some(message) => Ok(Some(message)),
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    Err(TransportError::ConnectionLost("server side closed".into()))
                }
            }
        })
    }

    fn is_connected(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move { self.connected.load(Ordering::SeqCst) })
    }
}

/// Handle to a scripted MCP server speaking over an [`InMemoryTransport`].
pub struct MockServer {
    pub transport: Arc<InMemoryTransport>,
    /// Injects a raw inbound message, bypassing the scripted server.
    pub inject: mpsc::UnboundedSender<TransportMessage>,
    /// Number of `tools/call` requests the server has received.
    pub calls_received: Arc<AtomicUsize>,
}

impl MockServer {
    /// Starts a server exposing the named tools from the fixture registry.
    pub fn start(tools: &[&str]) -> Self {
        init_tracing();
        let (inject, inbound) = mpsc::unbounded_channel();
        let (outbound, requests) = mpsc::unbounded_channel();
        let transport = Arc::new(InMemoryTransport {
            inbound: Mutex::new(inbound),
            outbound,
            connected: AtomicBool::new(false),
        });
        let calls_received = Arc::new(AtomicUsize::new(0));

        let tool_names: Vec<String> = tools.iter().map(|s| (*s).to_owned()).collect();
        tokio::spawn(serve(
            requests,
            inject.clone(),
            tool_names,
            Arc::clone(&calls_received),
        ));

        Self {
            transport,
            inject,
            calls_received,
        }
    }

    /// Injects an arbitrary inbound JSON value as a message to the session.
    pub fn inject_json(&self, value: &Value) {
        let payload = Bytes::from(serde_json::to_vec(value).unwrap());
        self.inject
            .send(TransportMessage::new(MessageId::from("injected"), payload))
            .unwrap();
    }

    /// Injects raw (possibly unparseable) bytes as an inbound message.
    pub fn inject_raw(&self, payload: &'static [u8]) {
        self.inject
            .send(TransportMessage::new(
                MessageId::from("injected"),
                Bytes::from_static(payload),
            ))
            .unwrap();
    }
}

fn tool_descriptor(name: &str) -> Value {
    match name {
        "add" => json!({
            "name": "add",
            "description": "Add two numbers",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "a": {"type": "integer"},
                    "b": {"type": "integer"},
                },
                "required": ["a", "b"],
            },
            "outputSchema": {
                "type": "object",
                "properties": {"result": {"type": "number"}},
            },
        }),
        "long_running_task" => json!({
            "name": "long_running_task",
            "description": "Execute a task with progress updates.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "task_name": {"type": "string"},
                    "steps": {"type": "integer", "default": 5},
                },
                "required": [],
            },
        }),
        "fail_tool" => json!({
            "name": "fail_tool",
            "description": "Always fails",
            "inputSchema": {"type": "object", "properties": {}},
        }),
        "never_returns" => json!({
            "name": "never_returns",
            "description": "Accepts the call and never responds",
            "inputSchema": {"type": "object", "properties": {}},
        }),
        other => panic!("no fixture descriptor for tool '{other}'"),
    }
}

async fn serve(
    mut requests: mpsc::UnboundedReceiver<TransportMessage>,
    inject: mpsc::UnboundedSender<TransportMessage>,
    tools: Vec<String>,
    calls_received: Arc<AtomicUsize>,
) {
    while let Some(message) = requests.recv().await {
        let value: Value = match serde_json::from_slice(&message.payload) {
            Ok(value) => value,
            Err(_) => continue,
        };
        let method = value.get("method").and_then(Value::as_str).unwrap_or("");
        match method {
            "initialize" => {
                respond(
                    &inject,
                    &value["id"],
                    json!({
                        "protocolVersion": "2025-06-18",
                        "capabilities": {},
                        "serverInfo": {"name": "mock-server", "version": "0.0.0"},
                    }),
                );
            }
            "notifications/initialized" => {}
            "tools/list" => {
                let descriptors: Vec<Value> =
                    tools.iter().map(|name| tool_descriptor(name)).collect();
                respond(&inject, &value["id"], json!({"tools": descriptors}));
            }
            "tools/call" => {
                calls_received.fetch_add(1, Ordering::SeqCst);
                // Calls run concurrently so independent streams interleave.
                tokio::spawn(handle_call(inject.clone(), value));
            }
            _ => {}
        }
    }
}

async fn handle_call(inject: mpsc::UnboundedSender<TransportMessage>, request: Value) {
    let id = request["id"].clone();
    let params = &request["params"];
    let name = params["name"].as_str().unwrap_or("");
    let args = &params["arguments"];
    let token = params["_meta"]["progressToken"].as_str().map(str::to_owned);

    match name {
        "add" => {
            let sum = args["a"].as_i64().unwrap_or(0) + args["b"].as_i64().unwrap_or(0);
            respond(
                &inject,
                &id,
                json!({"content": [{"type": "text", "text": sum.to_string()}]}),
            );
        }
        "long_running_task" => {
            let steps = args["steps"].as_u64().unwrap_or(5);
            let task_name = args["task_name"].as_str().unwrap_or("task");
            if let Some(token) = token {
                for i in 1..=steps {
                    #[allow(clippy::cast_precision_loss)]
                    let progress = i as f64 / steps as f64;
                    notify_progress(&inject, &token, progress, i, steps);
                }
            }
            respond(
                &inject,
                &id,
                json!({"content": [{
                    "type": "text",
                    "text": format!("Task '{task_name}' completed"),
                }]}),
            );
        }
        "fail_tool" => {
            respond(
                &inject,
                &id,
                json!({
                    "content": [{"type": "text", "text": "kaboom"}],
                    "isError": true,
                }),
            );
        }
        "never_returns" => {}
        _ => {
            let error = json!({
                "jsonrpc": "2.0",
                "error": {"code": -32602, "message": format!("unknown tool '{name}'")},
                "id": id,
            });
            send_value(&inject, &error);
        }
    }
}

fn respond(inject: &mpsc::UnboundedSender<TransportMessage>, id: &Value, result: Value) {
    send_value(
        inject,
        &json!({"jsonrpc": "2.0", "result": result, "id": id}),
    );
}

fn notify_progress(
    inject: &mpsc::UnboundedSender<TransportMessage>,
    token: &str,
    progress: f64,
    step: u64,
    steps: u64,
) {
    send_value(
        inject,
        &json!({
            "jsonrpc": "2.0",
            "method": "notifications/progress",
            "params": {
                "progressToken": token,
                "progress": progress,
                "total": 1.0,
                "message": format!("Step {step}/{steps}"),
            },
        }),
    );
}

fn send_value(inject: &mpsc::UnboundedSender<TransportMessage>, value: &Value) {
    let payload = Bytes::from(serde_json::to_vec(value).unwrap());
    // The session may already be closed; nothing to do then.
    let _ = inject.send(TransportMessage::new(MessageId::from("srv"), payload));
}
