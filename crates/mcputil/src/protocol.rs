//! JSON-RPC 2.0 framing and the MCP wire types the core exchanges with a
//! server: tool catalogs, tool calls, progress notifications, and the
//! initialization handshake.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use mcputil_transport::MessageId;

use crate::calls::CallId;

/// JSON-RPC version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// The MCP protocol revision this client speaks.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Prefix identifying progress tokens minted by this client.
///
/// Progress tokens are `<prefix>/<call_id>`; notifications carrying any
/// other shape are not ours and are discarded.
const CLIENT_TOKEN: &str = "__mcputil_client_token__";

/// MCP request and notification method names.
pub mod methods {
    /// Initialization request, sent once per session before anything else.
    pub const INITIALIZE: &str = "initialize";
    /// Notification acknowledging a completed initialization handshake.
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Tool catalog discovery request.
    pub const LIST_TOOLS: &str = "tools/list";
    /// Tool invocation request.
    pub const CALL_TOOL: &str = "tools/call";
    /// Server-to-client progress notification.
    pub const PROGRESS: &str = "notifications/progress";
}

/// JSON-RPC version type that only serializes/deserializes as `"2.0"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid JSON-RPC version: expected '{JSONRPC_VERSION}', got '{version}'"
            )))
        }
    }
}

/// JSON-RPC request message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version.
    pub jsonrpc: JsonRpcVersion,
    /// Request method name.
    pub method: String,
    /// Request parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Request identifier.
    pub id: MessageId,
}

/// JSON-RPC notification message (no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version.
    pub jsonrpc: JsonRpcVersion,
    /// Notification method name.
    pub method: String,
    /// Notification parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC response payload - result and error are mutually exclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponsePayload {
    /// Successful response with result.
    Success {
        /// Response result.
        result: Value,
    },
    /// Error response.
    Error {
        /// Response error.
        error: JsonRpcError,
    },
}

/// JSON-RPC response message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: JsonRpcVersion,
    /// Response payload (either result or error, never both).
    #[serde(flatten)]
    pub payload: JsonRpcResponsePayload,
    /// Request identifier; `None` only for unanswerable parse errors.
    pub id: Option<MessageId>,
}

/// Any inbound JSON-RPC message, classified by shape.
///
/// Variant order matters for untagged deserialization: a response carries
/// `result`/`error`, a request carries `method` + `id`, and a notification
/// carries only `method`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// A response to a request this client sent.
    Response(JsonRpcResponse),
    /// A server-initiated request.
    Request(JsonRpcRequest),
    /// A server-initiated notification.
    Notification(JsonRpcNotification),
}

/// Name and version of one side of the connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name.
    pub name: String,
    /// Implementation version.
    pub version: String,
}

/// Parameters of the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    /// The protocol revision the client wants to speak.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Client capabilities. This client declares none.
    pub capabilities: Value,
    /// Client name and version.
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

/// Result of the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    /// The protocol revision the server settled on.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Server name and version.
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,
}

/// A tool as declared by the server: name, schemas, description.
///
/// Immutable once discovered; re-discovery replaces descriptors wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// The programmatic name of the tool, unique within one catalog.
    pub name: String,

    /// An optional user-friendly title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// A human-readable description of what the tool does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The JSON Schema object defining the arguments the tool accepts.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,

    /// The JSON Schema object describing the tool's structured output.
    #[serde(
        rename = "outputSchema",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub output_schema: Option<Value>,
}

/// Result of a `tools/list` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// The declared tools, in server order.
    pub tools: Vec<ToolDescriptor>,
}

/// Request metadata attached under the `_meta` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Token the server echoes back in progress notifications.
    #[serde(rename = "progressToken")]
    pub progress_token: MessageId,
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// The tool to invoke.
    pub name: String,
    /// The argument object, validated upstream against the input schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    /// Request metadata; present only when the caller asked for progress.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<RequestMeta>,
}

/// One block of tool output content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text payload.
        text: String,
    },
    /// Base64-encoded image data.
    Image {
        /// The encoded image bytes.
        data: String,
        /// The image MIME type.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Base64-encoded audio data.
    Audio {
        /// The encoded audio bytes.
        data: String,
        /// The audio MIME type.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// An embedded resource.
    Resource {
        /// The resource contents.
        resource: Value,
    },
    /// A link to a resource on the server.
    ResourceLink {
        /// The resource URI.
        uri: String,
        /// The resource name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

/// Result of a `tools/call` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    /// The output content blocks.
    #[serde(default)]
    pub content: Vec<ContentBlock>,

    /// Whether the tool itself failed while executing.
    #[serde(rename = "isError", default)]
    pub is_error: bool,

    /// Structured output conforming to the tool's output schema.
    #[serde(
        rename = "structuredContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub structured_content: Option<Value>,
}

impl CallToolResult {
    /// Extracts the output value from the first content block.
    ///
    /// Text yields its string, images yield their encoded data, anything
    /// else (and empty content) yields an empty string.
    pub fn output_value(&self) -> Value {
        match self.content.first() {
            Some(ContentBlock::Text { text }) => Value::String(text.clone()),
            Some(ContentBlock::Image { data, .. }) => Value::String(data.clone()),
            _ => Value::String(String::new()),
        }
    }

    /// Extracts the failure message from an `isError` result.
    pub fn error_text(&self) -> String {
        match self.content.first() {
            Some(ContentBlock::Text { text }) => text.clone(),
            _ => "tool returned an error with no message".to_owned(),
        }
    }
}

/// Parameters of a `notifications/progress` notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressParams {
    /// The token from the originating request's `_meta`.
    #[serde(rename = "progressToken")]
    pub progress_token: MessageId,
    /// Progress so far; increases monotonically.
    pub progress: f64,
    /// Total progress required, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    /// Human-readable progress message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Encodes the progress token for a tracked call.
pub fn encode_progress_token(call_id: &CallId) -> String {
    format!("{CLIENT_TOKEN}/{call_id}")
}

/// Decodes a progress token minted by [`encode_progress_token`].
///
/// Returns `None` for tokens in any other format, including tokens minted
/// by other clients sharing the server.
pub fn decode_progress_token(token: &str) -> Option<CallId> {
    let (prefix, call_id) = token.split_once('/')?;
    if prefix != CLIENT_TOKEN || call_id.is_empty() || call_id.contains('/') {
        return None;
    }
    Some(CallId::new(call_id))
}
