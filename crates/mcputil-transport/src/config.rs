//! Transport configuration types.
//!
//! These parameter structs describe how to reach a server; they are
//! supplied externally (config file, CLI) and consumed by whatever
//! constructs the concrete transport. The core never reads them directly.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Parameters for a server launched as a child process over stdio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioParams {
    /// The executable to launch.
    pub command: String,

    /// Command line arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the child process.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Parameters for the MCP streamable-HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamableHttpParams {
    /// The URL of the server.
    pub url: String,

    /// The headers to send to the server.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// The timeout for the HTTP request. Defaults to 30 seconds.
    #[serde(default = "StreamableHttpParams::default_timeout")]
    pub timeout: Duration,
}

impl StreamableHttpParams {
    const fn default_timeout() -> Duration {
        Duration::from_secs(30)
    }

    /// Creates parameters for `url`, normalizing it to end in `/mcp`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: normalize_url(url.into(), "/mcp"),
            headers: HashMap::new(),
            timeout: Self::default_timeout(),
        }
    }

    /// Replaces the request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Replaces the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Parameters for the HTTP server-sent-events transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseParams {
    /// The URL of the server.
    pub url: String,

    /// The headers to send to the server.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// The timeout for the HTTP request. Defaults to 5 seconds.
    #[serde(default = "SseParams::default_timeout")]
    pub timeout: Duration,
}

impl SseParams {
    const fn default_timeout() -> Duration {
        Duration::from_secs(5)
    }

    /// Creates parameters for `url`, normalizing it to end in `/sse`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: normalize_url(url.into(), "/sse"),
            headers: HashMap::new(),
            timeout: Self::default_timeout(),
        }
    }
}

/// Connection parameters for one named session, tagged by transport kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "kebab-case")]
pub enum TransportConfig {
    /// Child process over stdio.
    Stdio(StdioParams),
    /// Streamable HTTP.
    StreamableHttp(StreamableHttpParams),
    /// Server-sent events.
    Sse(SseParams),
}

/// Appends `suffix` to the URL unless already present, dropping a trailing slash.
fn normalize_url(url: String, suffix: &str) -> String {
    if url.ends_with(suffix) {
        return url;
    }
    let trimmed = url.strip_suffix('/').unwrap_or(&url);
    format!("{trimmed}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streamable_http_url_is_normalized() {
        assert_eq!(
            StreamableHttpParams::new("http://localhost:8000").url,
            "http://localhost:8000/mcp"
        );
        assert_eq!(
            StreamableHttpParams::new("http://localhost:8000/").url,
            "http://localhost:8000/mcp"
        );
        assert_eq!(
            StreamableHttpParams::new("http://localhost:8000/mcp").url,
            "http://localhost:8000/mcp"
        );
    }

    #[test]
    fn sse_url_is_normalized() {
        assert_eq!(
            SseParams::new("http://localhost:9000/").url,
            "http://localhost:9000/sse"
        );
    }

    #[test]
    fn default_timeouts() {
        assert_eq!(
            StreamableHttpParams::new("http://x").timeout,
            Duration::from_secs(30)
        );
        assert_eq!(SseParams::new("http://x").timeout, Duration::from_secs(5));
    }

    #[test]
    fn config_serde_tagging() {
        let cfg = TransportConfig::StreamableHttp(StreamableHttpParams::new("http://h"));
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["transport"], "streamable-http");
        let back: TransportConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, cfg);
    }
}
