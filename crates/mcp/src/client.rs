//! JSON-RPC client over an async byte stream.
//!
//! One request is in flight at a time: the channel sits behind an async
//! mutex, and a request holds it from write until its response arrives.
//! While waiting, server notifications are logged and skipped, server
//! requests are answered, and responses carrying a stale id (left over from
//! a call that timed out) are discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use firechat_core::error::ProtocolError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::protocol::{
    CallToolResult, Incoming, InitializeResult, JsonRpcError, JsonRpcNotification, JsonRpcReply,
    JsonRpcRequest, ListToolsResult, ToolInfo, METHOD_NOT_FOUND, PROTOCOL_VERSION,
    SUPPORTED_VERSIONS,
};

type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct Channel {
    reader: BufReader<BoxReader>,
    /// `None` once the client has been closed.
    writer: Option<BoxWriter>,
    /// Set while a line is being written. Still set on entry means the last
    /// write was cancelled partway and the server holds an unterminated line.
    torn: bool,
}

impl Channel {
    /// Write one message as a line. Not cancel-safe on its own: a dropped
    /// future can leave a partial line, which the next call terminates.
    async fn write_line<T: serde::Serialize>(&mut self, message: &T) -> Result<(), ProtocolError> {
        let writer = self.writer.as_mut().ok_or(ProtocolError::Closed)?;
        let mut line = serde_json::to_string(message)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        trace!(line = %line, "-> tool server");
        line.push('\n');

        if self.torn {
            warn!("Previous write to tool server was interrupted, terminating it");
            writer.write_all(b"\n").await?;
        }
        self.torn = true;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        self.torn = false;
        Ok(())
    }

    async fn answer_server_request(&mut self, id: Value, method: &str) -> Result<(), ProtocolError> {
        let reply = if method == "ping" {
            JsonRpcReply {
                jsonrpc: "2.0",
                id,
                result: Some(serde_json::json!({})),
                error: None,
            }
        } else {
            debug!(method = %method, "Rejecting unsupported server request");
            JsonRpcReply {
                jsonrpc: "2.0",
                id,
                result: None,
                error: Some(JsonRpcError {
                    code: METHOD_NOT_FOUND,
                    message: format!("Method not found: {method}"),
                    data: None,
                }),
            }
        };
        self.write_line(&reply).await
    }
}

/// A client for one tool server.
pub struct McpClient {
    channel: Mutex<Channel>,
    next_id: AtomicU64,
}

impl McpClient {
    /// Wrap a reader (server → us) and writer (us → server).
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            channel: Mutex::new(Channel {
                reader: BufReader::new(Box::new(reader) as BoxReader),
                writer: Some(Box::new(writer) as BoxWriter),
                torn: false,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Send a request and wait for its response.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, ProtocolError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut channel = self.channel.lock().await;

        debug!(id, method = %method, "Tool server request");
        channel.write_line(&JsonRpcRequest::new(id, method, params)).await?;

        let expected = Value::from(id);
        let mut line = String::new();
        loop {
            line.clear();
            if channel.reader.read_line(&mut line).await? == 0 {
                return Err(ProtocolError::Closed);
            }
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            trace!(line = %text, "<- tool server");

            match Incoming::parse(text) {
                Some(Incoming::Response { id, outcome }) if id == expected => {
                    return match outcome {
                        Ok(result) => serde_json::from_value(result).map_err(|e| {
                            ProtocolError::Malformed(format!("`{method}` result: {e}"))
                        }),
                        Err(err) => Err(ProtocolError::Rpc {
                            code: err.code,
                            message: err.message,
                        }),
                    };
                }
                Some(Incoming::Response { id, .. }) => {
                    warn!(id = %id, expected = %expected, "Discarding response for another request");
                }
                Some(Incoming::Request { id, method, .. }) => {
                    channel.answer_server_request(id, &method).await?;
                }
                Some(Incoming::Notification { method, .. }) => {
                    debug!(method = %method, "Tool server notification");
                }
                None => {
                    warn!(line = %text, "Ignoring non-JSON-RPC output from tool server");
                }
            }
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ProtocolError> {
        let mut channel = self.channel.lock().await;
        channel.write_line(&JsonRpcNotification::new(method, params)).await
    }

    /// Perform the capability handshake.
    ///
    /// Fails with `ProtocolError::Timeout` if the server does not answer
    /// within `timeout`, and with `Rpc`/`UnsupportedVersion` if it rejects us.
    pub async fn initialize(&self, timeout: Duration) -> Result<InitializeResult, ProtocolError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "firechat",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });

        let result: InitializeResult = tokio::time::timeout(timeout, self.request("initialize", Some(params)))
            .await
            .map_err(|_| ProtocolError::Timeout {
                method: "initialize".into(),
                timeout_secs: timeout.as_secs(),
            })??;

        if !SUPPORTED_VERSIONS.contains(&result.protocol_version.as_str()) {
            return Err(ProtocolError::UnsupportedVersion(result.protocol_version));
        }

        self.notify("notifications/initialized", None).await?;

        let server = result
            .server_info
            .as_ref()
            .map(|s| format!("{} {}", s.name, s.version))
            .unwrap_or_else(|| "unknown".into());
        info!(server = %server, protocol = %result.protocol_version, "Tool server initialized");
        Ok(result)
    }

    /// List every tool the server declares, following pagination.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>, ProtocolError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| serde_json::json!({ "cursor": c }));
            let page: ListToolsResult = self.request("tools/list", params).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        debug!(count = tools.len(), "Listed tool server tools");
        Ok(tools)
    }

    /// Invoke a tool by name.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, ProtocolError> {
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        self.request("tools/call", Some(params)).await
    }

    /// Close our end of the channel. Later requests fail with `Closed`.
    pub async fn close(&self) {
        let mut channel = self.channel.lock().await;
        if let Some(mut writer) = channel.writer.take() {
            let _ = writer.shutdown().await;
        }
    }
}
