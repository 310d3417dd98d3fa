//! In-process fake tool server for unit tests.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

use crate::client::McpClient;

/// A client wired to nothing: the test drives the server half by hand.
pub(crate) fn raw_client() -> (McpClient, DuplexStream) {
    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let (read, write) = tokio::io::split(client_side);
    (McpClient::new(read, write), server_side)
}

/// A client wired to a server task that answers each request with
/// `handler(method, params)`. Notification methods are recorded.
pub(crate) fn fake_client<F>(handler: F) -> (McpClient, Arc<Mutex<Vec<String>>>)
where
    F: Fn(&str, &Value) -> Result<Value, (i64, String)> + Send + Sync + 'static,
{
    let (client, server) = raw_client();
    let notifications = Arc::new(Mutex::new(Vec::new()));
    let seen = notifications.clone();

    tokio::spawn(async move {
        let (read, mut write) = tokio::io::split(server);
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let msg: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(_) => continue,
            };
            let method = msg["method"].as_str().unwrap_or_default().to_string();
            let Some(id) = msg.get("id").cloned() else {
                seen.lock().unwrap().push(method);
                continue;
            };
            let params = msg.get("params").cloned().unwrap_or(Value::Null);
            let reply = match handler(&method, &params) {
                Ok(result) => serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": result }),
                Err((code, message)) => serde_json::json!({
                    "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message }
                }),
            };
            let mut out = reply.to_string();
            out.push('\n');
            if write.write_all(out.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    (client, notifications)
}

/// A handler imitating a Firecrawl-style server exposing `tools`.
///
/// `tools/call` echoes its arguments as text; a tool named `*_fail`
/// reports `isError`.
pub(crate) fn firecrawl_handler(
    tools: &[&str],
) -> impl Fn(&str, &Value) -> Result<Value, (i64, String)> + Send + Sync + 'static {
    let tools: Vec<String> = tools.iter().map(|s| s.to_string()).collect();
    move |method: &str, params: &Value| match method {
        "initialize" => Ok(serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "fake-firecrawl", "version": "0.0.1" }
        })),
        "tools/list" => Ok(serde_json::json!({
            "tools": tools.iter().map(|name| serde_json::json!({
                "name": name,
                "description": format!("{name} tool"),
                "inputSchema": {
                    "type": "object",
                    "properties": { "url": { "type": "string" } },
                    "required": ["url"]
                }
            })).collect::<Vec<_>>()
        })),
        "tools/call" => {
            let name = params["name"].as_str().unwrap_or_default();
            if !tools.iter().any(|t| t == name) {
                return Err((-32602, format!("Unknown tool: {name}")));
            }
            let text = format!("{name} {}", params["arguments"]);
            Ok(serde_json::json!({
                "content": [{ "type": "text", "text": text }],
                "isError": name.ends_with("_fail")
            }))
        }
        other => Err((-32601, format!("Method not found: {other}"))),
    }
}
