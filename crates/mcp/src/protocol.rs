//! Wire types: JSON-RPC 2.0 framing and the MCP messages Firechat uses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The protocol revision we request during the handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Revisions we accept from a server's `initialize` answer.
pub const SUPPORTED_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

pub const METHOD_NOT_FOUND: i64 = -32601;

// --- JSON-RPC framing ---

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self { jsonrpc: "2.0", id, method, params }
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcNotification<'a> {
    pub fn new(method: &'a str, params: Option<Value>) -> Self {
        Self { jsonrpc: "2.0", method, params }
    }
}

/// Our answer to a request the server sent us.
#[derive(Debug, Serialize)]
pub struct JsonRpcReply {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Any line read from the server, before classification.
#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// A classified message from the server.
#[derive(Debug)]
pub enum Incoming {
    Response { id: Value, outcome: Result<Value, JsonRpcError> },
    Request { id: Value, method: String, params: Option<Value> },
    Notification { method: String, params: Option<Value> },
}

impl Incoming {
    /// Parse one line. `None` if it is not a JSON-RPC message at all.
    pub fn parse(line: &str) -> Option<Self> {
        let raw: RawMessage = serde_json::from_str(line).ok()?;
        match (raw.id, raw.method) {
            (Some(id), Some(method)) => Some(Self::Request { id, method, params: raw.params }),
            (None, Some(method)) => Some(Self::Notification { method, params: raw.params }),
            (Some(id), None) => {
                let outcome = match raw.error {
                    Some(err) => Err(err),
                    None => Ok(raw.result.unwrap_or(Value::Null)),
                };
                Some(Self::Response { id, outcome })
            }
            (None, None) => None,
        }
    }
}

// --- MCP messages ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub server_info: Option<Implementation>,
    #[serde(default)]
    pub instructions: Option<String>,
}

/// A tool as the server declares it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<ToolInfo>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<Content>,
    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Flatten the content blocks into the text handed to the model.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(Content::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "mimeType", default)]
        mime_type: String,
    },
    Resource {
        resource: ResourceContents,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl Content {
    fn render(&self) -> String {
        match self {
            Content::Text { text } => text.clone(),
            Content::Image { mime_type } => format!("[{mime_type} image omitted]"),
            Content::Resource { resource } => match &resource.text {
                Some(text) => text.clone(),
                None => format!("[resource {}]", resource.uri),
            },
            Content::Unsupported => "[unsupported content omitted]".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_without_null_params() {
        let req = JsonRpcRequest::new(3, "tools/list", None);
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#);
    }

    #[test]
    fn classify_incoming() {
        assert!(matches!(
            Incoming::parse(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#),
            Some(Incoming::Response { outcome: Ok(_), .. })
        ));
        assert!(matches!(
            Incoming::parse(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"bad"}}"#),
            Some(Incoming::Response { outcome: Err(JsonRpcError { code: -32602, .. }), .. })
        ));
        assert!(matches!(
            Incoming::parse(r#"{"jsonrpc":"2.0","id":"srv-1","method":"ping"}"#),
            Some(Incoming::Request { .. })
        ));
        assert!(matches!(
            Incoming::parse(r#"{"jsonrpc":"2.0","method":"notifications/message","params":{}}"#),
            Some(Incoming::Notification { .. })
        ));
        assert!(Incoming::parse("Firecrawl MCP server starting...").is_none());
    }

    #[test]
    fn tool_info_defaults_schema() {
        let info: ToolInfo = serde_json::from_str(r#"{"name":"firecrawl_map"}"#).unwrap();
        assert_eq!(info.input_schema["type"], "object");
        assert!(info.description.is_none());
    }

    #[test]
    fn call_result_renders_mixed_content() {
        let result: CallToolResult = serde_json::from_str(
            r##"{
                "content": [
                    {"type": "text", "text": "# Example Domain"},
                    {"type": "image", "data": "iVBOR...", "mimeType": "image/png"},
                    {"type": "resource", "resource": {"uri": "file:///a.md", "text": "body"}},
                    {"type": "audio", "data": "...", "mimeType": "audio/wav"}
                ],
                "isError": false
            }"##,
        )
        .unwrap();
        assert_eq!(
            result.text(),
            "# Example Domain\n[image/png image omitted]\nbody\n[unsupported content omitted]"
        );
        assert!(!result.is_error);
    }

    #[test]
    fn initialize_result_parses() {
        let result: InitializeResult = serde_json::from_str(
            r#"{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"firecrawl-mcp","version":"1.7.0"}}"#,
        )
        .unwrap();
        assert_eq!(result.protocol_version, PROTOCOL_VERSION);
        assert_eq!(result.server_info.unwrap().name, "firecrawl-mcp");
    }
}
