//! Tool discovery: every tool the server declares becomes a [`Tool`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use firechat_core::error::{ProtocolError, ToolError};
use firechat_core::tool::{Tool, ToolRegistry, ToolResult};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::McpClient;
use crate::protocol::ToolInfo;

/// A tool hosted by the tool server.
pub struct McpTool {
    client: Arc<McpClient>,
    info: ToolInfo,
    description: String,
    call_timeout: Option<Duration>,
}

impl McpTool {
    pub fn new(client: Arc<McpClient>, info: ToolInfo, call_timeout: Option<Duration>) -> Self {
        let description = info.description.clone().unwrap_or_default();
        Self {
            client,
            info,
            description,
            call_timeout,
        }
    }

    pub fn info(&self) -> &ToolInfo {
        &self.info
    }

    fn protocol_error(&self, error: ProtocolError) -> ToolError {
        let tool_name = self.info.name.clone();
        match error {
            // The server answered; the model can read the message and adapt.
            ProtocolError::Rpc { code, message } => ToolError::ExecutionFailed {
                tool_name,
                reason: format!("{message} (code {code})"),
            },
            other => ToolError::Transport {
                tool_name,
                reason: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.info.input_schema.clone()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            Value::Object(_) => arguments,
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "{} expects an object, got {other}",
                    self.info.name
                )));
            }
        };

        debug!(tool = %self.info.name, "Calling tool server");
        let call = self.client.call_tool(&self.info.name, arguments);
        let outcome = match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| ToolError::Timeout {
                tool_name: self.info.name.clone(),
                timeout_secs: limit.as_secs(),
            })?,
            None => call.await,
        };
        let result = outcome.map_err(|e| self.protocol_error(e))?;

        let output = result.text();
        if result.is_error {
            warn!(tool = %self.info.name, "Tool reported an error");
            return Err(ToolError::ExecutionFailed {
                tool_name: self.info.name.clone(),
                reason: output,
            });
        }

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output,
            data: None,
        })
    }
}

/// Ask the server for its tools, in the order it declares them.
pub async fn load_tools(
    client: &Arc<McpClient>,
    call_timeout: Option<Duration>,
) -> Result<Vec<McpTool>, ProtocolError> {
    let infos = client.list_tools().await?;
    Ok(infos
        .into_iter()
        .map(|info| McpTool::new(client.clone(), info, call_timeout))
        .collect())
}

/// Register the tools, keeping the first of any duplicated name.
pub fn into_registry(tools: Vec<McpTool>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(Box::new(tool));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fake_client, firecrawl_handler, raw_client};

    async fn connected(names: &[&str]) -> Arc<McpClient> {
        let (client, _) = fake_client(firecrawl_handler(names));
        let client = Arc::new(client);
        client.initialize(Duration::from_secs(5)).await.unwrap();
        client
    }

    #[tokio::test]
    async fn discovered_tools_keep_server_order() {
        let client = connected(&["firecrawl_scrape", "firecrawl_map", "firecrawl_search"]).await;
        let tools = load_tools(&client, None).await.unwrap();
        let registry = into_registry(tools);
        assert_eq!(
            registry.names(),
            vec!["firecrawl_scrape", "firecrawl_map", "firecrawl_search"]
        );
        let defs = registry.definitions();
        assert_eq!(defs[0].description, "firecrawl_scrape tool");
        assert_eq!(defs[0].parameters["required"][0], "url");
    }

    #[tokio::test]
    async fn duplicate_server_tools_keep_first() {
        let client = connected(&["firecrawl_scrape", "firecrawl_scrape"]).await;
        let registry = into_registry(load_tools(&client, None).await.unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn execute_returns_text_content() {
        let client = connected(&["firecrawl_scrape"]).await;
        let tools = load_tools(&client, None).await.unwrap();
        let result = tools[0]
            .execute(serde_json::json!({ "url": "https://example.com" }))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, r#"firecrawl_scrape {"url":"https://example.com"}"#);
    }

    #[tokio::test]
    async fn null_arguments_become_empty_object() {
        let client = connected(&["firecrawl_map"]).await;
        let tools = load_tools(&client, None).await.unwrap();
        let result = tools[0].execute(Value::Null).await.unwrap();
        assert_eq!(result.output, "firecrawl_map {}");
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected() {
        let client = connected(&["firecrawl_map"]).await;
        let tools = load_tools(&client, None).await.unwrap();
        let err = tools[0].execute(serde_json::json!(["x"])).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn error_results_are_recoverable_failures() {
        let client = connected(&["firecrawl_fail"]).await;
        let tools = load_tools(&client, None).await.unwrap();
        let err = tools[0].execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn rpc_errors_are_recoverable_failures() {
        let client = connected(&["firecrawl_scrape"]).await;
        let tool = McpTool::new(
            client,
            ToolInfo {
                name: "firecrawl_removed".into(),
                description: None,
                input_schema: serde_json::json!({ "type": "object" }),
            },
            None,
        );
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        match err {
            ToolError::ExecutionFailed { reason, .. } => assert!(reason.contains("Unknown tool")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn dead_server_is_transport_failure() {
        let (client, server) = raw_client();
        drop(server);
        let tool = McpTool::new(
            Arc::new(client),
            ToolInfo {
                name: "firecrawl_scrape".into(),
                description: Some("Scrape a page".into()),
                input_schema: serde_json::json!({ "type": "object" }),
            },
            None,
        );
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Transport { .. }));
        assert!(!err.is_recoverable());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let (client, _server) = raw_client();
        let tool = McpTool::new(
            Arc::new(client),
            ToolInfo {
                name: "firecrawl_crawl".into(),
                description: None,
                input_schema: serde_json::json!({ "type": "object" }),
            },
            Some(Duration::from_secs(90)),
        );
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { timeout_secs: 90, .. }));
    }
}
