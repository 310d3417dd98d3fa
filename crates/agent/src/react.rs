//! ReAct reasoning loop: think, call tools, observe, repeat.

use std::sync::Arc;

use async_trait::async_trait;
use firechat_core::agent::Reasoner;
use firechat_core::error::{Result, ToolError};
use firechat_core::message::{Message, MessageToolCall};
use firechat_core::provider::{Provider, ProviderRequest};
use firechat_core::tool::{ToolCall, ToolRegistry};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Final answer when the model keeps calling tools past the limit.
pub const MAX_ITERATIONS_REPLY: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

/// A model-backed [`Reasoner`] that may call tools before answering.
pub struct ReactAgent {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    /// Provider round-trips allowed per turn
    max_iterations: u32,
}

impl ReactAgent {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            max_iterations: 25,
        }
    }

    pub fn with_max_tokens(mut self, max: Option<u32>) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Run one tool call and return the text the model will see.
    ///
    /// Recoverable failures are reported to the model as `Error: ...`;
    /// a transport failure aborts the turn.
    async fn observe(&self, tc: &MessageToolCall) -> std::result::Result<String, ToolError> {
        let arguments = if tc.arguments.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&tc.arguments) {
                Ok(v) => v,
                Err(e) => {
                    warn!(tool = %tc.name, error = %e, "Model sent unparseable tool arguments");
                    let err = ToolError::InvalidArguments(format!("{}: {e}", tc.name));
                    return Ok(format!("Error: {err}"));
                }
            }
        };
        let call = ToolCall {
            id: tc.id.clone(),
            name: tc.name.clone(),
            arguments,
        };

        let start = std::time::Instant::now();
        let result = self.tools.execute(&call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(tool_result) => {
                debug!(tool = %tc.name, duration_ms, "Tool succeeded");
                Ok(tool_result.output)
            }
            Err(e) if e.is_recoverable() => {
                warn!(tool = %tc.name, error = %e, duration_ms, "Tool execution failed");
                Ok(format!("Error: {e}"))
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Reasoner for ReactAgent {
    async fn respond(&self, transcript: &[Message]) -> Result<Vec<Message>> {
        let mut messages = transcript.to_vec();
        let definitions = self.tools.definitions();

        for iteration in 1..=self.max_iterations {
            debug!(iteration, messages = messages.len(), "Reasoning iteration");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: definitions.clone(),
            };
            let response = self.provider.complete(request).await?;

            if let Some(usage) = &response.usage {
                debug!(model = %response.model, tokens = usage.total_tokens, "Provider usage");
            }

            if !response.message.has_tool_calls() {
                info!(iterations = iteration, "Reasoning finished");
                messages.push(response.message);
                return Ok(messages);
            }

            let tool_calls = response.message.tool_calls.clone();
            debug!(tool_count = tool_calls.len(), "Executing tool calls");
            messages.push(response.message);

            for tc in &tool_calls {
                let output = self.observe(tc).await?;
                messages.push(Message::tool_result(&tc.id, output));
            }
        }

        warn!(max = self.max_iterations, "Max tool iterations reached, ending turn");
        messages.push(Message::assistant(MAX_ITERATIONS_REPLY));
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firechat_core::error::{Error, ProviderError};
    use firechat_core::message::Role;
    use firechat_core::provider::{ProviderResponse, Usage};
    use firechat_core::tool::{Tool, ToolResult};
    use std::sync::Mutex;

    /// Returns scripted responses in order and records every request.
    struct ScriptedProvider {
        responses: Mutex<Vec<std::result::Result<ProviderResponse, ProviderError>>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<std::result::Result<ProviderResponse, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ProviderRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let mut responses = self.responses.lock().unwrap();
            assert!(!responses.is_empty(), "ScriptedProvider ran out of responses");
            responses.remove(0)
        }
    }

    fn text(content: &str) -> std::result::Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            message: Message::assistant(content),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }

    fn calls(calls: &[(&str, &str)]) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut message = Message::assistant("");
        message.tool_calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| MessageToolCall {
                id: format!("call_{i}_{name}"),
                name: name.to_string(),
                arguments: args.to_string(),
            })
            .collect();
        Ok(ProviderResponse {
            message,
            usage: None,
            model: "mock-model".into(),
        })
    }

    /// Behaves like a tool-server tool: echoes the url, or fails on demand.
    struct FakeScrape {
        fail_with: Option<ToolError>,
    }

    #[async_trait]
    impl Tool for FakeScrape {
        fn name(&self) -> &str {
            "firecrawl_scrape"
        }
        fn description(&self) -> &str {
            "Scrape a single webpage"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": { "url": { "type": "string" } },
                "required": ["url"]
            })
        }
        async fn execute(&self, arguments: Value) -> std::result::Result<ToolResult, ToolError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: format!("# Page at {}", arguments["url"].as_str().unwrap_or("?")),
                data: None,
            })
        }
    }

    fn registry(fail_with: Option<ToolError>) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FakeScrape { fail_with }));
        Arc::new(registry)
    }

    fn transcript() -> Vec<Message> {
        vec![Message::system("You are helpful."), Message::user("What is on example.com?")]
    }

    #[tokio::test]
    async fn text_only_response_ends_loop() {
        let provider = ScriptedProvider::new(vec![text("Hello!")]);
        let agent = ReactAgent::new(provider.clone(), "mock-model", 0.0, registry(None));

        let out = agent.respond(&transcript()).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out.last().unwrap().content, "Hello!");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "mock-model");
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(requests[0].tools[0].name, "firecrawl_scrape");
    }

    #[tokio::test]
    async fn tool_results_are_fed_back() {
        let provider = ScriptedProvider::new(vec![
            calls(&[("firecrawl_scrape", r#"{"url":"https://example.com"}"#)]),
            text("It is the Example Domain page."),
        ]);
        let agent = ReactAgent::new(provider.clone(), "mock-model", 0.0, registry(None));

        let out = agent.respond(&transcript()).await.unwrap();
        // system, user, assistant(tool call), tool, assistant
        assert_eq!(out.len(), 5);
        assert_eq!(out[3].role, Role::Tool);
        assert_eq!(out[3].content, "# Page at https://example.com");
        assert_eq!(out[3].tool_call_id.as_deref(), Some("call_0_firecrawl_scrape"));
        assert_eq!(out[4].content, "It is the Example Domain page.");

        // the second request carries the observation
        let second = &provider.requests()[1];
        assert_eq!(second.messages.len(), 4);
        assert_eq!(second.messages[3].role, Role::Tool);
    }

    #[tokio::test]
    async fn recoverable_tool_errors_are_reported_to_model() {
        let provider = ScriptedProvider::new(vec![
            calls(&[("firecrawl_scrape", r#"{"url":"https://example.com"}"#), ("firecrawl_nope", "{}")]),
            text("The scrape failed."),
        ]);
        let failure = ToolError::ExecutionFailed {
            tool_name: "firecrawl_scrape".into(),
            reason: "403 Forbidden".into(),
        };
        let agent = ReactAgent::new(provider, "mock-model", 0.0, registry(Some(failure)));

        let out = agent.respond(&transcript()).await.unwrap();
        assert!(out[3].content.starts_with("Error: "));
        assert!(out[3].content.contains("403 Forbidden"));
        assert!(out[4].content.contains("Tool not found: firecrawl_nope"));
        assert_eq!(out.last().unwrap().content, "The scrape failed.");
    }

    #[tokio::test]
    async fn bad_arguments_are_reported_to_model() {
        let provider = ScriptedProvider::new(vec![
            calls(&[("firecrawl_scrape", "{not json")]),
            text("Sorry."),
        ]);
        let agent = ReactAgent::new(provider, "mock-model", 0.0, registry(None));

        let out = agent.respond(&transcript()).await.unwrap();
        assert!(out[3].content.starts_with("Error: Invalid tool arguments"));
    }

    #[tokio::test]
    async fn transport_failure_aborts_turn() {
        let provider = ScriptedProvider::new(vec![calls(&[(
            "firecrawl_scrape",
            r#"{"url":"https://example.com"}"#,
        )])]);
        let failure = ToolError::Transport {
            tool_name: "firecrawl_scrape".into(),
            reason: "Tool server closed the channel".into(),
        };
        let agent = ReactAgent::new(provider, "mock-model", 0.0, registry(Some(failure)));

        let err = agent.respond(&transcript()).await.unwrap_err();
        assert!(matches!(err, Error::Tool(ToolError::Transport { .. })));
    }

    #[tokio::test]
    async fn provider_errors_abort_turn() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::RateLimited {
            retry_after_secs: 5,
        })]);
        let agent = ReactAgent::new(provider, "mock-model", 0.0, registry(None));

        let err = agent.respond(&transcript()).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn iteration_limit_ends_with_fixed_reply() {
        let args = r#"{"url":"https://example.com"}"#;
        let provider = ScriptedProvider::new(vec![
            calls(&[("firecrawl_scrape", args)]),
            calls(&[("firecrawl_scrape", args)]),
        ]);
        let agent = ReactAgent::new(provider.clone(), "mock-model", 0.0, registry(None))
            .with_max_iterations(2);

        let out = agent.respond(&transcript()).await.unwrap();
        assert_eq!(out.last().unwrap().content, MAX_ITERATIONS_REPLY);
        assert_eq!(out.last().unwrap().role, Role::Assistant);
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn request_carries_sampling_settings() {
        let provider = ScriptedProvider::new(vec![text("ok")]);
        let agent = ReactAgent::new(provider.clone(), "llama-3.3-70b-versatile", 0.3, registry(None))
            .with_max_tokens(Some(512));

        agent.respond(&transcript()).await.unwrap();
        let request = &provider.requests()[0];
        assert_eq!(request.model, "llama-3.3-70b-versatile");
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, Some(512));
    }
}
