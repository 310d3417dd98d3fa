//! Startup and the interactive loop.

use std::sync::Arc;
use std::time::Duration;

use firechat_agent::{ReactAgent, Session, SessionSettings};
use firechat_config::{AppConfig, ConfigError};
use firechat_core::provider::Provider;
use firechat_mcp::{LaunchSpec, McpClient, connect, into_registry, load_tools};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::info;

/// The tool list printed before the first prompt.
pub fn tool_banner(names: &[&str]) -> String {
    let mut banner = String::from("Available Tools -");
    for name in names {
        banner.push(' ');
        banner.push_str(name);
    }
    banner.push('\n');
    banner.push_str(&"-".repeat(60));
    banner.push('\n');
    banner
}

/// Launch the tool server, chat on stdin/stdout, then stop the server.
///
/// Anything that fails before the first prompt is returned as an error.
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let provider = firechat_providers::build_provider(&config).inspect_err(|e| {
        if let ConfigError::MissingApiKey { .. } = e {
            eprintln!(
                "Put the key in the environment, in ./.env, or in {}",
                AppConfig::config_dir().join("config.toml").display()
            );
        }
    })?;

    let spec = LaunchSpec::from_config(&config.tool_server, |name| std::env::var(name).ok());
    let connection = connect(&spec)?;

    let outcome = converse(
        &config,
        provider,
        connection.client(),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await;

    connection.shutdown().await;
    outcome
}

/// Handshake, load the tools, print them, and run the session until exit.
pub async fn converse<R, W>(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    client: Arc<McpClient>,
    input: R,
    mut output: W,
) -> Result<(), Box<dyn std::error::Error>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let server = &config.tool_server;
    client
        .initialize(Duration::from_secs(server.handshake_timeout_secs))
        .await?;

    let call_timeout = server.tool_call_timeout_secs.map(Duration::from_secs);
    let tools = into_registry(load_tools(&client, call_timeout).await?);
    info!(count = tools.len(), "Tools loaded");

    output.write_all(tool_banner(&tools.names()).as_bytes()).await?;

    let agent = ReactAgent::new(provider, config.model(), config.temperature, Arc::new(tools))
        .with_max_tokens(config.max_tokens)
        .with_max_iterations(config.session.max_iterations);

    let mut session = Session::new(Arc::new(agent), SessionSettings::from(&config.session));
    session.run(input, output).await?;
    Ok(())
}
