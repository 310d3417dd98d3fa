//! Tool server process: launch, pipes, shutdown.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use firechat_config::ToolServerConfig;
use firechat_core::error::ProtocolError;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::client::McpClient;
use crate::protocol::InitializeResult;

/// How long a closed-stdin server gets to exit before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Everything needed to start the tool server.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub command: String,
    pub args: Vec<String>,
    /// Set on the child on top of our own environment
    pub env: Vec<(String, String)>,
    pub inherit_stderr: bool,
}

impl LaunchSpec {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: Vec::new(),
            inherit_stderr: true,
        }
    }

    /// Build from config, resolving passthrough variables with `lookup`.
    pub fn from_config<F>(config: &ToolServerConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            env: config.resolve_env(lookup),
            inherit_stderr: config.inherit_stderr,
        }
    }

    fn to_command(&self) -> Command {
        // npx and friends are batch shims on Windows
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.command);
            c
        } else {
            Command::new(&self.command)
        };
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if self.inherit_stderr { Stdio::inherit() } else { Stdio::null() })
            .kill_on_drop(true);
        cmd
    }
}

/// A running tool server and the client bound to its pipes.
///
/// Dropping the connection kills the process.
pub struct ToolServerConnection {
    child: Child,
    client: Arc<McpClient>,
}

/// Spawn the tool server. The handshake is a separate step, see
/// [`ToolServerConnection::initialize`].
pub fn connect(spec: &LaunchSpec) -> Result<ToolServerConnection, ProtocolError> {
    let spawn_error = |reason: String| ProtocolError::Spawn {
        command: spec.command.clone(),
        reason,
    };

    debug!(command = %spec.command, args = ?spec.args, "Launching tool server");
    let mut child = spec.to_command().spawn().map_err(|e| spawn_error(e.to_string()))?;

    let stdin = child.stdin.take().ok_or_else(|| spawn_error("stdin not captured".into()))?;
    let stdout = child.stdout.take().ok_or_else(|| spawn_error("stdout not captured".into()))?;

    info!(command = %spec.command, pid = ?child.id(), "Tool server started");
    Ok(ToolServerConnection {
        child,
        client: Arc::new(McpClient::new(stdout, stdin)),
    })
}

impl ToolServerConnection {
    pub fn client(&self) -> Arc<McpClient> {
        self.client.clone()
    }

    pub async fn initialize(&self, timeout: Duration) -> Result<InitializeResult, ProtocolError> {
        self.client.initialize(timeout).await
    }

    /// Close stdin, give the server a moment to exit, then kill it.
    pub async fn shutdown(mut self) {
        self.client.close().await;
        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "Tool server exited"),
            Ok(Err(e)) => warn!(error = %e, "Failed to wait for tool server"),
            Err(_) => {
                warn!("Tool server did not exit after stdin closed, killing it");
                if let Err(e) = self.child.kill().await {
                    warn!(error = %e, "Failed to kill tool server");
                }
            }
        }
    }
}
