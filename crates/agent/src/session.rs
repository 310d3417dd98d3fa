//! The interactive chat session.
//!
//! ```text
//! AwaitingInput ──line──▶ Dispatching ──ok / error──▶ AwaitingInput
//!       │
//!       └──exit token or EOF──▶ Terminated
//! ```
//!
//! The user message is appended before dispatch and stays in the
//! transcript when the turn fails, so the next turn sees it again.

use std::sync::Arc;

use firechat_config::SessionConfig;
use firechat_core::agent::Reasoner;
use firechat_core::error::Error;
use firechat_core::message::{Conversation, Message};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

pub const PROMPT: &str = "You: > ";
pub const FAREWELL: &str = "Goodbye";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Dispatching,
    Terminated,
}

/// What one line of input led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The exit token; the session is over.
    Exit,
    /// Empty line, nothing dispatched.
    Ignored,
    Answered(String),
    /// The turn failed; carries the error text.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub system_prompt: String,
    /// Longer input is cut to this many characters
    pub max_input_chars: usize,
    pub exit_command: String,
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            max_input_chars: config.max_input_chars,
            exit_command: config.exit_command.clone(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// The longest prefix of `input` with at most `max` characters.
pub fn truncate_chars(input: &str, max: usize) -> &str {
    match input.char_indices().nth(max) {
        Some((end, _)) => &input[..end],
        None => input,
    }
}

pub struct Session {
    reasoner: Arc<dyn Reasoner>,
    settings: SessionSettings,
    conversation: Conversation,
    state: SessionState,
}

impl Session {
    pub fn new(reasoner: Arc<dyn Reasoner>, settings: SessionSettings) -> Self {
        let conversation = Conversation::with_system(settings.system_prompt.clone());
        debug!(conversation = %conversation.id, "Session started");
        Self {
            reasoner,
            settings,
            conversation,
            state: SessionState::AwaitingInput,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &[Message] {
        &self.conversation.messages
    }

    /// Feed one line of user input through the state machine.
    pub async fn handle_input(&mut self, line: &str) -> TurnOutcome {
        if self.state == SessionState::Terminated {
            return TurnOutcome::Exit;
        }
        if line == self.settings.exit_command {
            self.terminate("exit command");
            return TurnOutcome::Exit;
        }
        if line.is_empty() {
            return TurnOutcome::Ignored;
        }

        let content = truncate_chars(line, self.settings.max_input_chars);
        if content.len() < line.len() {
            debug!(
                limit = self.settings.max_input_chars,
                "User input truncated"
            );
        }
        self.conversation.push(Message::user(content));

        self.state = SessionState::Dispatching;
        let outcome = self.dispatch().await;
        self.state = SessionState::AwaitingInput;
        outcome
    }

    fn terminate(&mut self, reason: &str) {
        info!(
            conversation = %self.conversation.id,
            messages = self.conversation.len(),
            duration_secs = self.conversation.age_secs(),
            reason,
            "Session ended"
        );
        self.state = SessionState::Terminated;
    }

    async fn dispatch(&mut self) -> TurnOutcome {
        debug!(messages = self.conversation.len(), "Dispatching turn");
        let result = self
            .reasoner
            .respond(&self.conversation.messages)
            .await
            .and_then(|mut messages| {
                messages
                    .pop()
                    .ok_or_else(|| Error::Internal("reasoner returned no messages".into()))
            });

        match result {
            Ok(answer) => {
                let text = answer.content.clone();
                self.conversation.push(answer);
                TurnOutcome::Answered(text)
            }
            Err(e) => {
                warn!(error = %e, "Turn failed");
                TurnOutcome::Failed(e.to_string())
            }
        }
    }

    /// Run the prompt loop until the exit token or end of input.
    pub async fn run<R, W>(&mut self, mut input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = Vec::new();
        while self.state != SessionState::Terminated {
            output.write_all(PROMPT.as_bytes()).await?;
            output.flush().await?;

            line.clear();
            if input.read_until(b'\n', &mut line).await? == 0 {
                self.terminate("input closed");
                output.write_all(format!("\n{FAREWELL}\n").as_bytes()).await?;
                break;
            }
            // a terminal can hand us anything; bad bytes become U+FFFD
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);

            let reply = match self.handle_input(text).await {
                TurnOutcome::Exit => format!("{FAREWELL}\n"),
                TurnOutcome::Ignored => continue,
                TurnOutcome::Answered(answer) => format!("\nAgent: > {answer}\n"),
                TurnOutcome::Failed(error) => format!("Error: {error}\n"),
            };
            output.write_all(reply.as_bytes()).await?;
        }
        output.flush().await
    }
}
