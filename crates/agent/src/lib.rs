//! The reasoning loop and the chat session that drives it.
//!
//! A [`Session`] owns the transcript and talks to the user. Each non-empty
//! line becomes a user message and the whole transcript goes to a
//! [`firechat_core::Reasoner`]. The production reasoner is [`ReactAgent`]:
//!
//! 1. **Send** the transcript and tool definitions to the provider
//! 2. **If tool calls**: execute them, append the results, go back to 1
//! 3. **If text**: that message is the answer
//!
//! The loop stops at the first text-only response or at the iteration limit.

pub mod react;
pub mod session;

pub use react::ReactAgent;
pub use session::{Session, SessionSettings, SessionState, TurnOutcome, truncate_chars};
