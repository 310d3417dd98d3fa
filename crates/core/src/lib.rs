//! # Firechat Core
//!
//! Domain types, traits, and error definitions for the Firechat chat client.
//! This crate has **no transport dependencies**: it defines the domain model
//! that the provider, tool-server, and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the chat session is a trait here:
//! - [`Provider`]: an LLM inference endpoint
//! - [`Tool`]: a callable capability (remote tools from the tool server)
//! - [`Reasoner`]: the tool-augmented reasoning loop
//!
//! Implementations live in their respective crates, so the session can be
//! driven by a scripted reasoner in tests and by a model-backed one in
//! production.

pub mod agent;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::Reasoner;
pub use error::{Error, ProtocolError, ProviderError, Result, ToolError};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
