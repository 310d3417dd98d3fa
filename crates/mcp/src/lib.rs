//! Tool server connector for Firechat.
//!
//! The tool server is a child process speaking the Model Context Protocol:
//! newline-delimited JSON-RPC 2.0 over its stdin/stdout. This crate
//!
//! 1. **launches** the process and owns its pipes ([`transport`]),
//! 2. **talks** JSON-RPC over any async byte stream ([`client`]),
//! 3. **discovers** the server's tools and wraps each one as a
//!    [`firechat_core::Tool`] ([`catalog`]).
//!
//! ```text
//! connect(LaunchSpec) ──▶ ToolServerConnection ──▶ initialize()
//!                                   │
//!                                   ▼
//!                        load_tools(client) ──▶ Vec<McpTool> ──▶ ToolRegistry
//! ```

pub mod catalog;
pub mod client;
pub mod protocol;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{McpTool, into_registry, load_tools};
pub use client::McpClient;
pub use protocol::{CallToolResult, Content, InitializeResult, ToolInfo, PROTOCOL_VERSION};
pub use transport::{LaunchSpec, ToolServerConnection, connect};
