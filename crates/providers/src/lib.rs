//! LLM Provider implementations for Firechat.
//!
//! Every supported backend speaks the OpenAI chat-completions dialect, so a
//! single client covers Groq, OpenAI, Gemini (through its compatibility
//! endpoint), Ollama, and custom endpoints. The router picks the endpoint
//! and credentials from configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderKind, build_provider};
