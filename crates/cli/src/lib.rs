//! Firechat: an interactive terminal chat with a tool-using LLM.
//!
//! The tools come from a Firecrawl tool server launched as a child process;
//! the model is any OpenAI-compatible endpoint picked in the config.

pub mod chat;
