//! Provider selection: builds the single active provider from config.
//!
//! Only one provider is active per session. The kind decides the default
//! endpoint; `providers.<name>.api_url` in the config overrides it.

use std::sync::Arc;
use std::time::Duration;
use firechat_config::{AppConfig, ConfigError};
use firechat_core::provider::Provider;
use tracing::info;
use crate::openai_compat::OpenAiCompatProvider;

/// The provider families Firechat knows endpoints for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    Groq,
    OpenAi,
    Gemini,
    Ollama,
    /// Any other OpenAI-compatible endpoint; needs an explicit `api_url`.
    Custom(String),
}

impl ProviderKind {
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "groq" => Self::Groq,
            "openai" => Self::OpenAi,
            "gemini" | "google" => Self::Gemini,
            "ollama" => Self::Ollama,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Groq => "groq",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::Custom(name) => name,
        }
    }

    /// Default base URL, if this kind has a well-known endpoint.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::Groq => Some("https://api.groq.com/openai/v1"),
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Gemini => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
            Self::Ollama => Some("http://localhost:11434/v1"),
            Self::Custom(_) => None,
        }
    }
}

/// Build the active provider from configuration.
///
/// Fails when the provider needs an API key and none was found, or when a
/// custom provider has no `api_url`.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, ConfigError> {
    let kind = ProviderKind::parse(&config.provider);
    let api_key = config.require_api_key()?.map(str::to_string);

    let base_url = config
        .active_provider()
        .and_then(|p| p.api_url.clone())
        .or_else(|| kind.default_base_url().map(String::from))
        .ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "provider `{}` needs providers.{}.api_url",
                kind.name(),
                kind.name()
            ))
        })?;

    info!(provider = %kind.name(), model = %config.model(), url = %base_url, "Using provider");

    Ok(Arc::new(OpenAiCompatProvider::new(
        kind.name(),
        base_url,
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )))
}
