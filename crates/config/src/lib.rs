//! Configuration loading, validation, and management for Firechat.
//!
//! Loads configuration from `~/.firechat/config.toml` (or `$FIRECHAT_CONFIG`)
//! with environment variable overrides. Every field has a default, so a
//! missing file is not an error. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The default instructions seeded as the first message of every session.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant with access to Firecrawl tools for web scraping and data extraction.

Available tools:
- firecrawl_scrape: Scrape a single webpage
- firecrawl_crawl: Crawl multiple pages from a website
- firecrawl_map: Get the structure/sitemap of a website
- firecrawl_search: Search for content (use carefully - check tool schema)
- firecrawl_extract: Extract structured data from pages
- firecrawl_check_crawl_status: Check status of ongoing crawls

For general conversation that doesn't require web scraping, just respond directly without using tools.
If you need to search the web or scrape data, use the appropriate Firecrawl tool.";

/// The root configuration structure.
///
/// Maps directly to `~/.firechat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the active provider (overrides environment lookup)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Active LLM provider
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name; falls back to the provider's default model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// HTTP timeout for a single inference request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Log filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Provider-specific overrides
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// How to launch the tool server
    #[serde(default)]
    pub tool_server: ToolServerConfig,

    /// Interactive session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// The file this was read from; `None` when running on defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

fn default_provider() -> String {
    "groq".into()
}
fn default_request_timeout() -> u64 {
    120
}
fn default_log_level() -> String {
    "warn".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("log_level", &self.log_level)
            .field("providers", &self.providers)
            .field("tool_server", &self.tool_server)
            .field("session", &self.session)
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Launch settings for the tool server subprocess.
#[derive(Clone, Serialize, Deserialize)]
pub struct ToolServerConfig {
    /// Executable to launch
    #[serde(default = "default_tool_command")]
    pub command: String,

    #[serde(default = "default_tool_args")]
    pub args: Vec<String>,

    /// Variables copied from our environment into the child's
    #[serde(default = "default_env_passthrough")]
    pub env_passthrough: Vec<String>,

    /// Extra variables set on the child
    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// Per-call limit for tool invocations; unset means wait indefinitely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_timeout_secs: Option<u64>,

    /// Show the tool server's stderr in the terminal
    #[serde(default = "default_true")]
    pub inherit_stderr: bool,
}

fn default_tool_command() -> String {
    "npx".into()
}
fn default_tool_args() -> Vec<String> {
    vec!["firecrawl-mcp".into()]
}
fn default_env_passthrough() -> Vec<String> {
    vec!["FIRECRAWL_API_KEY".into()]
}
fn default_handshake_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for ToolServerConfig {
    fn default() -> Self {
        Self {
            command: default_tool_command(),
            args: default_tool_args(),
            env_passthrough: default_env_passthrough(),
            env: HashMap::new(),
            handshake_timeout_secs: default_handshake_timeout(),
            tool_call_timeout_secs: None,
            inherit_stderr: true,
        }
    }
}

impl std::fmt::Debug for ToolServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_keys: Vec<&String> = self.env.keys().collect();
        f.debug_struct("ToolServerConfig")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("env_passthrough", &self.env_passthrough)
            .field("env", &env_keys)
            .field("handshake_timeout_secs", &self.handshake_timeout_secs)
            .field("tool_call_timeout_secs", &self.tool_call_timeout_secs)
            .field("inherit_stderr", &self.inherit_stderr)
            .finish()
    }
}

impl ToolServerConfig {
    /// Build the child's environment overrides.
    ///
    /// Passthrough names are looked up with `lookup`; names that are unset
    /// are skipped. Explicit `env` entries win over passthrough values.
    pub fn resolve_env<F>(&self, lookup: F) -> Vec<(String, String)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut resolved: Vec<(String, String)> = Vec::new();
        for name in &self.env_passthrough {
            if self.env.contains_key(name) {
                continue;
            }
            match lookup(name) {
                Some(value) => resolved.push((name.clone(), value)),
                None => tracing::warn!(var = %name, "Tool server variable is not set, not passing it through"),
            }
        }
        let mut explicit: Vec<(String, String)> = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        explicit.sort();
        resolved.extend(explicit);
        resolved
    }
}

/// Interactive session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// User input beyond this many characters is dropped before sending
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// A line exactly equal to this ends the session
    #[serde(default = "default_exit_command")]
    pub exit_command: String,

    /// Tool-call rounds the reasoning loop may take per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}
fn default_max_input_chars() -> usize {
    175_000
}
fn default_exit_command() -> String {
    "exit".into()
}
fn default_max_iterations() -> u32 {
    25
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_input_chars: default_max_input_chars(),
            exit_command: default_exit_command(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Default model for a well-known provider.
pub fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "groq" => "llama-3.3-70b-versatile",
        "openai" => "gpt-4.1",
        "gemini" => "gemini-2.0-flash-exp",
        "ollama" => "llama3.1",
        _ => "default",
    }
}

/// Environment variables consulted, in order, for a provider's API key.
/// An empty list means the provider runs without a key.
pub fn api_key_env_vars(provider: &str) -> &'static [&'static str] {
    match provider {
        "groq" => &["GROQ_API_KEY"],
        "openai" => &["OPENAI_API_KEY", "OPEN_API_KEY"],
        "gemini" => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
        "ollama" => &[],
        _ => &["FIRECHAT_API_KEY"],
    }
}

impl AppConfig {
    /// Load configuration from `$FIRECHAT_CONFIG` or `~/.firechat/config.toml`,
    /// then apply environment overrides:
    /// - `FIRECHAT_PROVIDER`, `FIRECHAT_MODEL`
    /// - the provider's API key variable (e.g. `GROQ_API_KEY`) when no key is configured
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("FIRECHAT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file yields the defaults with `source` unset. Nothing is
    /// logged here since this runs before logging is configured.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.source = Some(path.to_path_buf());

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("FIRECHAT_PROVIDER") {
            self.provider = provider;
        }

        if let Some(model) = lookup("FIRECHAT_MODEL") {
            self.model = Some(model);
        }

        if self.api_key().is_none() {
            self.api_key = api_key_env_vars(&self.provider)
                .iter()
                .find_map(|name| lookup(name));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".firechat")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.provider.trim().is_empty() {
            return Err(ConfigError::ValidationError("provider must not be empty".into()));
        }

        if self.tool_server.command.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "tool_server.command must not be empty".into(),
            ));
        }

        if self.session.max_input_chars == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_input_chars must be > 0".into(),
            ));
        }

        if self.session.exit_command.is_empty() {
            return Err(ConfigError::ValidationError(
                "session.exit_command must not be empty".into(),
            ));
        }

        if self.session.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_iterations must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// The model to request, falling back to the provider default.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| default_model_for(&self.provider))
    }

    /// Settings for the active provider, if any were configured.
    pub fn active_provider(&self) -> Option<&ProviderConfig> {
        self.providers.get(&self.provider)
    }

    /// The API key for the active provider, per-provider key first.
    pub fn api_key(&self) -> Option<&str> {
        self.active_provider()
            .and_then(|p| p.api_key.as_deref())
            .or(self.api_key.as_deref())
    }

    /// The API key for the active provider, or an error if one is required.
    pub fn require_api_key(&self) -> Result<Option<&str>, ConfigError> {
        let vars = api_key_env_vars(&self.provider);
        match self.api_key() {
            Some(key) => Ok(Some(key)),
            None if vars.is_empty() => Ok(None),
            None => Err(ConfigError::MissingApiKey {
                provider: self.provider.clone(),
                env_vars: vars.join(" or "),
            }),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            model: None,
            temperature: 0.0,
            max_tokens: None,
            request_timeout_secs: default_request_timeout(),
            log_level: default_log_level(),
            providers: HashMap::new(),
            tool_server: ToolServerConfig::default(),
            session: SessionConfig::default(),
            source: None,
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("No API key for provider `{provider}`; set {env_vars}")]
    MissingApiKey { provider: String, env_vars: String },
}
