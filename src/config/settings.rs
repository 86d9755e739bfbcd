//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use serde::Deserialize;

use crate::error::ConfigError;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Client adapter settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Language model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "server.host cannot be empty".to_string(),
            });
        }

        if self.server.max_sessions == 0 || self.server.session_idle_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "server.max_sessions and server.session_idle_secs must be greater than zero"
                    .to_string(),
            });
        }

        if self.client.timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "client.timeout_secs must be greater than zero".to_string(),
            });
        }

        if self.model.timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "model.timeout_secs must be greater than zero".to_string(),
            });
        }

        if !self.client.endpoint.starts_with("http://")
            && !self.client.endpoint.starts_with("https://")
        {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid client endpoint '{}'. Must start with http:// or https://",
                    self.client.endpoint
                ),
            });
        }

        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid model temperature {}. Must be between 0 and 2",
                    self.model.temperature
                ),
            });
        }

        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to bind.
    /// Default: "127.0.0.1"
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    /// Default: 8000
    #[serde(default = "default_port")]
    pub port: u16,

    /// Require `initialize` before tool methods.
    /// Default: false
    #[serde(default)]
    pub strict_lifecycle: bool,

    /// Most HTTP sessions kept open at once.
    /// Default: 1024
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Seconds of inactivity after which a session is forgotten.
    /// Default: 1800
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl ServerConfig {
    /// The `host:port` the server binds to.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            strict_lifecycle: false,
            max_sessions: default_max_sessions(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8000
}

const fn default_max_sessions() -> usize {
    1024
}

const fn default_session_idle_secs() -> u64 {
    1800
}

/// Which binding the chat front-end talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// JSON-RPC envelopes on `POST /`.
    #[default]
    Rpc,
    /// The `/tools/*` REST endpoints.
    Rest,
}

/// Client adapter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the server.
    /// Default: "http://127.0.0.1:8000"
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bound on each outbound call, in seconds.
    /// Default: 10
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Binding used by the keyword chat.
    /// Default: rpc
    #[serde(default)]
    pub transport: TransportKind,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            transport: TransportKind::default(),
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

/// Language model configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Base URL of the Ollama-compatible API.
    /// Default: "http://localhost:11434"
    #[serde(default = "default_model_url")]
    pub base_url: String,

    /// Model name.
    /// Default: "llama3.1:8b"
    #[serde(default = "default_model_name")]
    pub model: String,

    /// Sampling temperature.
    /// Default: 0.0
    #[serde(default)]
    pub temperature: f64,

    /// Bound on one completion, in seconds.
    /// Default: 120
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_model_url(),
            model: default_model_name(),
            temperature: 0.0,
            timeout_secs: default_model_timeout_secs(),
        }
    }
}

const fn default_model_timeout_secs() -> u64 {
    120
}

fn default_model_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model_name() -> String {
    "llama3.1:8b".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
