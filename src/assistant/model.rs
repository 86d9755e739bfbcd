//! Model-driven chat: a language model picks the tool.
//!
//! The model is asked to reply with either `{"tool": ..., "args": {...}}` or
//! `{"answer": ...}`. Tool arguments are checked with the same schema
//! validation the dispatcher uses before anything is sent to the backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::client::ToolBackend;
use crate::config::ModelConfig;
use crate::mcp::dispatcher::result_text;
use crate::mcp::registry::ToolListing;
use crate::mcp::schema::{validate, DATE_FORMAT};

/// Errors from the language model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model API could not be reached.
    #[error("model request failed: {0}")]
    Request(String),

    /// The model did not answer in time.
    #[error("model did not answer within {0:?}")]
    Timeout(Duration),

    /// The model API answered with a failure status.
    #[error("model API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The model's reply was not one of the accepted shapes.
    #[error("could not understand the model's reply: {0}")]
    MalformedReply(String),
}

/// A text-completion model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Completes a prompt.
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;

    /// Model name, for logging.
    fn name(&self) -> &str;
}

/// A model served by an Ollama-compatible `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaModel {
    client: Client,
    base_url: String,
    model: String,
    temperature: f64,
    timeout: Duration,
}

/// Bound on one completion unless configured otherwise.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

impl OllamaModel {
    /// Creates a model client with temperature 0.
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.0,
            timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }

    /// Bounds each completion request.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Creates a model client from the `model` configuration section.
    #[must_use]
    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(&config.base_url, &config.model)
            .with_temperature(config.temperature)
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(self.timeout)
                } else {
                    ModelError::Request(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api { status, body });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::MalformedReply(e.to_string()))?;
        Ok(reply.response)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// What the model decided to do.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ModelChoice {
    /// Call a tool.
    Tool {
        /// Tool name.
        tool: String,
        /// Raw arguments, validated before use.
        #[serde(default)]
        args: Value,
    },
    /// Answer directly.
    Answer {
        /// The answer text.
        answer: String,
    },
}

/// Extracts the decision from a model reply.
///
/// Tolerates surrounding prose or code fences around the JSON object.
///
/// # Errors
///
/// Returns [`ModelError::MalformedReply`] if no accepted object is found.
pub fn parse_choice(raw: &str) -> Result<ModelChoice, ModelError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => return Err(ModelError::MalformedReply(raw.trim().to_string())),
    };
    serde_json::from_str(json).map_err(|e| ModelError::MalformedReply(e.to_string()))
}

/// Builds the instruction prompt for one query.
#[must_use]
pub fn build_prompt(tools: &[ToolListing], query: &str, today: NaiveDate) -> String {
    let tool_lines: Vec<String> = tools
        .iter()
        .map(|tool| {
            let params: Vec<&str> = tool.schema.params().iter().map(|p| p.name.as_str()).collect();
            format!("- {}({}): {}", tool.name, params.join(", "), tool.description)
        })
        .collect();

    format!(
        r#"You are a helpful school assistant. Use tools when needed.
Today's date is {today}. Dates are written as YYYY-MM-DD.

Available tools:
{tools}

Respond in JSON with one of these formats:

{{"tool": "<tool name>", "args": {{"<parameter>": "<value>"}}}}

or (if no tool is needed)

{{"answer": "direct response"}}

User request: {query}"#,
        today = today.format(DATE_FORMAT),
        tools = tool_lines.join("\n"),
    )
}

/// Routes chat messages to tools by asking a language model.
pub struct ModelRouter<M> {
    model: M,
    backend: Box<dyn ToolBackend>,
    tools: Option<Vec<ToolListing>>,
}

impl<M: LanguageModel> ModelRouter<M> {
    /// Creates a router over a model and a tool backend.
    #[must_use]
    pub fn new(model: M, backend: Box<dyn ToolBackend>) -> Self {
        Self {
            model,
            backend,
            tools: None,
        }
    }

    /// Ends the conversation with the backend, closing any server session.
    pub async fn close(&mut self) {
        if let Err(e) = self.backend.close().await {
            tracing::warn!(error = %e, "Failed to close tool session");
        }
    }

    async fn tools(&mut self) -> Result<Vec<ToolListing>, String> {
        if let Some(ref tools) = self.tools {
            return Ok(tools.clone());
        }
        let tools = self
            .backend
            .list_tools()
            .await
            .map_err(|e| e.user_message())?;
        self.tools = Some(tools.clone());
        Ok(tools)
    }

    /// Answers one query, using the local date as "today".
    pub async fn run(&mut self, query: &str) -> String {
        self.run_on(query, Local::now().date_naive()).await
    }

    /// Answers one query relative to `today`.
    pub async fn run_on(&mut self, query: &str, today: NaiveDate) -> String {
        let tools = match self.tools().await {
            Ok(tools) => tools,
            Err(message) => return message,
        };

        let raw = match self.model.complete(&build_prompt(&tools, query, today)).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(model = %self.model.name(), error = %e, "Model request failed");
                return format!("❌ Error: {e}");
            }
        };
        tracing::debug!(reply = %raw, "Model replied");

        match parse_choice(&raw) {
            Ok(ModelChoice::Answer { answer }) => answer,
            Ok(ModelChoice::Tool { tool, args }) => self.call(&tools, &tool, args).await,
            Err(e) => {
                tracing::warn!(error = %e, "Unusable model reply");
                format!("❌ Error: {e}")
            }
        }
    }

    async fn call(&mut self, tools: &[ToolListing], name: &str, args: Value) -> String {
        let Some(listing) = tools.iter().find(|t| t.name == name) else {
            return format!("Unknown tool: {name}");
        };

        if let Err(errors) = validate(&listing.schema, &args) {
            tracing::warn!(tool = %name, errors = %errors, "Model produced invalid arguments");
            return format!("❌ Invalid arguments for {name}: {errors}");
        }

        tracing::info!(tool = %name, args = %args, "Calling tool chosen by model");
        match self.backend.call_tool(name, args).await {
            Ok(result) => result_text(&result),
            Err(e) => e.user_message(),
        }
    }
}

impl<M> std::fmt::Debug for ModelRouter<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRouter")
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}
