//! Client-side error taxonomy.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::mcp::dispatcher::DispatchError;
use crate::mcp::protocol::ErrorCode;
use crate::mcp::schema::ValidationErrors;

/// Errors surfaced by the client adapters.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The call did not complete within the configured bound.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server could not be reached or the connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with an error envelope or a failed REST reply.
    #[error("server error {code}: {message}")]
    Remote {
        /// Wire error code (HTTP status for the REST binding).
        code: i32,
        /// Server-provided message.
        message: String,
        /// Structured detail, if any.
        data: Option<Value>,
    },

    /// The reply could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Arguments were rejected before anything was sent.
    #[error("invalid arguments: {0}")]
    InvalidArguments(ValidationErrors),

    /// The tool is not offered by the server.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl ClientError {
    /// Classifies a `reqwest` failure.
    pub(crate) fn from_http(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_connect() || err.is_request() {
            Self::Transport(err.to_string())
        } else if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }

    /// Short message suitable for showing to the person chatting.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout(_) => {
                "❌ The server took too long to respond. Please try again.".to_string()
            }
            Self::Transport(_) => {
                "❌ Cannot connect to server. Please make sure `school-tools-mcp serve` is running!"
                    .to_string()
            }
            Self::Remote { message, .. } => format!("❌ Error: {message}"),
            Self::Protocol(_) => "❌ The server sent a reply I could not understand.".to_string(),
            Self::InvalidArguments(errors) => format!("❌ That request is incomplete: {errors}"),
            Self::UnknownTool(name) => format!("❌ Unknown tool: {name}"),
        }
    }
}

impl From<DispatchError> for ClientError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::ToolNotFound(name) => Self::UnknownTool(name),
            DispatchError::InvalidArguments(errors) => Self::InvalidArguments(errors),
            DispatchError::HandlerError(message) => Self::Remote {
                code: ErrorCode::ServerError.code(),
                message,
                data: None,
            },
        }
    }
}
