//! Tool dispatch: lookup, validation, invocation.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;

use crate::mcp::protocol::{ErrorCode, JsonRpcError, JsonRpcErrorData, RequestId};
use crate::mcp::registry::ToolRegistry;
use crate::mcp::schema::{validate, ValidationErrors};

/// Errors produced while dispatching a tool call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No tool with this name is registered.
    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    /// The arguments did not match the tool's schema.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(ValidationErrors),

    /// The handler returned an error or panicked.
    #[error("Tool failed: {0}")]
    HandlerError(String),
}

impl DispatchError {
    /// Converts to a JSON-RPC error envelope for the given request.
    #[must_use]
    pub fn to_jsonrpc_error(&self, id: Option<RequestId>) -> JsonRpcError {
        let data = match self {
            Self::ToolNotFound(_) => JsonRpcErrorData::with_message(
                ErrorCode::MethodNotFound,
                self.to_string(),
            ),
            Self::InvalidArguments(errors) => {
                JsonRpcErrorData::with_message(ErrorCode::InvalidParams, self.to_string())
                    .with_data(json!({ "fields": errors.to_json() }))
            }
            Self::HandlerError(_) => {
                JsonRpcErrorData::with_message(ErrorCode::ServerError, self.to_string())
            }
        };
        JsonRpcError::new(id, data)
    }
}

/// Validates and routes tool calls to registered handlers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    /// Creates a dispatcher over a finished registry.
    #[must_use]
    pub const fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// The registry backing this dispatcher.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Dispatches a call to the named tool.
    ///
    /// The handler runs at most once, and only with arguments that passed
    /// validation. Panics inside the handler are caught and reported as
    /// [`DispatchError::HandlerError`].
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::ToolNotFound`] for unknown names,
    /// [`DispatchError::InvalidArguments`] listing every bad field, or
    /// [`DispatchError::HandlerError`] if the handler fails.
    pub fn dispatch(&self, name: &str, raw_args: &Value) -> Result<Value, DispatchError> {
        let tool = self
            .registry
            .get(name)
            .map_err(|_| DispatchError::ToolNotFound(name.to_string()))?;

        let args = validate(tool.schema(), raw_args).map_err(|errors| {
            tracing::warn!(tool = %name, errors = %errors, "Rejected tool arguments");
            DispatchError::InvalidArguments(errors)
        })?;

        match panic::catch_unwind(AssertUnwindSafe(|| tool.invoke(&args))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => {
                tracing::warn!(tool = %name, error = %message, "Tool handler failed");
                Err(DispatchError::HandlerError(message))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(tool = %name, panic = %message, "Tool handler panicked");
                Err(DispatchError::HandlerError(message))
            }
        }
    }
}

/// Renders a tool result for display: strings as-is, anything else as JSON.
#[must_use]
pub fn result_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}
