//! The tool registry.
//!
//! Tools are registered once at startup and the registry is read-only
//! afterwards, so it can be shared behind an `Arc` without locking.

use std::fmt;

use indexmap::IndexMap;
use serde_json::{json, Value};
use thiserror::Error;

use crate::mcp::schema::{CallArguments, ToolSchema};

/// Function implementing a tool once its arguments are validated.
///
/// A returned `Err` is reported to the caller as a handler failure.
pub type ToolHandler = Box<dyn Fn(&CallArguments) -> Result<Value, String> + Send + Sync>;

/// Errors raised by the registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A tool with this name is already registered.
    #[error("tool already registered: {0}")]
    DuplicateTool(String),

    /// No tool with this name is registered.
    #[error("tool not found: {0}")]
    ToolNotFound(String),
}

/// A registered tool.
pub struct ToolDefinition {
    name: String,
    description: String,
    schema: ToolSchema,
    handler: ToolHandler,
}

impl ToolDefinition {
    /// Tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Argument schema.
    #[must_use]
    pub const fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    /// Runs the handler.
    ///
    /// # Errors
    ///
    /// Returns whatever failure message the handler produced.
    pub fn invoke(&self, args: &CallArguments) -> Result<Value, String> {
        (self.handler)(args)
    }

    /// The public view of this tool.
    #[must_use]
    pub fn listing(&self) -> ToolListing {
        ToolListing {
            name: self.name.clone(),
            description: self.description.clone(),
            schema: self.schema.clone(),
        }
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// What callers may see of a tool: everything except the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolListing {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Argument schema.
    pub schema: ToolSchema,
}

impl ToolListing {
    /// Parses the `tools.list` result into listings.
    ///
    /// # Errors
    ///
    /// Returns a description of the first malformed entry.
    pub fn from_listing_json(value: &Value) -> Result<Vec<Self>, String> {
        let tools = value
            .as_object()
            .ok_or_else(|| "tool listing must be an object".to_string())?;

        tools
            .iter()
            .map(|(name, entry)| {
                let description = entry
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let parameters = entry
                    .get("parameters")
                    .ok_or_else(|| format!("tool '{name}' has no parameters"))?;
                let schema = ToolSchema::from_json_schema(parameters)
                    .map_err(|e| format!("tool '{name}': {e}"))?;
                Ok(Self {
                    name: name.clone(),
                    description,
                    schema,
                })
            })
            .collect()
    }
}

/// Renders listings as the `tools.list` result: name → `{description, parameters}`.
#[must_use]
pub fn listing_json(listings: &[ToolListing]) -> Value {
    let map = listings
        .iter()
        .map(|tool| {
            (
                tool.name.clone(),
                json!({
                    "description": tool.description,
                    "parameters": tool.schema.to_json_schema(),
                }),
            )
        })
        .collect();
    Value::Object(map)
}

/// Mapping from tool name to definition, in registration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateTool`] if the name is taken; the
    /// existing registration is left untouched.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ToolSchema,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&CallArguments) -> Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }

        tracing::debug!(tool = %name, "Registering tool");
        self.tools.insert(
            name.clone(),
            ToolDefinition {
                name,
                description: description.into(),
                schema,
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    /// Looks up a tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ToolNotFound`] if no such tool exists.
    pub fn get(&self, name: &str) -> Result<&ToolDefinition, RegistryError> {
        self.tools
            .get(name)
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))
    }

    /// Returns the public listing of every tool, in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<ToolListing> {
        self.tools.values().map(ToolDefinition::listing).collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::schema::{ParamSpec, ParamType};

    fn echo_schema() -> ToolSchema {
        ToolSchema::new().param(ParamSpec::required("text", ParamType::String, "Text to echo"))
    }

    fn registry_with_echo() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register("echo", "Echo the input", echo_schema(), |args| {
                Ok(Value::from(args.str("text").unwrap_or_default()))
            })
            .unwrap();
        registry
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = registry_with_echo();
        let err = registry
            .register("echo", "Another echo", ToolSchema::new(), |_| Ok(Value::Null))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateTool("echo".to_string()));
        assert_eq!(registry.get("echo").unwrap().description(), "Echo the input");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn get_unknown_tool() {
        let registry = registry_with_echo();
        assert_eq!(
            registry.get("missing").unwrap_err(),
            RegistryError::ToolNotFound("missing".to_string())
        );
    }

    #[test]
    fn list_preserves_registration_order() {
        let mut registry = registry_with_echo();
        registry
            .register("alpha", "First letter", ToolSchema::new(), |_| Ok(Value::Null))
            .unwrap();
        let names: Vec<_> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["echo", "alpha"]);
    }

    #[test]
    fn listing_json_round_trip() {
        let registry = registry_with_echo();
        let json = listing_json(&registry.list());
        assert_eq!(json["echo"]["description"], "Echo the input");
        assert_eq!(json["echo"]["parameters"]["required"], json!(["text"]));

        let parsed = ToolListing::from_listing_json(&json).unwrap();
        assert_eq!(parsed, registry.list());
    }

    #[test]
    fn listing_without_parameters_is_rejected() {
        let json = json!({"echo": {"description": "Echo"}});
        assert!(ToolListing::from_listing_json(&json).is_err());
    }
}
