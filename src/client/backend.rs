//! The seam between the chat routers and whatever executes tools.

use async_trait::async_trait;
use serde_json::Value;

use crate::client::error::ClientError;
use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::registry::ToolListing;

/// Something that can list and call tools.
///
/// Implemented by the JSON-RPC client, the REST client, and an in-process
/// backend that calls the dispatcher directly.
#[async_trait]
pub trait ToolBackend: Send {
    /// Calls a tool with raw JSON arguments.
    async fn call_tool(&mut self, name: &str, args: Value) -> Result<Value, ClientError>;

    /// Lists the tools on offer.
    async fn list_tools(&mut self) -> Result<Vec<ToolListing>, ClientError>;

    /// Releases anything held on the far side, such as a server session.
    async fn close(&mut self) -> Result<(), ClientError> {
        Ok(())
    }
}

#[async_trait]
impl<B: ToolBackend + ?Sized> ToolBackend for Box<B> {
    async fn call_tool(&mut self, name: &str, args: Value) -> Result<Value, ClientError> {
        (**self).call_tool(name, args).await
    }

    async fn list_tools(&mut self) -> Result<Vec<ToolListing>, ClientError> {
        (**self).list_tools().await
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        (**self).close().await
    }
}

/// Calls the dispatcher in-process, with no transport in between.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    dispatcher: Dispatcher,
}

impl LocalBackend {
    /// Wraps a dispatcher.
    #[must_use]
    pub const fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl ToolBackend for LocalBackend {
    async fn call_tool(&mut self, name: &str, args: Value) -> Result<Value, ClientError> {
        Ok(self.dispatcher.dispatch(name, &args)?)
    }

    async fn list_tools(&mut self) -> Result<Vec<ToolListing>, ClientError> {
        Ok(self.dispatcher.registry().list())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tools::{self, absence};

    #[tokio::test]
    async fn local_backend_matches_dispatcher() {
        let dispatcher = tools::builtin_dispatcher().unwrap();
        let args = json!({"date": "2025-11-09", "reason": "sick"});
        let direct = dispatcher.dispatch(absence::NAME, &args).unwrap();

        let mut backend: Box<dyn ToolBackend> = Box::new(LocalBackend::new(dispatcher));
        let via_backend = backend.call_tool(absence::NAME, args).await.unwrap();
        assert_eq!(direct, via_backend);
        assert_eq!(backend.list_tools().await.unwrap(), tools::builtin_listing());
    }

    #[tokio::test]
    async fn local_backend_reports_unknown_tool() {
        let mut backend = LocalBackend::new(tools::builtin_dispatcher().unwrap());
        let err = backend.call_tool("homework", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::UnknownTool(ref n) if n == "homework"));
    }
}
