//! JSON-RPC client for the HTTP transport.
//!
//! The client keeps only what the protocol needs between calls: the next
//! correlation id, the session id handed out by `initialize`, the negotiated
//! protocol version, and the tool schemas from the last `tools.list`. When
//! schemas are cached, calls are validated locally with the same rules the
//! server's dispatcher applies, so bad arguments never leave the process.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

use crate::client::backend::ToolBackend;
use crate::client::error::ClientError;
use crate::config::ClientConfig;
use crate::mcp::protocol::{
    methods, ErrorCode, JsonRpcNotification, JsonRpcRequest, RequestId, ResponseEnvelope,
    PROTOCOL_VERSION,
};
use crate::mcp::registry::ToolListing;
use crate::mcp::schema::{validate, ValidationErrors};
use crate::mcp::transport::{SESSION_HEADER, UNKNOWN_SESSION};

/// Client name sent during `initialize`.
const CLIENT_NAME: &str = "school-tools-mcp";

/// A JSON-RPC client bound to one server endpoint.
#[derive(Debug)]
pub struct McpClient {
    http: Client,
    url: String,
    timeout: Duration,
    next_id: i64,
    session_id: Option<String>,
    protocol_version: Option<String>,
    tools: Option<Vec<ToolListing>>,
}

impl McpClient {
    /// Creates a client for `endpoint` with a per-call timeout.
    ///
    /// No connection is made until the first call.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            url: format!("{}/", endpoint.trim_end_matches('/')),
            timeout,
            next_id: 0,
            session_id: None,
            protocol_version: None,
            tools: None,
        })
    }

    /// Creates a client from the `client` configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(&config.endpoint, Duration::from_secs(config.timeout_secs))
    }

    /// The session id issued by the server, once open.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The negotiated protocol version, once open.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Whether the handshake has completed.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.protocol_version.is_some()
    }

    /// Tool schemas cached from the last listing.
    #[must_use]
    pub fn cached_tools(&self) -> Option<&[ToolListing]> {
        self.tools.as_deref()
    }

    fn next_request_id(&mut self) -> RequestId {
        self.next_id += 1;
        RequestId::Number(self.next_id)
    }

    async fn post<T: Serialize + Sync>(&mut self, body: &T) -> Result<reqwest::Response, ClientError> {
        let mut request = self.http.post(&self.url).json(body);
        if let Some(ref session_id) = self.session_id {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::from_http(&e, self.timeout))?;

        if let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(session_id.to_string());
        }

        Ok(response)
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value, ClientError> {
        let id = self.next_request_id();
        let request = JsonRpcRequest::new(id.clone(), method, params);
        tracing::debug!(method = %method, id = %id, "Sending request");

        let response = self.post(&request).await?;
        if !response.status().is_success() {
            return Err(ClientError::Protocol(format!(
                "HTTP {} for {method}",
                response.status()
            )));
        }

        let envelope: ResponseEnvelope = response
            .json()
            .await
            .map_err(|e| ClientError::from_http(&e, self.timeout))?;

        if envelope.id.as_ref().is_some_and(|got| *got != id) {
            return Err(ClientError::Protocol(format!(
                "response id {:?} does not match request id {id}",
                envelope.id
            )));
        }

        match (envelope.result, envelope.error) {
            (_, Some(error)) => Err(ClientError::Remote {
                code: error.code,
                message: error.message,
                data: error.data,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ClientError::Protocol(
                "response carries neither result nor error".to_string(),
            )),
        }
    }

    async fn notify(&mut self, method: &str) -> Result<(), ClientError> {
        let notification = JsonRpcNotification::new(method, None);
        let response = self.post(&notification).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClientError::Protocol(format!(
                "HTTP {} for {method}",
                response.status()
            )))
        }
    }

    /// Sends a request within the session, reopening it once if the server
    /// no longer knows it.
    async fn session_request(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, ClientError> {
        self.open().await?;
        match self.request(method, params.clone()).await {
            Err(ClientError::Remote { code, ref message, .. })
                if code == ErrorCode::ServerError.code() && message == UNKNOWN_SESSION =>
            {
                tracing::info!(
                    session = self.session_id.as_deref().unwrap_or("none"),
                    "Server forgot the session, reconnecting"
                );
                self.session_id = None;
                self.protocol_version = None;
                self.open().await?;
                self.request(method, params).await
            }
            other => other,
        }
    }

    /// Performs the `initialize` handshake and acknowledges it.
    ///
    /// Does nothing if already open.
    ///
    /// # Errors
    ///
    /// Returns transport, timeout, or protocol failures.
    pub async fn open(&mut self) -> Result<(), ClientError> {
        if self.is_open() {
            return Ok(());
        }

        let result = self
            .request(
                methods::INITIALIZE,
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": CLIENT_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                })),
            )
            .await?;

        let version = result
            .get("protocolVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Protocol("initialize result has no protocolVersion".into()))?;
        if version != PROTOCOL_VERSION {
            tracing::warn!(server = %version, client = PROTOCOL_VERSION, "Protocol version differs");
        }
        self.protocol_version = Some(version.to_string());

        self.notify(methods::INITIALIZED).await?;
        tracing::info!(
            url = %self.url,
            session = self.session_id.as_deref().unwrap_or("none"),
            "Connected to tool server"
        );
        Ok(())
    }

    /// Fetches the tool listing and caches its schemas.
    ///
    /// # Errors
    ///
    /// Returns transport, timeout, remote, or protocol failures.
    pub async fn list_tools(&mut self) -> Result<Vec<ToolListing>, ClientError> {
        let result = self.session_request(methods::TOOLS_LIST, None).await?;
        let tools = ToolListing::from_listing_json(&result).map_err(ClientError::Protocol)?;
        self.tools = Some(tools.clone());
        Ok(tools)
    }

    /// Calls a tool and returns its result.
    ///
    /// Opens the session first if needed, and reopens it once if the server
    /// has forgotten it. When schemas are cached the arguments are validated
    /// locally before sending.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownTool`] or [`ClientError::InvalidArguments`]
    /// for calls rejected locally or by the server, and transport, timeout,
    /// remote, or protocol failures otherwise.
    pub async fn call(&mut self, name: &str, args: Value) -> Result<Value, ClientError> {
        if let Some(ref tools) = self.tools {
            let tool = tools
                .iter()
                .find(|t| t.name == name)
                .ok_or_else(|| ClientError::UnknownTool(name.to_string()))?;
            validate(&tool.schema, &args).map_err(ClientError::InvalidArguments)?;
        }

        let params = json!({ "tool": name, "args": args });
        match self.session_request(methods::TOOLS_CALL, Some(params)).await {
            Err(ClientError::Remote { code, .. }) if code == ErrorCode::MethodNotFound.code() => {
                Err(ClientError::UnknownTool(name.to_string()))
            }
            Err(ClientError::Remote {
                code,
                message,
                data,
            }) if code == ErrorCode::InvalidParams.code() => {
                match data
                    .as_ref()
                    .and_then(|d| d.get("fields"))
                    .and_then(ValidationErrors::from_json)
                {
                    Some(errors) => Err(ClientError::InvalidArguments(errors)),
                    None => Err(ClientError::Remote {
                        code,
                        message,
                        data,
                    }),
                }
            }
            other => other,
        }
    }

    /// Ends the session on the server and forgets local state.
    ///
    /// # Errors
    ///
    /// Returns transport or timeout failures.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        if let Some(session_id) = self.session_id.take() {
            self.http
                .delete(&self.url)
                .header(SESSION_HEADER, session_id)
                .send()
                .await
                .map_err(|e| ClientError::from_http(&e, self.timeout))?;
        }
        self.protocol_version = None;
        self.tools = None;
        Ok(())
    }
}

#[async_trait]
impl ToolBackend for McpClient {
    async fn call_tool(&mut self, name: &str, args: Value) -> Result<Value, ClientError> {
        self.call(name, args).await
    }

    async fn list_tools(&mut self) -> Result<Vec<ToolListing>, ClientError> {
        Self::list_tools(self).await
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        Self::close(self).await
    }
}
