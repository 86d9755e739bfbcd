//! Session handling: method demultiplexing and the connection lifecycle.
//!
//! Each connection owns a [`Session`] with two states:
//!
//! 1. **Uninitialized**: waiting for `initialize`
//! 2. **Ready**: servicing `tools.list` and `tools.call`
//!
//! In strict mode only `initialize` and `ping` are serviced before the
//! handshake. In lenient mode (the default) the tool methods are serviced in
//! either state, which is what stateless HTTP callers rely on.
//!
//! The handler never fails: every problem, including a panic while handling
//! a message, becomes an error envelope.

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mcp::dispatcher::{panic_message, Dispatcher};
use crate::mcp::protocol::{
    methods, parse_message, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, OutgoingMessage, RequestId, PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::registry::listing_json;

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for initialize request.
    Uninitialized,
    /// Handshake done.
    Ready,
}

/// Per-connection state.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
}

impl Session {
    /// Creates a session awaiting `initialize`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            protocol_version: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the handshake has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// The negotiated protocol version, once initialised.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: ToolCapabilities {
                list_changed: false,
            },
        }
    }
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Parameters for the initialize request. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for `tools.call`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub tool: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub args: Value,
}

/// The session handler, shared by every connection.
#[derive(Debug, Clone)]
pub struct McpServer {
    dispatcher: Dispatcher,
    info: ServerInfo,
    strict: bool,
}

impl McpServer {
    /// Creates a lenient server over a dispatcher.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            info: ServerInfo::default(),
            strict: false,
        }
    }

    /// Requires `initialize` before any tool method.
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Whether the lifecycle is enforced.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// The dispatcher behind `tools.call`.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handles one raw message body.
    ///
    /// Returns `None` for notifications.
    pub fn handle_bytes(&self, session: &mut Session, body: &[u8]) -> Option<OutgoingMessage> {
        match parse_message(body) {
            Ok(msg) => self.handle_message(session, msg),
            Err(error) => {
                tracing::debug!(code = error.error.code, "Rejected malformed envelope");
                Some(error.into())
            }
        }
    }

    /// Handles a parsed message.
    ///
    /// Returns `None` for notifications.
    pub fn handle_message(
        &self,
        session: &mut Session,
        msg: IncomingMessage,
    ) -> Option<OutgoingMessage> {
        let reply_to = match &msg {
            IncomingMessage::Request(req) => Some(req.id.clone()),
            IncomingMessage::Notification(_) => None,
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match msg {
            IncomingMessage::Request(req) => Some(self.handle_request(session, &req)),
            IncomingMessage::Notification(ref notif) => {
                Self::handle_notification(session, notif);
                None
            }
        }));

        outcome.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::error!(panic = %message, "Panic while handling message");
            reply_to.map(|id| JsonRpcError::server_error(id, message).into())
        })
    }

    /// Handles an incoming request.
    fn handle_request(&self, session: &mut Session, req: &JsonRpcRequest) -> OutgoingMessage {
        tracing::debug!(method = %req.method, id = ?req.id, "Handling request");

        let response = match req.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(session, req),
            methods::PING => Ok(JsonRpcResponse::success(req.id.clone(), json!({}))),
            methods::TOOLS_LIST => self.handle_tools_list(session, req),
            methods::TOOLS_CALL => self.handle_tools_call(session, req),
            _ => Err(JsonRpcError::method_not_found(
                req.id.clone(),
                &req.method,
            )),
        };

        match response {
            Ok(resp) => resp.into(),
            Err(error) => error.into(),
        }
    }

    /// Handles an incoming notification.
    fn handle_notification(session: &Session, notif: &JsonRpcNotification) {
        if notif.method == methods::INITIALIZED {
            tracing::debug!(ready = session.is_ready(), "Client acknowledged initialisation");
        } else {
            tracing::debug!(method = %notif.method, "Ignoring notification");
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(
        &self,
        session: &mut Session,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        if session.is_ready() {
            return Err(JsonRpcError::server_error(
                req.id.clone(),
                "Server already initialised",
            ));
        }

        let params: InitializeParams = req
            .params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| {
                JsonRpcError::invalid_params(
                    req.id.clone(),
                    format!("Invalid initialize params: {e}"),
                )
            })?
            .unwrap_or_default();

        if let Some(ref client) = params.client_info {
            tracing::info!(
                client = %client.name,
                version = client.version.as_deref().unwrap_or("unknown"),
                requested = params.protocol_version.as_deref().unwrap_or("none"),
                "Client connected"
            );
        }

        session.protocol_version = Some(PROTOCOL_VERSION.to_string());
        session.state = SessionState::Ready;

        let result = json!({
            "serverInfo": self.info,
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": ServerCapabilities::default(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the `tools.list` request.
    fn handle_tools_list(
        &self,
        session: &Session,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_ready(session, req.id.as_ref())?;

        let listing = listing_json(&self.dispatcher.registry().list());
        Ok(JsonRpcResponse::success(req.id.clone(), listing))
    }

    /// Handles the `tools.call` request.
    fn handle_tools_call(
        &self,
        session: &Session,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_ready(session, req.id.as_ref())?;

        let params: ToolCallParams = req
            .params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| {
                JsonRpcError::invalid_params(
                    req.id.clone(),
                    format!("Invalid tool call params: {e}"),
                )
            })?
            .ok_or_else(|| {
                JsonRpcError::invalid_params(req.id.clone(), "Missing tool call params")
            })?;

        tracing::info!(tool = %params.tool, "Tool call");

        self.dispatcher
            .dispatch(&params.tool, &params.args)
            .map(|result| JsonRpcResponse::success(req.id.clone(), result))
            .map_err(|e| e.to_jsonrpc_error(req.id.clone()))
    }

    /// Enforces the handshake in strict mode.
    fn require_ready(&self, session: &Session, id: Option<&RequestId>) -> Result<(), JsonRpcError> {
        if self.strict && !session.is_ready() {
            return Err(JsonRpcError::server_error(
                id.cloned(),
                "Server not initialised",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools;

    fn server() -> McpServer {
        McpServer::new(tools::builtin_dispatcher().unwrap())
    }

    fn request(server: &McpServer, session: &mut Session, body: &str) -> OutgoingMessage {
        server
            .handle_bytes(session, body.as_bytes())
            .expect("request should produce a reply")
    }

    #[test]
    fn initialize_transitions_to_ready() {
        let server = server();
        let mut session = Session::new();
        assert_eq!(session.state(), SessionState::Uninitialized);

        let reply = request(
            &server,
            &mut session,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
        );
        let result = reply.result().unwrap();
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
        assert!(session.is_ready());
        assert_eq!(session.protocol_version(), Some(PROTOCOL_VERSION));
    }

    #[test]
    fn second_initialize_rejected() {
        let server = server();
        let mut session = Session::new();
        let init = r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#;
        request(&server, &mut session, init);
        let reply = request(&server, &mut session, init);
        assert_eq!(reply.error().unwrap().code, -32000);
    }

    #[test]
    fn notification_has_no_reply() {
        let server = server();
        let mut session = Session::new();
        let reply = server.handle_bytes(
            &mut session,
            br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        );
        assert!(reply.is_none());
    }

    #[test]
    fn strict_mode_requires_initialize() {
        let server = server().strict(true);
        let mut session = Session::new();
        let list = r#"{"jsonrpc":"2.0","id":2,"method":"tools.list"}"#;

        let reply = request(&server, &mut session, list);
        assert_eq!(reply.error().unwrap().code, -32000);
        assert_eq!(reply.id(), Some(&RequestId::Number(2)));

        request(
            &server,
            &mut session,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
        );
        let reply = request(&server, &mut session, list);
        assert!(reply.result().unwrap().get("report_absence").is_some());
    }

    #[test]
    fn lenient_mode_serves_without_handshake() {
        let server = server();
        let mut session = Session::new();
        let reply = request(
            &server,
            &mut session,
            r#"{"jsonrpc":"2.0","id":5,"method":"tools.call","params":{"tool":"lunch_menu","args":{"date":"2025-11-07"}}}"#,
        );
        assert_eq!(
            reply.result().unwrap(),
            "Cheese Pizza, Garden Salad, Apple Slices, Milk"
        );
    }

    #[test]
    fn unknown_method() {
        let server = server();
        let mut session = Session::new();
        let reply = request(
            &server,
            &mut session,
            r#"{"jsonrpc":"2.0","id":3,"method":"resources.list"}"#,
        );
        assert_eq!(reply.error().unwrap().code, -32601);
        assert_eq!(reply.id(), Some(&RequestId::Number(3)));
    }

    #[test]
    fn unknown_tool_is_method_not_found() {
        let server = server();
        let mut session = Session::new();
        let reply = request(
            &server,
            &mut session,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools.call","params":{"tool":"homework","args":{}}}"#,
        );
        assert_eq!(reply.error().unwrap().code, -32601);
    }

    #[test]
    fn missing_call_params() {
        let server = server();
        let mut session = Session::new();
        let reply = request(
            &server,
            &mut session,
            r#"{"jsonrpc":"2.0","id":6,"method":"tools.call"}"#,
        );
        assert_eq!(reply.error().unwrap().code, -32602);
    }

    #[test]
    fn malformed_body_gets_null_id() {
        let server = server();
        let mut session = Session::new();
        let reply = request(&server, &mut session, "{not json");
        assert_eq!(reply.error().unwrap().code, -32000);
        assert!(reply.id().is_none());
    }

    #[test]
    fn idless_call_is_answered_with_null_id() {
        let server = server();
        let mut session = Session::new();
        let reply = request(
            &server,
            &mut session,
            r#"{"jsonrpc":"2.0","method":"tools.call","params":{"tool":"lunch_menu","args":{"date":"2025-11-07"}}}"#,
        );
        assert!(reply.id().is_none());
        assert_eq!(
            reply.result().unwrap(),
            "Cheese Pizza, Garden Salad, Apple Slices, Milk"
        );

        let reply = request(&server, &mut session, r#"{"jsonrpc":"2.0","method":"bogus"}"#);
        assert_eq!(reply.error().unwrap().code, -32601);
        assert!(reply.id().is_none());
        let json = serde_json::to_value(&reply).unwrap();
        assert!(json["id"].is_null());
    }

    #[test]
    fn ping_works_in_any_state() {
        let server = server().strict(true);
        let mut session = Session::new();
        let reply = request(
            &server,
            &mut session,
            r#"{"jsonrpc":"2.0","id":"p","method":"ping"}"#,
        );
        assert_eq!(reply.result(), Some(&json!({})));
    }
}
