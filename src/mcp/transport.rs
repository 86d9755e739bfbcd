//! HTTP transport.
//!
//! - `POST /` (alias `POST /mcp`): one JSON-RPC envelope per request body
//! - `DELETE /` (alias `DELETE /mcp`): closes the session named by the header
//! - `GET /`, `GET /health`: liveness
//! - `POST /tools/report_absence`, `GET /tools/get_lunch_menu`: REST binding
//!
//! A successful `initialize` sent without a session header opens a session
//! and returns its id in the `mcp-session-id` response header. Requests that
//! carry the header are bound to that session's lifecycle state; requests
//! without it are handled in a throwaway session. Notifications are answered
//! with `202 Accepted` and an empty body. Idle sessions expire and the table
//! is capped, see [`SessionLimits`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::ServeError;
use crate::mcp::protocol::{parse_message, JsonRpcError, OutgoingMessage};
use crate::mcp::rest;
use crate::mcp::server::{McpServer, Session};

/// Header carrying the session id.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Error message for requests naming a session the server does not hold.
pub const UNKNOWN_SESSION: &str = "Unknown session";

/// Bounds on the session table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Most sessions kept at once. Opening one more evicts the least recently used.
    pub max_sessions: usize,
    /// Sessions unused for this long are forgotten.
    pub idle_timeout: Duration,
}

impl SessionLimits {
    /// Reads the limits from the server section of the config.
    #[must_use]
    pub const fn from_config(config: &ServerConfig) -> Self {
        Self {
            max_sessions: config.max_sessions,
            idle_timeout: Duration::from_secs(config.session_idle_secs),
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

#[derive(Debug)]
struct SessionEntry {
    session: Arc<Mutex<Session>>,
    last_seen: Instant,
}

/// Shared state of the HTTP server.
///
/// The table lock is only held to look sessions up; each session has its own
/// lock, so requests on different sessions run concurrently.
#[derive(Debug, Clone)]
pub struct AppState {
    pub(crate) server: Arc<McpServer>,
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
    limits: SessionLimits,
}

impl AppState {
    /// Wraps a session handler with the default session limits.
    #[must_use]
    pub fn new(server: McpServer) -> Self {
        Self::with_limits(server, SessionLimits::default())
    }

    /// Wraps a session handler.
    #[must_use]
    pub fn with_limits(server: McpServer, limits: SessionLimits) -> Self {
        Self {
            server: Arc::new(server),
            sessions: Arc::default(),
            limits,
        }
    }

    /// Number of open sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Looks up a live session and marks it used.
    async fn checkout(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        let mut sessions = self.sessions.lock().await;

        let expired = sessions
            .get(session_id)
            .is_some_and(|entry| entry.last_seen.elapsed() >= self.limits.idle_timeout);
        if expired {
            sessions.remove(session_id);
            tracing::info!(session = %session_id, "Session expired");
            return None;
        }

        let entry = sessions.get_mut(session_id)?;
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.session))
    }

    /// Stores a freshly initialised session and returns its id.
    async fn open(&self, session: Session) -> String {
        let mut sessions = self.sessions.lock().await;

        let idle_timeout = self.limits.idle_timeout;
        sessions.retain(|_, entry| entry.last_seen.elapsed() < idle_timeout);

        while sessions.len() >= self.limits.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            tracing::info!(session = %oldest, "Session evicted");
        }

        let session_id = Uuid::new_v4().to_string();
        sessions.insert(
            session_id.clone(),
            SessionEntry {
                session: Arc::new(Mutex::new(session)),
                last_seen: Instant::now(),
            },
        );
        session_id
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root).post(handle_rpc).delete(close_session))
        .route("/mcp", post(handle_rpc).delete(close_session))
        .route("/health", get(health))
        .route("/tools/report_absence", post(rest::report_absence))
        .route("/tools/get_lunch_menu", get(rest::lunch_menu))
        .with_state(state)
}

/// Binds `addr` and serves until SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or serving fails.
pub async fn serve(state: AppState, addr: &str) -> Result<(), ServeError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    tracing::info!(
        addr = %addr,
        strict = state.server.is_strict(),
        max_sessions = state.limits.max_sessions,
        "HTTP server listening"
    );
    serve_listener(listener, state).await
}

/// Serves on an already-bound listener until SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns an error if serving fails.
pub async fn serve_listener(listener: TcpListener, state: AppState) -> Result<(), ServeError> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServeError::Io)?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

fn session_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn handle_rpc(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let (reply, opened) = match session_header(&headers) {
        Some(session_id) => match state.checkout(&session_id).await {
            Some(session) => {
                let mut session = session.lock().await;
                (state.server.handle_bytes(&mut session, &body), None)
            }
            None => {
                tracing::warn!(session = %session_id, "Request for unknown session");
                let id = parse_message(&body).ok().and_then(|m| m.id().cloned());
                let error: OutgoingMessage = JsonRpcError::server_error(id, UNKNOWN_SESSION).into();
                (Some(error), None)
            }
        },
        None => {
            let mut session = Session::new();
            let reply = state.server.handle_bytes(&mut session, &body);
            if session.is_ready() {
                let session_id = state.open(session).await;
                tracing::info!(session = %session_id, "Session opened");
                (reply, Some(session_id))
            } else {
                (reply, None)
            }
        }
    };

    let mut response = match reply {
        Some(message) => Json(message).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };

    if let Some(value) = opened.and_then(|id| HeaderValue::from_str(&id).ok()) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

async fn close_session(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let Some(session_id) = session_header(&headers) else {
        return StatusCode::BAD_REQUEST;
    };

    if state.sessions.lock().await.remove(&session_id).is_some() {
        tracing::info!(session = %session_id, "Session closed");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "message": "School Assistant API is running"}))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy"}))
}

/// Resolves on SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut sigint), Ok(mut sigterm)) = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) else {
        tracing::warn!("Could not install signal handlers");
        return std::future::pending().await;
    };

    tokio::select! {
        _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

/// Resolves on Ctrl+C.
#[cfg(not(unix))]
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received Ctrl+C, initiating graceful shutdown");
    } else {
        tracing::warn!("Could not install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}
