//! Plain REST binding for the built-in tools.
//!
//! Both endpoints go through the same [`Dispatcher`](crate::mcp::dispatcher::Dispatcher)
//! as `tools.call`, so validation and results are identical across bindings.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mcp::dispatcher::{result_text, DispatchError};
use crate::mcp::schema::DATE_FORMAT;
use crate::mcp::transport::AppState;
use crate::tools::{absence, menu};

/// Reply of `POST /tools/report_absence`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsenceReply {
    /// Whether the absence was recorded.
    pub success: bool,
    /// Confirmation or failure description.
    pub message: String,
}

/// Reply of `GET /tools/get_lunch_menu`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuReply {
    /// Whether the lookup ran.
    pub success: bool,
    /// The menu or failure description.
    pub menu: String,
}

/// Query string of `GET /tools/get_lunch_menu`.
#[derive(Debug, Deserialize)]
pub struct MenuQuery {
    /// Menu date; today when omitted.
    pub date: Option<String>,
}

const fn status_for(error: &DispatchError) -> StatusCode {
    match error {
        DispatchError::ToolNotFound(_) => StatusCode::NOT_FOUND,
        DispatchError::InvalidArguments(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DispatchError::HandlerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn dispatch(state: &AppState, tool: &str, args: &Value) -> (StatusCode, bool, String) {
    match state.server.dispatcher().dispatch(tool, args) {
        Ok(result) => (StatusCode::OK, true, result_text(&result)),
        Err(e) => (status_for(&e), false, e.to_string()),
    }
}

pub(crate) async fn report_absence(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<AbsenceReply>) {
    let args: Value = match serde_json::from_slice(&body) {
        Ok(args) => args,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(AbsenceReply {
                    success: false,
                    message: format!("Malformed request body: {e}"),
                }),
            )
        }
    };

    let (status, success, message) = dispatch(&state, absence::NAME, &args);
    (status, Json(AbsenceReply { success, message }))
}

pub(crate) async fn lunch_menu(
    State(state): State<AppState>,
    Query(query): Query<MenuQuery>,
) -> (StatusCode, Json<MenuReply>) {
    let date = query
        .date
        .unwrap_or_else(|| Local::now().date_naive().format(DATE_FORMAT).to_string());

    let (status, success, menu) = dispatch(&state, menu::NAME, &json!({ "date": date }));
    (status, Json(MenuReply { success, menu }))
}
