//! Integration tests for the tool protocol.
//!
//! These tests drive the session handler with raw JSON-RPC bodies and check
//! the dispatcher's contract against the built-in tools.

use serde_json::{json, Value};

use school_tools_mcp::mcp::protocol::{parse_message, IncomingMessage, RequestId};
use school_tools_mcp::mcp::registry::listing_json;
use school_tools_mcp::mcp::server::{McpServer, Session};
use school_tools_mcp::mcp::{DispatchError, ToolSchema};
use school_tools_mcp::tools::{self, absence, menu};

fn server() -> McpServer {
    McpServer::new(tools::builtin_dispatcher().unwrap())
}

fn send(server: &McpServer, session: &mut Session, body: &Value) -> Value {
    let bytes = serde_json::to_vec(body).unwrap();
    let reply = server
        .handle_bytes(session, &bytes)
        .expect("requests always get a reply");
    serde_json::to_value(reply).unwrap()
}

fn call(id: i64, tool: &str, args: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools.call",
        "params": {"tool": tool, "args": args},
    })
}

// =============================================================================
// Protocol Parsing Tests
// =============================================================================

#[test]
fn test_parse_initialize_request() {
    let json = br#"{
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": {
                "name": "test-client",
                "version": "1.0.0"
            }
        }
    }"#;

    let IncomingMessage::Request(req) = parse_message(json).unwrap() else {
        panic!("Expected Request");
    };
    assert_eq!(req.method, "initialize");
    assert_eq!(req.id, Some(RequestId::Number(1)));
}

#[test]
fn test_parse_tools_call_request() {
    let json = br#"{
        "jsonrpc": "2.0",
        "id": "call-1",
        "method": "tools.call",
        "params": {"tool": "lunch_menu", "args": {"date": "2025-11-07"}}
    }"#;

    let msg = parse_message(json).unwrap();
    assert_eq!(msg.method(), "tools.call");
    assert_eq!(msg.id(), Some(&RequestId::String("call-1".to_string())));
}

#[test]
fn test_parse_notification() {
    let json = br#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#;
    assert!(matches!(
        parse_message(json).unwrap(),
        IncomingMessage::Notification(_)
    ));
}

// =============================================================================
// Session Handler Tests
// =============================================================================

#[test]
fn test_initialize_result() {
    let server = server();
    let mut session = Session::new();
    let reply = send(
        &server,
        &mut session,
        &json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
    );

    assert_eq!(reply["id"], 1);
    assert_eq!(reply["result"]["serverInfo"]["name"], "School Tools MCP");
    assert_eq!(reply["result"]["protocolVersion"], "2025-06-18");
    assert!(reply["result"]["capabilities"]["tools"].is_object());
    assert!(session.is_ready());
}

#[test]
fn test_initialize_then_report_absence() {
    let server = server();
    let mut session = Session::new();
    send(
        &server,
        &mut session,
        &json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
    );
    let notify = br#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#;
    assert!(server.handle_bytes(&mut session, notify).is_none());

    let reply = send(
        &server,
        &mut session,
        &call(2, absence::NAME, &json!({"date": "2025-11-09", "reason": "flu"})),
    );
    assert_eq!(reply["id"], 2);
    let text = reply["result"].as_str().unwrap();
    assert!(text.contains("2025-11-09"));
    assert!(text.contains("flu"));
}

#[test]
fn test_unknown_tool_is_method_not_found() {
    let server = server();
    let mut session = Session::new();
    let reply = send(&server, &mut session, &call(5, "homework", &json!({})));
    assert_eq!(reply["id"], 5);
    assert_eq!(reply["error"]["code"], -32601);
}

#[test]
fn test_unknown_method() {
    let server = server();
    let mut session = Session::new();
    let reply = send(
        &server,
        &mut session,
        &json!({"jsonrpc": "2.0", "id": 6, "method": "tools/list"}),
    );
    assert_eq!(reply["error"]["code"], -32601);
}

#[test]
fn test_malformed_bodies_never_crash() {
    let server = server();
    let mut session = Session::new();
    for body in [
        &b"not json"[..],
        b"[]",
        b"{}",
        br#"{"jsonrpc": "2.0", "id": 1}"#,
        br#"{"jsonrpc": "2.0", "id": {"x": 1}, "method": "ping"}"#,
    ] {
        let reply = server.handle_bytes(&mut session, body).unwrap();
        let reply = serde_json::to_value(reply).unwrap();
        assert_eq!(reply["error"]["code"], -32000);
        assert!(reply.get("id").is_some());
    }
}

#[test]
fn test_missing_and_unrecognized_fields_listed() {
    let server = server();
    let mut session = Session::new();
    let reply = send(
        &server,
        &mut session,
        &call(7, absence::NAME, &json!({"date": "2025-11-09", "reason": "x", "grade": 3})),
    );
    assert_eq!(reply["error"]["code"], -32602);
    assert_eq!(reply["error"]["data"]["fields"][0]["field"], "grade");

    let reply = send(&server, &mut session, &call(8, absence::NAME, &json!({"date": "2025-11-09"})));
    assert_eq!(reply["error"]["code"], -32602);
    assert_eq!(reply["error"]["data"]["fields"][0]["field"], "reason");
}

#[test]
fn test_strict_mode_requires_initialize() {
    let server = server().strict(true);
    let mut session = Session::new();
    let reply = send(
        &server,
        &mut session,
        &json!({"jsonrpc": "2.0", "id": 1, "method": "tools.list"}),
    );
    assert_eq!(reply["error"]["code"], -32000);

    send(
        &server,
        &mut session,
        &json!({"jsonrpc": "2.0", "id": 2, "method": "initialize"}),
    );
    let reply = send(
        &server,
        &mut session,
        &json!({"jsonrpc": "2.0", "id": 3, "method": "tools.list"}),
    );
    assert!(reply["result"].is_object());
}

// =============================================================================
// Dispatcher Contract Tests
// =============================================================================

#[test]
fn test_dispatch_equals_direct_handler_call() {
    let dispatcher = tools::builtin_dispatcher().unwrap();

    let result = dispatcher
        .dispatch(absence::NAME, &json!({"date": "2025-11-09", "reason": "sick"}))
        .unwrap();
    assert_eq!(result, json!(absence::report_absence("2025-11-09", "sick")));

    for date in ["2025-11-07", "2025-11-08", "2025-11-09", "2099-01-01"] {
        let result = dispatcher.dispatch(menu::NAME, &json!({"date": date})).unwrap();
        assert_eq!(result, json!(menu::lunch_menu(date)));
    }
}

#[test]
fn test_report_absence_is_idempotent() {
    let dispatcher = tools::builtin_dispatcher().unwrap();
    let args = json!({"date": "2025-11-09", "reason": "sick"});
    let first = dispatcher.dispatch(absence::NAME, &args).unwrap();
    let second = dispatcher.dispatch(absence::NAME, &args).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_lunch_menu_scenarios() {
    let dispatcher = tools::builtin_dispatcher().unwrap();
    assert_eq!(
        dispatcher.dispatch(menu::NAME, &json!({"date": "2025-11-07"})).unwrap(),
        "Cheese Pizza, Garden Salad, Apple Slices, Milk"
    );
    assert_eq!(
        dispatcher.dispatch(menu::NAME, &json!({"date": "2099-01-01"})).unwrap(),
        menu::NO_MENU
    );
}

#[test]
fn test_bad_date_is_invalid_not_defaulted() {
    let dispatcher = tools::builtin_dispatcher().unwrap();
    let err = dispatcher
        .dispatch(menu::NAME, &json!({"date": "tomorrow"}))
        .unwrap_err();
    let DispatchError::InvalidArguments(errors) = err else {
        panic!("expected InvalidArguments");
    };
    assert_eq!(errors.fields(), vec!["date"]);
}

#[test]
fn test_listed_schemas_are_dispatch_schemas() {
    let server = server();
    let mut session = Session::new();
    let reply = send(
        &server,
        &mut session,
        &json!({"jsonrpc": "2.0", "id": 1, "method": "tools.list"}),
    );

    let registry = tools::builtin_registry().unwrap();
    assert_eq!(reply["result"], listing_json(&registry.list()));

    for tool in registry.list() {
        let listed = &reply["result"][tool.name.as_str()]["parameters"];
        assert_eq!(ToolSchema::from_json_schema(listed).unwrap(), tool.schema);
    }
}
