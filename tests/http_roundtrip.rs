//! End-to-end tests: real HTTP server on an ephemeral port, real clients.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;
use tokio::net::TcpListener;

use school_tools_mcp::assistant::{ChatContext, KeywordRouter};
use school_tools_mcp::client::{ClientError, McpClient, RestClient, ToolBackend};
use school_tools_mcp::config::load_config;
use school_tools_mcp::mcp::server::McpServer;
use school_tools_mcp::mcp::transport::{serve_listener, AppState, SESSION_HEADER};
use school_tools_mcp::tools::{self, absence, menu};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server(strict: bool) -> SocketAddr {
    start_server_with_state(strict).await.0
}

async fn start_server_with_state(strict: bool) -> (SocketAddr, AppState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = McpServer::new(tools::builtin_dispatcher().unwrap()).strict(strict);
    let state = AppState::new(server);
    tokio::spawn(serve_listener(listener, state.clone()));
    (addr, state)
}

fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 6).unwrap()
}

#[tokio::test]
async fn rpc_client_full_session() {
    let addr = start_server(true).await;
    let mut client = McpClient::new(&format!("http://{addr}"), TIMEOUT).unwrap();

    client.open().await.unwrap();
    assert!(client.is_open());
    assert!(client.session_id().is_some());
    assert_eq!(client.protocol_version(), Some("2025-06-18"));

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools, tools::builtin_listing());

    let result = client
        .call(absence::NAME, json!({"date": "2025-11-09", "reason": "flu"}))
        .await
        .unwrap();
    let text = result.as_str().unwrap();
    assert!(text.contains("2025-11-09") && text.contains("flu"));

    let result = client
        .call(menu::NAME, json!({"date": "2025-11-07"}))
        .await
        .unwrap();
    assert_eq!(result, "Cheese Pizza, Garden Salad, Apple Slices, Milk");

    client.close().await.unwrap();
    assert!(!client.is_open());
}

#[tokio::test]
async fn rpc_client_validates_locally_once_listed() {
    let addr = start_server(false).await;
    let mut client = McpClient::new(&format!("http://{addr}"), TIMEOUT).unwrap();
    client.list_tools().await.unwrap();

    let err = client
        .call(absence::NAME, json!({"date": "2025-11-09"}))
        .await
        .unwrap_err();
    let ClientError::InvalidArguments(errors) = err else {
        panic!("expected InvalidArguments, got {err:?}");
    };
    assert!(errors.mentions("reason"));

    let err = client.call("homework", json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::UnknownTool(_)));
}

#[tokio::test]
async fn rpc_client_surfaces_remote_errors_without_listing() {
    let addr = start_server(false).await;
    let mut client = McpClient::new(&format!("http://{addr}"), TIMEOUT).unwrap();

    let err = client.call("homework", json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::UnknownTool(ref n) if n == "homework"));

    let err = client
        .call(menu::NAME, json!({"date": "11/07/2025"}))
        .await
        .unwrap_err();
    let ClientError::InvalidArguments(errors) = err else {
        panic!("expected InvalidArguments, got {err:?}");
    };
    assert_eq!(errors.fields(), vec!["date"]);
    assert!(client.cached_tools().is_none());
}

#[tokio::test]
async fn rpc_client_reopens_a_forgotten_session() {
    let addr = start_server(true).await;
    let endpoint = format!("http://{addr}");
    let mut client = McpClient::new(&endpoint, TIMEOUT).unwrap();
    client.open().await.unwrap();
    let first = client.session_id().unwrap().to_string();

    let status = reqwest::Client::new()
        .delete(format!("{endpoint}/"))
        .header(SESSION_HEADER, &first)
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::NO_CONTENT);

    for _ in 0..3 {
        let result = client
            .call(menu::NAME, json!({"date": "2025-11-07"}))
            .await
            .unwrap();
        assert_eq!(result, "Cheese Pizza, Garden Salad, Apple Slices, Milk");
    }
    assert!(client.is_open());
    assert_ne!(client.session_id(), Some(first.as_str()));
}

/// Accepts connections and never answers them.
async fn silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

#[tokio::test]
async fn silent_server_times_out() {
    let addr = silent_server().await;
    let limit = Duration::from_millis(300);

    let mut client = McpClient::new(&format!("http://{addr}"), limit).unwrap();
    let err = client
        .call(menu::NAME, json!({"date": "2025-11-07"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout(d) if d == limit), "got {err:?}");

    let client = McpClient::new(&format!("http://{addr}"), limit).unwrap();
    let mut router = KeywordRouter::new(Box::new(client));
    let mut ctx = ChatContext::new();
    router.respond_on(&mut ctx, "absent tomorrow", today()).await;
    assert!(ctx.is_awaiting());

    let reply = router.respond_on(&mut ctx, "flu", today()).await;
    assert!(reply.starts_with("❌"), "got {reply}");
    assert!(!ctx.is_awaiting());
}

#[tokio::test]
async fn rest_client_matches_rpc_results() {
    let addr = start_server(false).await;
    let endpoint = format!("http://{addr}");
    let mut rest = RestClient::new(&endpoint, TIMEOUT).unwrap();
    let mut rpc = McpClient::new(&endpoint, TIMEOUT).unwrap();

    for (tool, args) in [
        (absence::NAME, json!({"date": "2025-11-09", "reason": "sick"})),
        (menu::NAME, json!({"date": "2025-11-08"})),
        (menu::NAME, json!({"date": "2099-01-01"})),
    ] {
        let via_rest = rest.call_tool(tool, args.clone()).await.unwrap();
        let via_rpc = rpc.call_tool(tool, args).await.unwrap();
        assert_eq!(via_rest, via_rpc);
    }

    let todays = rest.lunch_menu(None).await.unwrap();
    assert!(!todays.is_empty());
}

#[tokio::test]
async fn keyword_chat_over_http() {
    let addr = start_server(false).await;
    let client = McpClient::new(&format!("http://{addr}"), TIMEOUT).unwrap();
    let mut router = KeywordRouter::new(Box::new(client));
    let mut ctx = ChatContext::new();

    router
        .respond_on(&mut ctx, "I won't be there on 2025-11-09", today())
        .await;
    assert!(ctx.is_awaiting());

    let reply = router.respond_on(&mut ctx, "sick", today()).await;
    assert_eq!(reply, "✅ Absence reported for 2025-11-09. Reason: sick");
    assert!(!ctx.is_awaiting());
}

#[tokio::test]
async fn closing_the_router_ends_the_server_session() {
    let (addr, state) = start_server_with_state(false).await;
    let client = McpClient::new(&format!("http://{addr}"), TIMEOUT).unwrap();
    let mut router = KeywordRouter::new(Box::new(client));
    let mut ctx = ChatContext::new();

    let reply = router
        .respond_on(&mut ctx, "what's for lunch on 2025-11-07", today())
        .await;
    assert!(reply.contains("Cheese Pizza"));
    assert_eq!(state.session_count().await, 1);

    router.close().await;
    assert_eq!(state.session_count().await, 0);
}

#[tokio::test]
async fn unreachable_server_clears_pending_flag() {
    let endpoint = format!("http://{}", unused_addr());
    let client = McpClient::new(&endpoint, TIMEOUT).unwrap();
    let mut router = KeywordRouter::new(Box::new(client));
    let mut ctx = ChatContext::new();

    router.respond_on(&mut ctx, "absent tomorrow", today()).await;
    assert!(ctx.is_awaiting());

    let reply = router.respond_on(&mut ctx, "flu", today()).await;
    assert!(reply.starts_with("❌"));
    assert!(reply.contains("Cannot connect"));
    assert!(!ctx.is_awaiting());
}

#[tokio::test]
async fn rest_client_unreachable() {
    let mut client = RestClient::new(&format!("http://{}", unused_addr()), TIMEOUT).unwrap();
    let err = client
        .call_tool(menu::NAME, json!({"date": "2025-11-07"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn client_built_from_config_file() {
    let addr = start_server(false).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        json!({"client": {"endpoint": format!("http://{addr}"), "timeout_secs": 5}}).to_string(),
    )
    .unwrap();

    let cfg = load_config(Some(&path)).unwrap();
    let mut client = McpClient::from_config(&cfg.client).unwrap();
    let result = client
        .call(menu::NAME, json!({"date": "2025-11-09"}))
        .await
        .unwrap();
    assert_eq!(result, "Veggie Burger, Sweet Potato Fries, Orange Wedges");
}
