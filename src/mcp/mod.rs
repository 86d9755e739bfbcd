//! Tool-invocation protocol: the server side.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                         HTTP transport                         │
//! │        POST / (JSON-RPC)              /tools/* (REST)          │
//! │               │                              │                 │
//! │               ▼                              │                 │
//! │   ┌──────────────────────┐                   │                 │
//! │   │  Session handler     │                   │                 │
//! │   │  (lifecycle, demux)  │                   │                 │
//! │   └──────────┬───────────┘                   │                 │
//! │              ▼                               ▼                 │
//! │   ┌─────────────────────────────────────────────────────┐     │
//! │   │        Dispatcher (lookup, validation, invoke)      │     │
//! │   └──────────────────────────┬──────────────────────────┘     │
//! │                              ▼                                 │
//! │   ┌─────────────────────────────────────────────────────┐     │
//! │   │         Registry (name → schema + handler)          │     │
//! │   └─────────────────────────────────────────────────────┘     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Error codes
//!
//! | Condition | Code |
//! |---|---|
//! | Unknown method, unknown tool | -32601 |
//! | Invalid tool arguments or call params | -32602 |
//! | Malformed envelope, lifecycle violation, handler failure | -32000 |

pub mod dispatcher;
pub mod protocol;
pub mod registry;
pub mod rest;
pub mod schema;
pub mod server;
pub mod transport;

pub use dispatcher::{DispatchError, Dispatcher};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
pub use registry::{RegistryError, ToolListing, ToolRegistry};
pub use schema::{validate, CallArguments, ParamSpec, ParamType, ToolSchema, ValidationErrors};
pub use server::{McpServer, Session};
