//! The calling side of the tool protocol.
//!
//! - [`McpClient`]: JSON-RPC over HTTP with session handling and local validation
//! - [`RestClient`]: the `/tools/*` REST binding
//! - [`LocalBackend`]: the dispatcher, called in-process
//!
//! All three implement [`ToolBackend`], which is what the chat routers use.

pub mod backend;
pub mod error;
pub mod rest;
pub mod rpc;

pub use backend::{LocalBackend, ToolBackend};
pub use error::ClientError;
pub use rest::RestClient;
pub use rpc::McpClient;
