//! school-tools-mcp: a JSON-RPC tool server for school absences and lunch menus
//!
//! This library provides a small tool-invocation protocol and the chat
//! front-ends that drive it.
//!
//! # Architecture
//!
//! - **Tool layer**: a registry of named tools with typed argument schemas,
//!   and a dispatcher that validates and invokes them
//! - **Server**: a session handler speaking JSON-RPC 2.0 over HTTP, plus a
//!   plain REST binding backed by the same dispatcher
//! - **Clients**: JSON-RPC, REST, and in-process adapters behind one trait
//! - **Assistants**: a keyword router and a model-driven router
//!
//! # Modules
//!
//! - [`assistant`]: Chat routers and conversation state
//! - [`client`]: Client adapters
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`mcp`]: Protocol, registry, dispatcher, and HTTP server
//! - [`tools`]: The built-in tools

pub mod assistant;
pub mod client;
pub mod config;
pub mod error;
pub mod mcp;
pub mod tools;
