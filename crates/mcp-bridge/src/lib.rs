//! # mcp-bridge
//!
//! Model Context Protocol (MCP) client bridge: connects to one MCP server,
//! discovers its tools and prompts, and exposes each as a local callable that
//! always answers with text.
//!
//! ## Features
//!
//! - **Session Handle**: connect/handshake/teardown, strictly ordered exchanges
//! - **Schema Translation**: `inputSchema` to a flat, typed field list
//! - **Bindings**: permissive argument handling, errors as `Error: ...` text
//! - **Blocking Entry Points**: safe from plain threads and from async code
//! - **Transports**: streamable HTTP and legacy HTTP+SSE (`http` feature), and
//!   stdio child processes (`stdio` feature)
//! - **Session Runtime**: every session performs its I/O on a scheduler it owns
//!
//! ## Example
//!
//! ```rust,ignore
//! use mcp_bridge::{discover, BridgeConfig, Endpoint, SessionHandle};
//! use std::sync::Arc;
//!
//! let session = Arc::new(SessionHandle::new(
//!     Endpoint::legacy_sse("http://localhost:8000"),
//!     BridgeConfig::default(),
//! ));
//! if !session.connect().await {
//!     return;
//! }
//!
//! let discovery = discover(&session).await;
//! for tool in &discovery.tools {
//!     println!("Tool: {} - {}", tool.name(), tool.description());
//! }
//!
//! if let Some(weather) = discovery.tool("get_weather_tool") {
//!     println!("{}", weather.invoke_text("London").await);
//! }
//! session.disconnect().await;
//! ```

pub mod protocol;
pub mod transport;

mod binding;
mod blocking;
mod bridge;
mod client;
mod config;
mod connector;
mod discovery;
mod error;
mod result;
mod schema;
mod session;

// Re-exports
pub use binding::{PromptBinding, ToolBinding, QUERY_FIELD};
pub use bridge::McpBridge;
pub use client::{McpClient, ProtocolSession};
pub use config::{
    BridgeConfig, Endpoint, HttpMode, DEFAULT_BASE_URL, DEFAULT_SESSION_PATH, DEFAULT_TIMEOUT,
    LEGACY_SSE_PATH,
};
pub use connector::Connector;
pub use discovery::{discover, discover_blocking, Discovery, DiscoveryIssue};
pub use error::{BridgeError, BridgeResult, SchemaError};
pub use protocol::{McpContent, McpError, McpPrompt, McpTool, McpToolResult};
pub use result::{InvocationResult, ERROR_MARKER, NO_CONTENT, NO_MESSAGES};
pub use schema::{
    translate_prompt, translate_tool, FieldSpec, FieldType, PromptArgumentSpec,
    PromptDescriptor, Requirement, ToolDescriptor,
};
pub use session::{Listing, ServerIdentity, SessionHandle, SessionState};

#[cfg(feature = "http")]
pub use transport::{http::HttpTransport, sse::SseTransport};
#[cfg(feature = "stdio")]
pub use transport::stdio::{StdioConfig, StdioTransport};
