//! MCP Protocol Types
//!
//! This module defines the MCP payloads exchanged with a server:
//! - Initialization (client/server info and capabilities)
//! - Tool listings and tool call results
//! - Prompt listings and resolved prompts
//! - Content parts shared by tool results and prompt messages

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ============================================
// MCP Protocol Version
// ============================================

/// Current MCP protocol version we support
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

// ============================================
// Initialization Types
// ============================================

/// Parameters for the initialize request
#[derive(Debug, Clone, Serialize)]
pub struct InitializeParams {
    /// Protocol version the client supports
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    /// Client capabilities
    pub capabilities: ClientCapabilities,

    /// Client information
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

impl Default for InitializeParams {
    fn default() -> Self {
        Self {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo::default(),
        }
    }
}

/// Client capabilities advertised during initialization
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Value>,
}

/// Information about the MCP client
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Result of the initialize request
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResult {
    /// Protocol version the server supports
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    /// Server capabilities
    #[serde(default)]
    pub capabilities: ServerCapabilities,

    /// Server information
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,

    /// Optional instructions from the server
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Server capabilities advertised during initialization
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub tools: Option<ListChangedCapability>,

    #[serde(default)]
    pub prompts: Option<ListChangedCapability>,

    /// Resources are not consumed by the bridge; kept opaque
    #[serde(default)]
    pub resources: Option<Value>,

    #[serde(default)]
    pub logging: Option<Value>,

    #[serde(default)]
    pub experimental: Option<Value>,
}

/// Capability details shared by the `tools` and `prompts` capabilities
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListChangedCapability {
    /// Whether the server emits list-changed notifications
    #[serde(rename = "listChanged", default)]
    pub list_changed: bool,
}

/// Information about the MCP server
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    /// Server name
    #[serde(default)]
    pub name: String,

    /// Server version
    #[serde(default)]
    pub version: Option<String>,
}

// ============================================
// Tool Types
// ============================================

/// MCP Tool listing entry
///
/// `input_schema` is optional on the wire so that one malformed entry does
/// not fail the whole `tools/list` response; the schema translator rejects
/// entries without it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpTool {
    /// Unique tool name
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// JSON Schema for the tool's input parameters
    #[serde(rename = "inputSchema", default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// Result of listing tools
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsListResult {
    pub tools: Vec<McpTool>,

    /// Cursor for pagination (optional)
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

/// Parameters for calling a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallParams {
    /// Name of the tool to call
    pub name: String,

    /// Arguments to pass to the tool
    pub arguments: Value,
}

/// Result of calling a tool
#[derive(Debug, Clone, Deserialize)]
pub struct McpToolResult {
    /// Content returned by the tool
    #[serde(default)]
    pub content: Vec<McpContent>,

    /// Whether this result represents an error
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

// ============================================
// Prompt Types
// ============================================

/// MCP Prompt listing entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpPrompt {
    /// Unique prompt name
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// Arguments the prompt accepts
    #[serde(default)]
    pub arguments: Option<Vec<PromptArgument>>,
}

/// Argument definition for a prompt
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptArgument {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub required: bool,
}

/// Result of listing prompts
#[derive(Debug, Clone, Deserialize)]
pub struct PromptsListResult {
    pub prompts: Vec<McpPrompt>,

    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

/// Parameters for resolving a prompt
#[derive(Debug, Clone, Serialize)]
pub struct GetPromptParams {
    pub name: String,
    pub arguments: HashMap<String, String>,
}

/// A resolved prompt
#[derive(Debug, Clone, Deserialize)]
pub struct GetPromptResult {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub messages: Vec<PromptMessage>,
}

/// One message of a resolved prompt
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptMessage {
    /// Speaker role (`user`, `assistant`)
    pub role: String,

    pub content: McpContent,
}

// ============================================
// Content Types
// ============================================

/// MCP Content - represents various types of content
///
/// Content can be text, images, or embedded resources. Part kinds this
/// client does not know about deserialize as [`McpContent::Unsupported`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum McpContent {
    /// Text content
    #[serde(rename = "text")]
    Text {
        /// The text content
        text: String,
    },

    /// Image content (base64 encoded)
    #[serde(rename = "image")]
    Image {
        /// Base64-encoded image data
        data: String,
        /// MIME type of the image
        #[serde(rename = "mimeType")]
        mime_type: String,
    },

    /// Embedded resource content
    #[serde(rename = "resource")]
    Resource {
        /// The embedded resource
        resource: EmbeddedResource,
    },

    /// Any other part kind (audio, resource links, ...)
    #[serde(other)]
    Unsupported,
}

/// Resource payload embedded in a content part
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddedResource {
    pub uri: String,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,

    #[serde(default)]
    pub blob: Option<String>,
}

impl McpContent {
    /// Create text content
    pub fn text(content: impl Into<String>) -> Self {
        McpContent::Text {
            text: content.into(),
        }
    }

    /// Get text content if this part carries any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            McpContent::Text { text } => Some(text),
            McpContent::Resource { resource } => resource.text.as_deref(),
            _ => None,
        }
    }
}
