//! MCP Client Implementation
//!
//! [`McpClient`] speaks JSON-RPC over one [`Transport`]: the initialize
//! handshake, tool and prompt listings, tool calls and prompt resolution.
//! It is the production implementation of [`ProtocolSession`], the boundary
//! the session handle drives.

use crate::config::BridgeConfig;
use crate::protocol::{
    error_codes, GetPromptParams, GetPromptResult, IncomingMessage, InitializeParams,
    InitializeResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpError, McpPrompt,
    McpTool, McpToolResult, PromptsListResult, RequestId, ToolCallParams, ToolsListResult,
};
use crate::transport::Transport;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

/// Upper bound on `nextCursor` pages followed for a single listing
const MAX_LIST_PAGES: usize = 64;

/// Raw protocol operations of one connected server
///
/// Every call takes `&mut self`: a session carries at most one exchange at a
/// time, and whoever owns it decides how concurrent callers queue.
#[async_trait]
pub trait ProtocolSession: Send {
    async fn initialize(&mut self) -> Result<InitializeResult, McpError>;

    async fn list_tools(&mut self) -> Result<Vec<McpTool>, McpError>;

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<McpToolResult, McpError>;

    async fn list_prompts(&mut self) -> Result<Vec<McpPrompt>, McpError>;

    async fn get_prompt(
        &mut self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> Result<GetPromptResult, McpError>;

    /// Release the underlying channel. Idempotent.
    async fn close(&mut self) -> Result<(), McpError>;
}

/// JSON-RPC client over an exclusively owned transport
pub struct McpClient {
    transport: Box<dyn Transport>,
    next_id: u64,
    config: BridgeConfig,
    initialized: bool,
}

impl McpClient {
    /// Wrap a transport; no traffic is sent until [`ProtocolSession::initialize`]
    pub fn new<T: Transport + 'static>(transport: T, config: BridgeConfig) -> Self {
        Self {
            transport: Box::new(transport),
            next_id: 1,
            config,
            initialized: false,
        }
    }

    fn ensure_initialized(&self) -> Result<(), McpError> {
        if self.initialized {
            Ok(())
        } else {
            Err(McpError::NotInitialized)
        }
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = RequestId::Number(self.next_id);
        self.next_id += 1;
        id
    }

    async fn send_request<P: Serialize, R: DeserializeOwned>(
        &mut self,
        method: &str,
        params: Option<P>,
    ) -> Result<R, McpError> {
        let id = self.next_request_id();
        let params = params.map(serde_json::to_value).transpose()?;
        let request_json = serde_json::to_string(&JsonRpcRequest::new(id.clone(), method, params))?;
        trace!(method = %method, id = %id, "Sending JSON-RPC request");

        let request_timeout = self.config.request_timeout;
        let response = timeout(request_timeout, self.exchange(&request_json))
            .await
            .map_err(|_| McpError::Timeout(request_timeout))??;

        if response.id != id {
            return Err(McpError::ResponseIdMismatch {
                expected: id.to_string(),
                actual: response.id.to_string(),
            });
        }

        let result = response.into_result()?;
        serde_json::from_value(result).map_err(McpError::from)
    }

    /// Send one request frame and wait for the next response frame,
    /// answering or skipping whatever the server sends in between.
    async fn exchange(&mut self, request_json: &str) -> Result<JsonRpcResponse, McpError> {
        self.transport.send(request_json).await?;
        loop {
            let frame = self.transport.receive().await?;
            match IncomingMessage::parse(&frame)? {
                IncomingMessage::Response(response) => return Ok(response),
                IncomingMessage::Notification { method, .. } => {
                    trace!(method = %method, "Skipping server notification while awaiting response");
                }
                IncomingMessage::Request { id, method, .. } => {
                    let reply = if method == "ping" {
                        JsonRpcResponse::success(id, json!({}))
                    } else {
                        debug!(method = %method, "Rejecting unsupported server request");
                        JsonRpcResponse::failure(
                            id,
                            error_codes::METHOD_NOT_FOUND,
                            format!("client does not handle {}", method),
                        )
                    };
                    self.transport.send(&serde_json::to_string(&reply)?).await?;
                }
            }
        }
    }

    async fn send_notification(&mut self, method: &str) -> Result<(), McpError> {
        let notification = serde_json::to_string(&JsonRpcNotification::new(method, None))?;
        trace!(method = %method, "Sending JSON-RPC notification");
        self.transport.send(&notification).await
    }

    /// Follow `nextCursor` until the server stops paginating
    async fn list_paged<R, T>(
        &mut self,
        method: &str,
        split: impl Fn(R) -> (Vec<T>, Option<String>),
    ) -> Result<Vec<T>, McpError>
    where
        R: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.take().map(|c| json!({ "cursor": c }));
            let page: R = self.send_request(method, params).await?;
            let (mut page_items, next) = split(page);
            items.append(&mut page_items);
            match next {
                Some(next) => cursor = Some(next),
                None => return Ok(items),
            }
        }
        warn!(method = %method, pages = MAX_LIST_PAGES, "Listing truncated after page limit");
        Ok(items)
    }
}

#[async_trait]
impl ProtocolSession for McpClient {
    async fn initialize(&mut self) -> Result<InitializeResult, McpError> {
        debug!("Starting MCP initialization handshake");

        let mut params = InitializeParams {
            protocol_version: self.config.protocol_version.clone(),
            ..InitializeParams::default()
        };
        if let Some(ref name) = self.config.client_name {
            params.client_info.name = name.clone();
        }
        if let Some(ref version) = self.config.client_version {
            params.client_info.version = version.clone();
        }

        let result: InitializeResult = self.send_request("initialize", Some(params)).await?;
        info!(
            server_name = %result.server_info.name,
            server_version = ?result.server_info.version,
            protocol_version = %result.protocol_version,
            "MCP server initialized"
        );

        self.send_notification("notifications/initialized").await?;
        self.initialized = true;
        Ok(result)
    }

    async fn list_tools(&mut self) -> Result<Vec<McpTool>, McpError> {
        self.ensure_initialized()?;
        let tools = self
            .list_paged("tools/list", |page: ToolsListResult| {
                (page.tools, page.next_cursor)
            })
            .await?;
        for tool in &tools {
            trace!(tool_name = %tool.name, description = ?tool.description, "Found MCP tool");
        }
        Ok(tools)
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<McpToolResult, McpError> {
        self.ensure_initialized()?;
        debug!(tool_name = %name, "Calling MCP tool");

        let params = ToolCallParams {
            name: name.to_string(),
            arguments,
        };
        let result: McpToolResult = self.send_request("tools/call", Some(params)).await?;
        debug!(
            tool_name = %name,
            content_count = result.content.len(),
            is_error = result.is_error,
            "Tool call answered"
        );
        Ok(result)
    }

    async fn list_prompts(&mut self) -> Result<Vec<McpPrompt>, McpError> {
        self.ensure_initialized()?;
        self.list_paged("prompts/list", |page: PromptsListResult| {
            (page.prompts, page.next_cursor)
        })
        .await
    }

    async fn get_prompt(
        &mut self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> Result<GetPromptResult, McpError> {
        self.ensure_initialized()?;
        debug!(prompt_name = %name, "Resolving MCP prompt");

        let params = GetPromptParams {
            name: name.to_string(),
            arguments,
        };
        self.send_request("prompts/get", Some(params)).await
    }

    async fn close(&mut self) -> Result<(), McpError> {
        self.initialized = false;
        if self.transport.is_connected() {
            debug!("Closing MCP client connection");
            self.transport.close().await?;
        }
        Ok(())
    }
}
