//! Bridge registry: one session plus the bindings most recently discovered on it.

use crate::binding::{PromptBinding, ToolBinding};
use crate::blocking::block_on;
use crate::config::BridgeConfig;
use crate::connector::Connector;
use crate::discovery::{discover, Discovery};
use crate::error::BridgeError;
use crate::result::InvocationResult;
use crate::session::SessionHandle;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use tracing::{info, warn};

/// Owns a [`SessionHandle`] and its current binding set
///
/// ```rust,ignore
/// let bridge = McpBridge::new(Endpoint::from_env(), BridgeConfig::from_env());
/// if bridge.connect().await {
///     let cities = bridge.call_tool("list_cities_tool", Map::new()).await;
///     println!("{}", cities);
/// }
/// bridge.disconnect().await;
/// ```
pub struct McpBridge {
    session: Arc<SessionHandle>,
    discovery: RwLock<Discovery>,
}

impl McpBridge {
    pub fn new(connector: impl Connector + 'static, config: BridgeConfig) -> Self {
        Self {
            session: Arc::new(SessionHandle::new(connector, config)),
            discovery: RwLock::new(Discovery::default()),
        }
    }

    pub fn session(&self) -> &Arc<SessionHandle> {
        &self.session
    }

    fn current(&self) -> RwLockReadGuard<'_, Discovery> {
        self.discovery.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn replace(&self, discovery: Discovery) {
        *self
            .discovery
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = discovery;
    }

    /// Connect, then discover. `false` if the session could not be opened.
    pub async fn connect(&self) -> bool {
        if !self.session.connect().await {
            return false;
        }
        self.refresh().await;
        true
    }

    pub fn connect_blocking(&self) -> bool {
        block_on(self.connect())
    }

    /// Re-run discovery and replace the binding set
    pub async fn refresh(&self) -> Discovery {
        let discovery = discover(&self.session).await;
        self.replace(discovery.clone());
        discovery
    }

    /// Snapshot of the current binding set
    pub fn discovery(&self) -> Discovery {
        self.current().clone()
    }

    pub fn tool(&self, name: &str) -> Option<ToolBinding> {
        self.current().tool(name).cloned()
    }

    pub fn prompt(&self, name: &str) -> Option<PromptBinding> {
        self.current().prompt(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.current().tool_names().into_iter().map(String::from).collect()
    }

    pub fn prompt_names(&self) -> Vec<String> {
        self.current().prompt_names().into_iter().map(String::from).collect()
    }

    /// Invoke a discovered tool by name
    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> InvocationResult {
        match self.tool(name) {
            Some(binding) => binding.invoke(arguments).await,
            None => {
                warn!(tool_name = %name, "Tool not found");
                InvocationResult::failure(BridgeError::remote(
                    format!("tool `{}`", name),
                    "not advertised by the server",
                ))
            }
        }
    }

    /// Resolve a discovered prompt by name
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> InvocationResult {
        match self.prompt(name) {
            Some(binding) => binding.invoke(arguments).await,
            None => {
                warn!(prompt_name = %name, "Prompt not found");
                InvocationResult::failure(BridgeError::remote(
                    format!("prompt `{}`", name),
                    "not advertised by the server",
                ))
            }
        }
    }

    /// Tear the session down and forget every binding
    pub async fn disconnect(&self) {
        self.session.disconnect().await;
        self.replace(Discovery::default());
        info!("MCP bridge cleared");
    }

    pub fn disconnect_blocking(&self) {
        block_on(self.disconnect())
    }
}

impl std::fmt::Debug for McpBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpBridge")
            .field("session", &self.session)
            .field("tools", &self.tool_names())
            .field("prompts", &self.prompt_names())
            .finish()
    }
}
