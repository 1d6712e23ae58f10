//! Session Handle
//!
//! Owns the connection to one MCP server and is the only component that
//! touches it. The channel lives in a worker task on the session's own
//! runtime; handles send it commands and wait for the replies. Commands are
//! served one at a time in the order they were queued, so concurrent callers
//! are answered strictly in issue order.

use crate::blocking::SessionRuntime;
use crate::client::ProtocolSession;
use crate::config::BridgeConfig;
use crate::connector::Connector;
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{InitializeResult, McpError, McpPrompt, McpTool};
use crate::result::{render_prompt, render_tool_result, InvocationResult};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle of a [`SessionHandle`]
///
/// `Closed` is the terminal disconnected state reached through
/// [`SessionHandle::disconnect`] or a broken channel; a closed handle never
/// reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
    Closed,
}

/// Who the server said it was during the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    pub name: String,
    pub version: Option<String>,
    pub protocol_version: String,
    pub instructions: Option<String>,
    pub supports_tools: bool,
    pub supports_prompts: bool,
}

impl ServerIdentity {
    fn from_handshake(result: InitializeResult) -> BridgeResult<Self> {
        let name = result.server_info.name.trim();
        if name.is_empty() {
            return Err(BridgeError::Connection(
                "handshake response carries no server name".to_string(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            version: result.server_info.version,
            protocol_version: result.protocol_version,
            instructions: result.instructions,
            supports_tools: result.capabilities.tools.is_some(),
            supports_prompts: result.capabilities.prompts.is_some(),
        })
    }
}

/// Outcome of a listing call
///
/// Distinguishes "the server has none" from "asking failed"; both read as an
/// empty sequence through [`Listing::items`].
#[derive(Debug)]
pub enum Listing<T> {
    Listed(Vec<T>),
    Failed(BridgeError),
}

impl<T> Listing<T> {
    pub fn items(&self) -> &[T] {
        match self {
            Listing::Listed(items) => items,
            Listing::Failed(_) => &[],
        }
    }

    pub fn failure(&self) -> Option<&BridgeError> {
        match self {
            Listing::Listed(_) => None,
            Listing::Failed(err) => Some(err),
        }
    }
}

struct Status {
    state: SessionState,
    identity: Option<ServerIdentity>,
}

/// Status shared between the handle and its worker; only the worker writes
#[derive(Clone)]
struct SharedStatus(Arc<StdMutex<Status>>);

impl SharedStatus {
    fn new() -> Self {
        Self(Arc::new(StdMutex::new(Status {
            state: SessionState::Disconnected,
            identity: None,
        })))
    }

    fn lock(&self) -> MutexGuard<'_, Status> {
        // A poisoned snapshot is still a valid snapshot
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state(&self) -> SessionState {
        self.lock().state
    }

    fn identity(&self) -> Option<ServerIdentity> {
        self.lock().identity.clone()
    }

    fn set(&self, state: SessionState, identity: Option<ServerIdentity>) {
        let mut status = self.lock();
        status.state = state;
        status.identity = identity;
    }
}

type Reply<T> = oneshot::Sender<T>;

/// Work the session worker performs on behalf of a handle
enum Command {
    Connect(Reply<BridgeResult<ServerIdentity>>),
    ListTools(Reply<Listing<McpTool>>),
    ListPrompts(Reply<Listing<McpPrompt>>),
    CallTool {
        name: String,
        arguments: Map<String, Value>,
        reply: Reply<InvocationResult>,
    },
    GetPrompt {
        name: String,
        arguments: HashMap<String, String>,
        reply: Reply<InvocationResult>,
    },
    Disconnect(Reply<()>),
}

fn worker_stopped() -> BridgeError {
    BridgeError::Runtime("session worker is not running".to_string())
}

/// Connection to a single MCP server
pub struct SessionHandle {
    endpoint: String,
    config: BridgeConfig,
    commands: mpsc::UnboundedSender<Command>,
    status: SharedStatus,
    /// Declared last so the command channel closes before the runtime stops
    runtime: SessionRuntime,
}

impl SessionHandle {
    pub fn new(connector: impl Connector + 'static, config: BridgeConfig) -> Self {
        let endpoint = connector.describe();
        let status = SharedStatus::new();
        let (commands, inbox) = mpsc::unbounded_channel();

        let worker = SessionWorker {
            connector: Box::new(connector),
            config: config.clone(),
            endpoint: endpoint.clone(),
            status: status.clone(),
            session: None,
        };
        let runtime = SessionRuntime::start();
        if !runtime.spawn(worker.run(inbox)) {
            warn!(endpoint = %endpoint, "MCP session worker not started");
        }

        Self {
            endpoint,
            config,
            commands,
            status,
            runtime,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.status.state()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Server identity, available while `Ready`
    pub fn identity(&self) -> Option<ServerIdentity> {
        self.status.identity()
    }

    /// Queue a command and wait for the worker's answer
    ///
    /// The command is queued on first poll, before any await point.
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> BridgeResult<T> {
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| worker_stopped())?;
        answer.await.map_err(|_| worker_stopped())
    }

    /// Open the transport and run the handshake; `Ok` only once `Ready`
    ///
    /// Anything acquired along the way is released before an error returns.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn try_connect(&self) -> BridgeResult<ServerIdentity> {
        self.request(Command::Connect).await.and_then(|result| result)
    }

    /// Connect, reporting failure as `false` with the cause logged
    pub async fn connect(&self) -> bool {
        match self.try_connect().await {
            Ok(_) => true,
            Err(e) => {
                error!(endpoint = %self.endpoint, error = %e, "Failed to connect to MCP server");
                false
            }
        }
    }

    /// Tear the session down. A no-op unless a channel is open.
    pub async fn disconnect(&self) {
        if let Err(e) = self.request(Command::Disconnect).await {
            warn!(endpoint = %self.endpoint, error = %e, "Disconnect not delivered");
        }
    }

    #[instrument(skip(self))]
    pub async fn list_tools(&self) -> Listing<McpTool> {
        self.request(Command::ListTools)
            .await
            .unwrap_or_else(Listing::Failed)
    }

    #[instrument(skip(self))]
    pub async fn list_prompts(&self) -> Listing<McpPrompt> {
        self.request(Command::ListPrompts)
            .await
            .unwrap_or_else(Listing::Failed)
    }

    /// Call a tool and normalize whatever comes back into text
    #[instrument(skip(self, arguments), fields(tool_name = %name))]
    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> InvocationResult {
        self.request(|reply| Command::CallTool {
            name: name.to_string(),
            arguments,
            reply,
        })
        .await
        .unwrap_or_else(|e| {
            InvocationResult::failure(BridgeError::remote(format!("tool `{}`", name), e))
        })
    }

    /// Resolve a prompt into a `role: text` transcript
    ///
    /// `None` arguments are sent as an empty mapping.
    #[instrument(skip(self, arguments), fields(prompt_name = %name))]
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> InvocationResult {
        self.request(|reply| Command::GetPrompt {
            name: name.to_string(),
            arguments: arguments.unwrap_or_default(),
            reply,
        })
        .await
        .unwrap_or_else(|e| {
            InvocationResult::failure(BridgeError::remote(format!("prompt `{}`", name), e))
        })
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .field("worker_running", &self.runtime.is_running())
            .finish()
    }
}

/// Owner of the live channel, running on the session runtime
struct SessionWorker {
    connector: Box<dyn Connector>,
    config: BridgeConfig,
    endpoint: String,
    status: SharedStatus,
    session: Option<Box<dyn ProtocolSession>>,
}

impl SessionWorker {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = inbox.recv().await {
            // A caller that gave up waiting drops its receiver; the work still counts
            match command {
                Command::Connect(reply) => {
                    let _ = reply.send(self.connect().await);
                }
                Command::ListTools(reply) => {
                    let _ = reply.send(self.list_tools().await);
                }
                Command::ListPrompts(reply) => {
                    let _ = reply.send(self.list_prompts().await);
                }
                Command::CallTool {
                    name,
                    arguments,
                    reply,
                } => {
                    let _ = reply.send(self.call_tool(&name, arguments).await);
                }
                Command::GetPrompt {
                    name,
                    arguments,
                    reply,
                } => {
                    let _ = reply.send(self.get_prompt(&name, arguments).await);
                }
                Command::Disconnect(reply) => {
                    self.disconnect().await;
                    let _ = reply.send(());
                }
            }
        }
        // Every handle is gone
        self.disconnect().await;
    }

    async fn connect(&mut self) -> BridgeResult<ServerIdentity> {
        match self.status.state() {
            SessionState::Ready => {
                if let Some(identity) = self.status.identity() {
                    debug!("Session already connected");
                    return Ok(identity);
                }
            }
            SessionState::Closed => {
                return Err(BridgeError::Connection(
                    "session handle has been closed".to_string(),
                ))
            }
            SessionState::Disconnected | SessionState::Connecting => {}
        }

        self.status.set(SessionState::Connecting, None);
        debug!(endpoint = %self.endpoint, "Opening MCP transport");

        let mut session = match self.connector.open(&self.config).await {
            Ok(session) => session,
            Err(e) => {
                self.status.set(SessionState::Disconnected, None);
                return Err(BridgeError::Connection(e.to_string()));
            }
        };

        let handshake = match session.initialize().await {
            Ok(result) => ServerIdentity::from_handshake(result),
            Err(e) => Err(BridgeError::Connection(e.to_string())),
        };
        let identity = match handshake {
            Ok(identity) => identity,
            Err(err) => {
                if let Err(close_err) = session.close().await {
                    warn!(error = %close_err, "Failed to release transport after aborted connect");
                }
                self.status.set(SessionState::Disconnected, None);
                return Err(err);
            }
        };

        self.session = Some(session);
        self.status.set(SessionState::Ready, Some(identity.clone()));
        info!(
            endpoint = %self.endpoint,
            server_name = %identity.name,
            server_version = ?identity.version,
            "Connected to MCP server"
        );
        Ok(identity)
    }

    async fn disconnect(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if let Err(e) = session.close().await {
            warn!(error = %e, "Error while closing MCP session");
        }
        self.status.set(SessionState::Closed, None);
        info!(endpoint = %self.endpoint, "Disconnected from MCP server");
    }

    /// A failed exchange on a channel that cannot recover closes the session
    async fn after_failure(&mut self, err: &McpError) {
        if !err.is_fatal() {
            return;
        }
        error!(endpoint = %self.endpoint, error = %err, "MCP channel is unusable, closing session");
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!(error = %e, "Error while closing broken MCP session");
            }
        }
        self.status.set(SessionState::Closed, None);
    }

    async fn list_tools(&mut self) -> Listing<McpTool> {
        let Some(session) = self.session.as_mut() else {
            warn!("Cannot list tools: not connected");
            return Listing::Failed(BridgeError::NotConnected);
        };
        match session.list_tools().await {
            Ok(tools) => {
                debug!(tool_count = tools.len(), "Listed MCP tools");
                Listing::Listed(tools)
            }
            Err(e) => {
                warn!(error = %e, "Error listing tools");
                self.after_failure(&e).await;
                Listing::Failed(BridgeError::remote("tools/list", e))
            }
        }
    }

    async fn list_prompts(&mut self) -> Listing<McpPrompt> {
        let Some(session) = self.session.as_mut() else {
            warn!("Cannot list prompts: not connected");
            return Listing::Failed(BridgeError::NotConnected);
        };
        match session.list_prompts().await {
            Ok(prompts) => {
                debug!(prompt_count = prompts.len(), "Listed MCP prompts");
                Listing::Listed(prompts)
            }
            Err(e) => {
                warn!(error = %e, "Error listing prompts");
                self.after_failure(&e).await;
                Listing::Failed(BridgeError::remote("prompts/list", e))
            }
        }
    }

    async fn call_tool(&mut self, name: &str, arguments: Map<String, Value>) -> InvocationResult {
        let target = format!("tool `{}`", name);
        let Some(session) = self.session.as_mut() else {
            warn!(tool_name = %name, "Cannot call tool: not connected");
            return InvocationResult::failure(BridgeError::remote(target, BridgeError::NotConnected));
        };
        match session.call_tool(name, Value::Object(arguments)).await {
            Ok(result) => {
                if result.is_error {
                    warn!(tool_name = %name, "Tool returned error result");
                }
                render_tool_result(name, result)
            }
            Err(e) => {
                error!(tool_name = %name, error = %e, "Error calling tool");
                self.after_failure(&e).await;
                InvocationResult::failure(BridgeError::remote(target, e))
            }
        }
    }

    async fn get_prompt(&mut self, name: &str, arguments: HashMap<String, String>) -> InvocationResult {
        let target = format!("prompt `{}`", name);
        let Some(session) = self.session.as_mut() else {
            warn!(prompt_name = %name, "Cannot get prompt: not connected");
            return InvocationResult::failure(BridgeError::remote(target, BridgeError::NotConnected));
        };
        match session.get_prompt(name, arguments).await {
            Ok(result) => render_prompt(result),
            Err(e) => {
                error!(prompt_name = %name, error = %e, "Error getting prompt");
                self.after_failure(&e).await;
                InvocationResult::failure(BridgeError::remote(target, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        GetPromptResult, McpContent, McpToolResult, ServerCapabilities, ServerInfo,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn bad_gateway() -> McpError {
        McpError::transport("HTTP error 502")
    }

    fn process_exited() -> McpError {
        McpError::ProcessExited
    }

    #[derive(Default)]
    struct Tally {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    struct ScriptedSession {
        tally: Arc<Tally>,
        server_name: String,
        fail_calls_with: Option<fn() -> McpError>,
    }

    #[async_trait]
    impl ProtocolSession for ScriptedSession {
        async fn initialize(&mut self) -> Result<InitializeResult, McpError> {
            Ok(InitializeResult {
                protocol_version: "2024-11-05".into(),
                capabilities: ServerCapabilities::default(),
                server_info: ServerInfo {
                    name: self.server_name.clone(),
                    version: Some("1.0.0".into()),
                },
                instructions: None,
            })
        }

        async fn list_tools(&mut self) -> Result<Vec<McpTool>, McpError> {
            match self.fail_calls_with {
                Some(make) => Err(make()),
                None => Ok(vec![]),
            }
        }

        async fn call_tool(&mut self, name: &str, _arguments: Value) -> Result<McpToolResult, McpError> {
            match self.fail_calls_with {
                Some(make) => Err(make()),
                None => Ok(McpToolResult {
                    content: vec![McpContent::text(format!("called {}", name))],
                    is_error: false,
                }),
            }
        }

        async fn list_prompts(&mut self) -> Result<Vec<McpPrompt>, McpError> {
            Ok(vec![])
        }

        async fn get_prompt(
            &mut self,
            _name: &str,
            _arguments: HashMap<String, String>,
        ) -> Result<GetPromptResult, McpError> {
            Ok(GetPromptResult {
                description: None,
                messages: vec![],
            })
        }

        async fn close(&mut self) -> Result<(), McpError> {
            self.tally.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ScriptedConnector {
        tally: Arc<Tally>,
        server_name: &'static str,
        refuse: bool,
        fail_calls_with: Option<fn() -> McpError>,
    }

    impl ScriptedConnector {
        fn healthy(tally: Arc<Tally>) -> Self {
            Self {
                tally,
                server_name: "weather-server",
                refuse: false,
                fail_calls_with: None,
            }
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn open(&self, _config: &BridgeConfig) -> Result<Box<dyn ProtocolSession>, McpError> {
            if self.refuse {
                return Err(McpError::transport("connection refused"));
            }
            self.tally.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSession {
                tally: self.tally.clone(),
                server_name: self.server_name.to_string(),
                fail_calls_with: self.fail_calls_with,
            }))
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    #[tokio::test]
    async fn test_connect_and_disconnect_lifecycle() {
        let tally = Arc::new(Tally::default());
        let handle = SessionHandle::new(ScriptedConnector::healthy(tally.clone()), BridgeConfig::default());
        assert_eq!(handle.state(), SessionState::Disconnected);

        assert!(handle.connect().await);
        assert_eq!(handle.state(), SessionState::Ready);
        assert_eq!(handle.identity().unwrap().name, "weather-server");

        // Connecting again while ready reuses the session
        assert!(handle.connect().await);
        assert_eq!(tally.opened.load(Ordering::SeqCst), 1);

        handle.disconnect().await;
        handle.disconnect().await;
        assert_eq!(handle.state(), SessionState::Closed);
        assert_eq!(tally.closed.load(Ordering::SeqCst), 1);
        assert!(handle.identity().is_none());

        // Closed is final
        assert!(!handle.connect().await);
    }

    #[tokio::test]
    async fn test_disconnect_before_connect_is_noop() {
        let tally = Arc::new(Tally::default());
        let handle = SessionHandle::new(ScriptedConnector::healthy(tally.clone()), BridgeConfig::default());
        handle.disconnect().await;
        assert_eq!(handle.state(), SessionState::Disconnected);
        assert!(handle.connect().await);
    }

    #[tokio::test]
    async fn test_refused_transport_reports_false() {
        let tally = Arc::new(Tally::default());
        let connector = ScriptedConnector {
            refuse: true,
            ..ScriptedConnector::healthy(tally)
        };
        let handle = SessionHandle::new(connector, BridgeConfig::default());

        assert!(!handle.connect().await);
        assert_eq!(handle.state(), SessionState::Disconnected);
        let err = handle.try_connect().await.unwrap_err();
        assert!(matches!(err, BridgeError::Connection(ref msg) if msg.contains("refused")));
    }

    #[tokio::test]
    async fn test_anonymous_server_is_rejected_and_released() {
        let tally = Arc::new(Tally::default());
        let connector = ScriptedConnector {
            server_name: "  ",
            ..ScriptedConnector::healthy(tally.clone())
        };
        let handle = SessionHandle::new(connector, BridgeConfig::default());

        assert!(!handle.connect().await);
        assert_eq!(handle.state(), SessionState::Disconnected);
        assert_eq!(tally.opened.load(Ordering::SeqCst), 1);
        assert_eq!(tally.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_operations_before_connect_fail_cleanly() {
        let handle = SessionHandle::new(
            ScriptedConnector::healthy(Arc::new(Tally::default())),
            BridgeConfig::default(),
        );

        let listing = handle.list_tools().await;
        assert!(matches!(listing.failure(), Some(BridgeError::NotConnected)));
        assert!(listing.items().is_empty());

        let result = handle.call_tool("list_cities_tool", Map::new()).await;
        assert_eq!(
            result.to_string(),
            "Error: tool `list_cities_tool` failed: not connected"
        );

        let result = handle.get_prompt("weather_summary", None).await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_transport_error_becomes_error_result() {
        let tally = Arc::new(Tally::default());
        let connector = ScriptedConnector {
            fail_calls_with: Some(bad_gateway),
            ..ScriptedConnector::healthy(tally)
        };
        let handle = SessionHandle::new(connector, BridgeConfig::default());
        assert!(handle.connect().await);

        let result = handle.call_tool("get_weather_tool", Map::new()).await;
        assert!(result.is_error());
        assert!(result.message().contains("get_weather_tool"));
        assert!(result.message().contains("HTTP error 502"));

        let listing = handle.list_tools().await;
        assert!(listing.failure().is_some());

        // Recoverable errors keep the session alive
        assert!(handle.is_ready());
    }

    #[tokio::test]
    async fn test_fatal_error_closes_session() {
        let tally = Arc::new(Tally::default());
        let connector = ScriptedConnector {
            fail_calls_with: Some(process_exited),
            ..ScriptedConnector::healthy(tally.clone())
        };
        let handle = SessionHandle::new(connector, BridgeConfig::default());
        assert!(handle.connect().await);

        assert!(handle.call_tool("get_weather_tool", Map::new()).await.is_error());
        assert_eq!(handle.state(), SessionState::Closed);
        assert_eq!(tally.closed.load(Ordering::SeqCst), 1);

        let result = handle.call_tool("get_weather_tool", Map::new()).await;
        assert!(result.message().contains("not connected"));
    }

    #[tokio::test]
    async fn test_empty_prompt_and_call_text() {
        let handle = SessionHandle::new(
            ScriptedConnector::healthy(Arc::new(Tally::default())),
            BridgeConfig::default(),
        );
        assert!(handle.connect().await);

        let result = handle.call_tool("list_cities_tool", Map::new()).await;
        assert_eq!(result, InvocationResult::Text("called list_cities_tool".into()));

        let result = handle.get_prompt("weather_summary", None).await;
        assert_eq!(result.to_string(), "No messages in prompt");
    }
}
