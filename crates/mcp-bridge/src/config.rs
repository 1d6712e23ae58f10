//! Endpoint and client configuration.

use crate::protocol::MCP_PROTOCOL_VERSION;
use std::time::Duration;
use tracing::warn;

/// Default timeout for a single request/response exchange
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default base address when none is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default session path appended to the base address (streamable HTTP)
pub const DEFAULT_SESSION_PATH: &str = "mcp";

/// Event-stream path of the legacy HTTP+SSE binding
pub const LEGACY_SSE_PATH: &str = "sse";

/// Which MCP HTTP binding an endpoint speaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpMode {
    /// Every frame is POSTed to the session URL; replies come back in the response
    #[default]
    Streamable,
    /// A `GET` event stream stays open on the session URL and frames are
    /// POSTed to the URL the stream announces
    LegacySse,
}

impl HttpMode {
    /// Parse `streamable` or `sse` (also `legacy-sse`), ignoring case
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "streamable" | "streamable-http" => Some(HttpMode::Streamable),
            "sse" | "legacy-sse" => Some(HttpMode::LegacySse),
            _ => None,
        }
    }
}

/// Where an HTTP MCP server lives
///
/// Immutable once built; the session-establishment URL is derived from the
/// base address and never stored separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    session_path: String,
    mode: HttpMode,
    headers: Vec<(String, String)>,
}

impl Endpoint {
    /// Streamable HTTP at `<base>/mcp`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            session_path: DEFAULT_SESSION_PATH.to_string(),
            mode: HttpMode::Streamable,
            headers: Vec::new(),
        }
    }

    /// Legacy HTTP+SSE with its event stream at `<base>/sse`
    pub fn legacy_sse(base_url: impl Into<String>) -> Self {
        Self::new(base_url)
            .with_mode(HttpMode::LegacySse)
            .with_session_path(LEGACY_SSE_PATH)
    }

    /// Read `MCP_BRIDGE_URL`, `MCP_BRIDGE_HTTP_MODE` and `MCP_BRIDGE_SESSION_PATH`
    ///
    /// An unknown mode is logged and the streamable binding is used.
    pub fn from_env() -> Self {
        let base = std::env::var("MCP_BRIDGE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let mut endpoint = match std::env::var("MCP_BRIDGE_HTTP_MODE") {
            Ok(mode) => match HttpMode::parse(&mode) {
                Some(HttpMode::LegacySse) => Self::legacy_sse(base),
                Some(HttpMode::Streamable) => Self::new(base),
                None => {
                    warn!(mode = %mode, "Unknown MCP_BRIDGE_HTTP_MODE, using streamable HTTP");
                    Self::new(base)
                }
            },
            Err(_) => Self::new(base),
        };
        if let Ok(path) = std::env::var("MCP_BRIDGE_SESSION_PATH") {
            endpoint = endpoint.with_session_path(path);
        }
        endpoint
    }

    /// Override the path joined onto the base address
    pub fn with_session_path(mut self, path: impl Into<String>) -> Self {
        self.session_path = path.into();
        self
    }

    pub fn with_mode(mut self, mode: HttpMode) -> Self {
        self.mode = mode;
        self
    }

    /// Add a header sent with every request (authentication, tenancy, ...)
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn mode(&self) -> HttpMode {
        self.mode
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Base address and session path joined by exactly one `/`
    pub fn session_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.session_path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }
}

/// Client-side knobs for a session
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Timeout for each request/response exchange
    pub request_timeout: Duration,

    /// Name announced in `initialize` (defaults to this crate's name)
    pub client_name: Option<String>,

    pub client_version: Option<String>,

    pub protocol_version: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_TIMEOUT,
            client_name: None,
            client_version: None,
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `MCP_BRIDGE_TIMEOUT_SECS` and `MCP_BRIDGE_CLIENT_NAME`
    ///
    /// An unparsable timeout is ignored rather than rejected.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = std::env::var("MCP_BRIDGE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(name) = std::env::var("MCP_BRIDGE_CLIENT_NAME") {
            config.client_name = Some(name);
        }
        config
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self.client_version = Some(version.into());
        self
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }
}
