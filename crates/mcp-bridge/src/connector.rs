//! How a [`crate::SessionHandle`] opens a fresh protocol session.
//!
//! `open` acquires the transport only; the handshake belongs to the session
//! handle, which also releases what `open` acquired if the handshake fails.

use crate::client::ProtocolSession;
use crate::config::BridgeConfig;
use crate::protocol::McpError;
use async_trait::async_trait;

#[async_trait]
pub trait Connector: Send + Sync {
    /// Acquire a transport and wrap it in an uninitialized protocol session
    async fn open(&self, config: &BridgeConfig) -> Result<Box<dyn ProtocolSession>, McpError>;

    /// Human-readable target used in log fields
    fn describe(&self) -> String;
}

#[cfg(feature = "http")]
#[async_trait]
impl Connector for crate::config::Endpoint {
    async fn open(&self, config: &BridgeConfig) -> Result<Box<dyn ProtocolSession>, McpError> {
        use crate::client::McpClient;
        use crate::config::HttpMode;
        use crate::transport::http::HttpTransport;
        use crate::transport::sse::SseTransport;

        match self.mode() {
            HttpMode::Streamable => {
                let transport = HttpTransport::connect(self, config.request_timeout)?;
                Ok(Box::new(McpClient::new(transport, config.clone())))
            }
            HttpMode::LegacySse => {
                let transport = SseTransport::connect(self, config.request_timeout).await?;
                Ok(Box::new(McpClient::new(transport, config.clone())))
            }
        }
    }

    fn describe(&self) -> String {
        match self.mode() {
            crate::config::HttpMode::Streamable => self.session_url(),
            crate::config::HttpMode::LegacySse => format!("sse:{}", self.session_url()),
        }
    }
}

#[cfg(feature = "stdio")]
#[async_trait]
impl Connector for crate::transport::stdio::StdioConfig {
    async fn open(&self, config: &BridgeConfig) -> Result<Box<dyn ProtocolSession>, McpError> {
        use crate::client::McpClient;
        use crate::transport::stdio::StdioTransport;

        let transport = StdioTransport::spawn(self).await?;
        Ok(Box::new(McpClient::new(transport, config.clone())))
    }

    fn describe(&self) -> String {
        format!("stdio:{}", self.command)
    }
}
