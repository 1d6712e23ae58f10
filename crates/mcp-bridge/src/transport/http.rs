//! HTTP Transport for MCP
//!
//! Each outgoing frame is POSTed to the endpoint's session URL. Replies may
//! come back as a plain JSON body or as a short `text/event-stream` body;
//! both are unpacked into the receive queue. Notifications are answered with
//! `202 Accepted` and an empty body, which queues nothing.

use super::sse::EventParser;
use crate::config::Endpoint;
use crate::protocol::McpError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Header carrying the server-assigned session identifier
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// HTTP transport bound to one [`Endpoint`]
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    headers: Vec<(String, String)>,
    session_id: Option<String>,
    pending: VecDeque<String>,
    connected: bool,
}

impl HttpTransport {
    /// Build a transport for `endpoint`; no request is sent until the first frame
    pub fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<Self, McpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| McpError::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: endpoint.session_url(),
            client,
            headers: endpoint.headers().to_vec(),
            session_id: None,
            pending: VecDeque::new(),
            connected: true,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Session identifier assigned by the server, once one has been seen
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

/// Pull the JSON frames out of a response body
fn frames_from_body(body: &str, event_stream: bool) -> Vec<String> {
    if !event_stream {
        let trimmed = body.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut parser = EventParser::default();
    let mut events = parser.feed(body.as_bytes());
    events.extend(parser.finish());
    events.into_iter().map(|event| event.data).collect()
}

#[async_trait]
impl super::Transport for HttpTransport {
    async fn send(&mut self, message: &str) -> Result<(), McpError> {
        if !self.connected {
            return Err(McpError::transport("HTTP transport is closed"));
        }
        trace!(url = %self.url, message = %message, "MCP HTTP send");

        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header("Accept", "application/json, text/event-stream");
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(ref id) = self.session_id {
            request = request.header(SESSION_ID_HEADER, id.as_str());
        }

        let response = request
            .body(message.to_string())
            .send()
            .await
            .map_err(|e| McpError::transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::transport(format!("HTTP error {}: {}", status, body)));
        }

        if let Some(id) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if self.session_id.as_deref() != Some(id) {
                debug!(session_id = %id, "MCP HTTP session established");
                self.session_id = Some(id.to_string());
            }
        }

        let event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let body = response
            .text()
            .await
            .map_err(|e| McpError::transport(format!("Failed to read response: {}", e)))?;
        trace!(url = %self.url, body = %body, "MCP HTTP response");

        self.pending.extend(frames_from_body(&body, event_stream));
        Ok(())
    }

    async fn receive(&mut self) -> Result<String, McpError> {
        self.pending
            .pop_front()
            .ok_or_else(|| McpError::transport("No response available - call send() first"))
    }

    async fn close(&mut self) -> Result<(), McpError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.pending.clear();

        // Ask the server to drop its session state; failure only matters to the server
        if let Some(id) = self.session_id.take() {
            let result = self
                .client
                .delete(&self.url)
                .header(SESSION_ID_HEADER, id.as_str())
                .send()
                .await;
            if let Err(e) = result {
                warn!(url = %self.url, error = %e, "Failed to end MCP HTTP session");
            }
        }
        debug!(url = %self.url, "MCP HTTP transport closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.url)
            .field(
                "headers",
                &self.headers.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("session_id", &self.session_id)
            .field("connected", &self.connected)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;

    #[test]
    fn test_plain_json_body() {
        let frames = frames_from_body("  {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n", false);
        assert_eq!(frames, vec![r#"{"jsonrpc":"2.0","id":1,"result":{}}"#.to_string()]);
    }

    #[test]
    fn test_empty_body_queues_nothing() {
        assert!(frames_from_body("", false).is_empty());
        assert!(frames_from_body("\n", true).is_empty());
    }

    #[test]
    fn test_event_stream_body() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\"}\n\n\
                    event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{}}\n\n";
        let frames = frames_from_body(body, true);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains("notifications/message"));
        assert!(frames[1].contains("\"id\":2"));
    }

    #[test]
    fn test_debug_hides_header_values() {
        let endpoint = Endpoint::new("https://example.com").with_header("Authorization", "secret");
        let transport = HttpTransport::connect(&endpoint, Duration::from_secs(5)).unwrap();

        assert_eq!(transport.url(), "https://example.com/mcp");
        let debug_str = format!("{:?}", transport);
        assert!(debug_str.contains("Authorization"));
        assert!(!debug_str.contains("secret"));
    }

    #[tokio::test]
    async fn test_receive_without_send_fails_and_close_is_idempotent() {
        let endpoint = Endpoint::new("http://localhost:1");
        let mut transport = HttpTransport::connect(&endpoint, Duration::from_secs(1)).unwrap();

        assert!(transport.receive().await.is_err());
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_connected());
        assert!(transport.send("{}").await.is_err());
    }
}
