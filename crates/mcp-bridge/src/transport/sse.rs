//! Legacy HTTP+SSE Transport
//!
//! The older MCP HTTP binding. The client keeps one `GET` event stream open
//! on the session URL (conventionally `<base>/sse`). The server's first
//! `endpoint` event names the URL every outgoing frame is POSTed to; replies
//! and server-initiated messages come back as `message` events on the stream.

use crate::config::Endpoint;
use crate::protocol::McpError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Event name of the message-URL announcement
const ENDPOINT_EVENT: &str = "endpoint";

/// Event name carrying JSON-RPC frames, also the default for unnamed events
const MESSAGE_EVENT: &str = "message";

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser
///
/// Chunks may split anywhere, even inside a UTF-8 sequence; only complete
/// lines are interpreted.
#[derive(Debug, Default)]
pub(crate) struct EventParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl EventParser {
    /// Consume a chunk and return every event it completed
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(event) = self.line(line.trim_end_matches(|c: char| c == '\n' || c == '\r')) {
                events.push(event);
            }
        }
        events
    }

    /// Flush an event left open when the stream ends without a blank line
    pub(crate) fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw);
            if let Some(event) = self.line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment, used by servers as a keep-alive
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // `id` and `retry` only matter for reconnection, which is not attempted
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event: event.unwrap_or_else(|| MESSAGE_EVENT.to_string()),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// Stream reader task, aborted when dropped
struct StreamReader(JoinHandle<()>);

impl Drop for StreamReader {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Legacy SSE transport bound to one [`Endpoint`]
pub struct SseTransport {
    stream_url: String,
    post_url: String,
    client: reqwest::Client,
    headers: Vec<(String, String)>,
    request_timeout: Duration,
    inbound: mpsc::UnboundedReceiver<SseEvent>,
    reader: StreamReader,
    connected: bool,
}

impl SseTransport {
    /// Open the event stream and wait for the server to announce its message URL
    ///
    /// Must run inside a tokio runtime; the stream reader is spawned onto it.
    pub async fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<Self, McpError> {
        let stream_url = endpoint.session_url();
        let base = Url::parse(&stream_url)
            .map_err(|e| McpError::transport(format!("Invalid SSE URL {}: {}", stream_url, e)))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| McpError::transport(format!("Failed to create HTTP client: {}", e)))?;

        let mut request = client.get(base.clone()).header(ACCEPT, "text/event-stream");
        for (key, value) in endpoint.headers() {
            request = request.header(key.as_str(), value.as_str());
        }
        let response = tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| McpError::Timeout(timeout))?
            .map_err(|e| McpError::transport(format!("SSE connect failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(McpError::transport(format!("SSE connect failed: HTTP {}", status)));
        }

        let (events, mut inbound) = mpsc::unbounded_channel();
        let reader = StreamReader(tokio::spawn(read_events(response, events, stream_url.clone())));

        let announced = match tokio::time::timeout(timeout, next_endpoint(&mut inbound)).await {
            Ok(Some(announced)) => announced,
            Ok(None) => {
                return Err(McpError::transport(
                    "event stream closed before announcing an endpoint",
                ))
            }
            Err(_) => return Err(McpError::Timeout(timeout)),
        };
        let post_url = base.join(announced.trim()).map_err(|e| {
            McpError::protocol(format!("Invalid endpoint announcement {:?}: {}", announced, e))
        })?;
        debug!(stream_url = %stream_url, post_url = %post_url, "MCP SSE session established");

        Ok(Self {
            stream_url,
            post_url: post_url.to_string(),
            client,
            headers: endpoint.headers().to_vec(),
            request_timeout: timeout,
            inbound,
            reader,
            connected: true,
        })
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    /// URL announced by the server for outgoing frames
    pub fn post_url(&self) -> &str {
        &self.post_url
    }
}

async fn next_endpoint(inbound: &mut mpsc::UnboundedReceiver<SseEvent>) -> Option<String> {
    while let Some(event) = inbound.recv().await {
        if event.event == ENDPOINT_EVENT {
            return Some(event.data);
        }
        debug!(event = %event.event, "Ignoring SSE event before endpoint announcement");
    }
    None
}

/// Forward parsed events until the stream ends or the transport is gone
async fn read_events(
    response: reqwest::Response,
    events: mpsc::UnboundedSender<SseEvent>,
    url: String,
) {
    let mut parser = EventParser::default();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                for event in parser.feed(&bytes) {
                    trace!(url = %url, event = %event.event, data = %event.data, "MCP SSE event");
                    if events.send(event).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "MCP SSE stream failed");
                break;
            }
        }
    }
    if let Some(event) = parser.finish() {
        let _ = events.send(event);
    }
    debug!(url = %url, "MCP SSE stream ended");
}

#[async_trait]
impl super::Transport for SseTransport {
    async fn send(&mut self, message: &str) -> Result<(), McpError> {
        if !self.connected {
            return Err(McpError::transport("SSE transport is closed"));
        }
        trace!(url = %self.post_url, message = %message, "MCP SSE send");

        let mut request = self
            .client
            .post(&self.post_url)
            .timeout(self.request_timeout)
            .header(CONTENT_TYPE, "application/json");
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request
            .body(message.to_string())
            .send()
            .await
            .map_err(|e| McpError::transport(format!("HTTP request failed: {}", e)))?;

        // Usually `202 Accepted`; the reply itself arrives on the stream
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::transport(format!("HTTP error {}: {}", status, body)));
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<String, McpError> {
        if !self.connected {
            return Err(McpError::transport("SSE transport is closed"));
        }
        while let Some(event) = self.inbound.recv().await {
            if event.event == MESSAGE_EVENT {
                return Ok(event.data);
            }
            debug!(event = %event.event, "Ignoring SSE event");
        }
        self.connected = false;
        Err(McpError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), McpError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.reader.0.abort();
        self.inbound.close();
        debug!(url = %self.stream_url, "MCP SSE transport closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl std::fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseTransport")
            .field("stream_url", &self.stream_url)
            .field("post_url", &self.post_url)
            .field(
                "headers",
                &self.headers.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("connected", &self.connected)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, data: &str) -> SseEvent {
        SseEvent {
            event: name.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_endpoint_then_message() {
        let mut parser = EventParser::default();
        let events = parser.feed(
            b"event: endpoint\ndata: /messages/?session_id=abc\n\n\
              event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n",
        );
        assert_eq!(
            events,
            vec![
                event("endpoint", "/messages/?session_id=abc"),
                event("message", r#"{"jsonrpc":"2.0","id":1,"result":{}}"#),
            ]
        );
    }

    #[test]
    fn test_chunks_split_mid_line() {
        let mut parser = EventParser::default();
        assert!(parser.feed(b"event: mess").is_empty());
        assert!(parser.feed(b"age\r\ndata: {\"id\"").is_empty());
        let events = parser.feed(b":2}\r\n\r\n");
        assert_eq!(events, vec![event("message", r#"{"id":2}"#)]);
    }

    #[test]
    fn test_split_utf8_sequence() {
        let text = "data: Zürich\n\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut parser = EventParser::default();
        assert!(parser.feed(&text[..split]).is_empty());
        assert_eq!(parser.feed(&text[split..]), vec![event("message", "Zürich")]);
    }

    #[test]
    fn test_comments_and_multiline_data() {
        let mut parser = EventParser::default();
        let events = parser.feed(b": ping\n\ndata: first\ndata: second\nid: 7\n\n");
        assert_eq!(events, vec![event("message", "first\nsecond")]);
    }

    #[test]
    fn test_finish_flushes_open_event() {
        let mut parser = EventParser::default();
        assert!(parser.feed(b"event: message\ndata: tail").is_empty());
        assert_eq!(parser.finish(), Some(event("message", "tail")));
        assert_eq!(parser.finish(), None);
    }

    #[tokio::test]
    async fn test_unreachable_stream_fails_to_connect() {
        let endpoint = Endpoint::legacy_sse("http://127.0.0.1:1");
        let err = SseTransport::connect(&endpoint, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Transport(_) | McpError::Timeout(_)));
    }
}
