//! Stdio Transport for MCP
//!
//! Spawns an MCP server as a subprocess and exchanges newline-delimited
//! JSON-RPC frames over its stdin/stdout.

use crate::protocol::McpError;
use crate::transport::Transport;
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, error, trace, warn};

/// How long a server gets to exit on its own after its stdin is closed
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Command line and environment of a stdio MCP server
#[derive(Debug, Clone)]
pub struct StdioConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<String>,
}

impl StdioConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn display(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Transport over a child process' stdin/stdout
pub struct StdioTransport {
    child: Child,
    /// `None` once closed; dropping it signals EOF to the server
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    connected: bool,
    command_str: String,
}

impl StdioTransport {
    /// Spawn the server described by `config`
    pub async fn spawn(config: &StdioConfig) -> Result<Self, McpError> {
        let command_str = config.display();
        debug!(command = %command_str, "Spawning MCP server process");

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            error!(error = %e, command = %command_str, "Failed to spawn MCP server");
            McpError::ProcessSpawn(format!("{}: {}", command_str, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::ProcessSpawn("Failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::ProcessSpawn("Failed to capture stdout".to_string()))?;

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            connected: true,
            command_str,
        })
    }

    fn check_process(&mut self) -> Result<(), McpError> {
        match self.child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => {
                self.connected = false;
                warn!(
                    command = %self.command_str,
                    exit_code = ?status.code(),
                    "MCP server process exited"
                );
                Err(McpError::ProcessExited)
            }
            Err(e) => {
                self.connected = false;
                Err(McpError::Io(e))
            }
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&mut self, message: &str) -> Result<(), McpError> {
        self.check_process()?;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| McpError::transport("stdin already closed"))?;

        trace!(message = %message, "Sending message to MCP server");
        let mut frame = String::with_capacity(message.len() + 1);
        frame.push_str(message);
        frame.push('\n');

        stdin.write_all(frame.as_bytes()).await.map_err(|e| {
            error!(error = %e, "Failed to write to MCP server stdin");
            McpError::transport(format!("Write failed: {}", e))
        })?;
        stdin
            .flush()
            .await
            .map_err(|e| McpError::transport(format!("Flush failed: {}", e)))
    }

    async fn receive(&mut self) -> Result<String, McpError> {
        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = self.stdout.read_line(&mut line).await.map_err(|e| {
                error!(error = %e, "Failed to read from MCP server stdout");
                McpError::transport(format!("Read failed: {}", e))
            })?;
            if bytes_read == 0 {
                self.connected = false;
                return Err(McpError::ProcessExited);
            }
            let frame = line.trim();
            if !frame.is_empty() {
                trace!(message = %frame, "Received message from MCP server");
                return Ok(frame.to_string());
            }
        }
    }

    async fn close(&mut self) -> Result<(), McpError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        debug!(command = %self.command_str, "Closing MCP server connection");

        // Closing stdin is the polite shutdown request for stdio servers
        drop(self.stdin.take());
        match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(exit_code = ?status.code(), "MCP server process exited");
                Ok(())
            }
            Ok(Err(e)) => Err(McpError::Io(e)),
            Err(_) => {
                debug!(command = %self.command_str, "Killing MCP server process");
                self.child.kill().await.map_err(McpError::Io)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if self.connected {
            // Best effort: drop cannot await the exit
            let _ = self.child.start_kill();
        }
    }
}
