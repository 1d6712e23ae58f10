//! # Weather Bridge Demo
//!
//! Connects to an MCP weather server, prints what it offers, calls one tool
//! through the blocking entry point and resolves one prompt.
//!
//! ## Running
//!
//! ```bash
//! # HTTP server at http://localhost:8000/mcp
//! cargo run -p weather-bridge
//!
//! # Older server speaking the legacy HTTP+SSE binding at http://localhost:8000/sse
//! MCP_BRIDGE_HTTP_MODE=sse cargo run -p weather-bridge
//!
//! # Server spawned as a child process
//! MCP_BRIDGE_COMMAND="python mcp_weather_server.py" cargo run -p weather-bridge
//! ```

use mcp_bridge::{
    BridgeConfig, Endpoint, FieldSpec, McpBridge, PromptDescriptor, Requirement, StdioConfig,
    ToolBinding,
};
use serde_json::Map;
use std::collections::HashMap;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Tool exercised when the server offers it
const PREFERRED_TOOL: &str = "list_cities_tool";

/// City used for prompts that ask for one
const SAMPLE_CITY: &str = "London";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = BridgeConfig::from_env();
    let bridge = match std::env::var("MCP_BRIDGE_COMMAND") {
        Ok(command_line) => {
            let mut parts = command_line.split_whitespace();
            let command = parts
                .next()
                .ok_or_else(|| anyhow::anyhow!("MCP_BRIDGE_COMMAND is empty"))?;
            info!(command = %command_line, "Using stdio MCP server");
            McpBridge::new(StdioConfig::new(command).args(parts), config)
        }
        Err(_) => {
            let endpoint = Endpoint::from_env();
            info!(url = %endpoint.session_url(), mode = ?endpoint.mode(), "Using HTTP MCP server");
            McpBridge::new(endpoint, config)
        }
    };

    if !bridge.connect().await {
        anyhow::bail!("could not connect to the MCP server");
    }

    if let Some(identity) = bridge.session().identity() {
        println!(
            "Connected to {} {}",
            identity.name,
            identity.version.as_deref().unwrap_or("")
        );
    }

    let discovery = bridge.discovery();
    for issue in &discovery.issues {
        warn!(%issue, "Discovery issue");
    }

    println!("\nTools ({}):", discovery.tools.len());
    for tool in &discovery.tools {
        println!("  {} - {}", tool.name(), tool.description());
        for field in &tool.descriptor().fields {
            println!("      {}", describe_field(field));
        }
    }

    println!("\nPrompts ({}):", discovery.prompts.len());
    for prompt in &discovery.prompts {
        println!("  {} - {}", prompt.name(), prompt.description());
        for argument in &prompt.descriptor().arguments {
            println!(
                "      {}{}",
                argument.name,
                if argument.required { " (required)" } else { "" }
            );
        }
    }

    match pick_tool(&discovery.tools) {
        Some(tool) => {
            let name = tool.name().to_string();
            let tool = tool.clone();
            let result = tokio::task::spawn_blocking(move || tool.invoke_blocking(Map::new())).await?;
            println!("\n{} ->\n{}", name, result);
        }
        None => println!("\nNo tool callable without arguments"),
    }

    if let Some(prompt) = discovery.prompts.first() {
        let result = prompt.invoke(sample_arguments(prompt.descriptor())).await;
        println!("\n{} ->\n{}", prompt.name(), result);
    }

    bridge.disconnect().await;
    Ok(())
}

fn describe_field(field: &FieldSpec) -> String {
    let requirement = match &field.requirement {
        Requirement::Required => "required".to_string(),
        Requirement::Optional { default: Some(value) } => format!("default {}", value),
        Requirement::Optional { default: None } => "optional".to_string(),
    };
    match &field.description {
        Some(description) => format!(
            "{}: {} ({}) {}",
            field.name, field.field_type, requirement, description
        ),
        None => format!("{}: {} ({})", field.name, field.field_type, requirement),
    }
}

fn pick_tool(tools: &[ToolBinding]) -> Option<&ToolBinding> {
    tools
        .iter()
        .find(|t| t.name() == PREFERRED_TOOL)
        .or_else(|| tools.iter().find(|t| t.descriptor().required_fields().next().is_none()))
}

fn sample_arguments(prompt: &PromptDescriptor) -> HashMap<String, String> {
    prompt
        .required_arguments()
        .map(|argument| (argument.name.clone(), SAMPLE_CITY.to_string()))
        .collect()
}
