//! Discovery Pipeline
//!
//! Lists a session's tools and prompts and builds a binding for every entry
//! that translates. Nothing here fails: listing errors, malformed entries
//! and duplicate names are recorded as [`DiscoveryIssue`]s and logged.

use crate::binding::{PromptBinding, ToolBinding};
use crate::blocking::block_on;
use crate::error::SchemaError;
use crate::schema::{translate_prompt, translate_tool};
use crate::session::{Listing, SessionHandle};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Something discovery had to skip or could not do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryIssue {
    ToolListing(String),
    PromptListing(String),
    InvalidTool(SchemaError),
    InvalidPrompt(SchemaError),
    /// Later entries with an already-bound name are dropped
    DuplicateTool(String),
    DuplicatePrompt(String),
}

impl fmt::Display for DiscoveryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryIssue::ToolListing(reason) => write!(f, "tool listing failed: {}", reason),
            DiscoveryIssue::PromptListing(reason) => write!(f, "prompt listing failed: {}", reason),
            DiscoveryIssue::InvalidTool(err) => write!(f, "skipped tool: {}", err),
            DiscoveryIssue::InvalidPrompt(err) => write!(f, "skipped prompt: {}", err),
            DiscoveryIssue::DuplicateTool(name) => write!(f, "duplicate tool `{}` skipped", name),
            DiscoveryIssue::DuplicatePrompt(name) => write!(f, "duplicate prompt `{}` skipped", name),
        }
    }
}

/// Bindings produced by one discovery run
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub tools: Vec<ToolBinding>,
    pub prompts: Vec<PromptBinding>,
    pub issues: Vec<DiscoveryIssue>,
}

impl Discovery {
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.prompts.is_empty()
    }

    /// True when both listings succeeded and every entry was bound
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn tool(&self, name: &str) -> Option<&ToolBinding> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn prompt(&self, name: &str) -> Option<&PromptBinding> {
        self.prompts.iter().find(|p| p.name() == name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn prompt_names(&self) -> Vec<&str> {
        self.prompts.iter().map(|p| p.name()).collect()
    }
}

/// Build bindings for everything the session currently advertises
#[instrument(skip(session))]
pub async fn discover(session: &Arc<SessionHandle>) -> Discovery {
    let mut discovery = Discovery::default();

    match session.list_tools().await {
        Listing::Listed(entries) => {
            let mut seen = HashSet::new();
            for entry in &entries {
                let descriptor = match translate_tool(entry) {
                    Ok(descriptor) => descriptor,
                    Err(err) => {
                        warn!(error = %err, "Skipping tool");
                        discovery.issues.push(DiscoveryIssue::InvalidTool(err));
                        continue;
                    }
                };
                if !seen.insert(descriptor.name.clone()) {
                    warn!(tool_name = %descriptor.name, "Skipping duplicate tool");
                    discovery.issues.push(DiscoveryIssue::DuplicateTool(descriptor.name));
                    continue;
                }
                discovery.tools.push(ToolBinding::new(descriptor, session));
            }
        }
        Listing::Failed(err) => {
            warn!(error = %err, "Tool listing failed, continuing without tools");
            discovery.issues.push(DiscoveryIssue::ToolListing(err.to_string()));
        }
    }

    match session.list_prompts().await {
        Listing::Listed(entries) => {
            let mut seen = HashSet::new();
            for entry in &entries {
                let descriptor = match translate_prompt(entry) {
                    Ok(descriptor) => descriptor,
                    Err(err) => {
                        warn!(error = %err, "Skipping prompt");
                        discovery.issues.push(DiscoveryIssue::InvalidPrompt(err));
                        continue;
                    }
                };
                if !seen.insert(descriptor.name.clone()) {
                    warn!(prompt_name = %descriptor.name, "Skipping duplicate prompt");
                    discovery.issues.push(DiscoveryIssue::DuplicatePrompt(descriptor.name));
                    continue;
                }
                discovery.prompts.push(PromptBinding::new(descriptor, session));
            }
        }
        Listing::Failed(err) => {
            warn!(error = %err, "Prompt listing failed, continuing without prompts");
            discovery.issues.push(DiscoveryIssue::PromptListing(err.to_string()));
        }
    }

    info!(
        tool_count = discovery.tools.len(),
        prompt_count = discovery.prompts.len(),
        issue_count = discovery.issues.len(),
        "Discovery complete"
    );
    discovery
}

/// [`discover`] for synchronous callers
pub fn discover_blocking(session: &Arc<SessionHandle>) -> Discovery {
    block_on(discover(session))
}
