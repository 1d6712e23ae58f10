//! The single return shape of every invocation: text, or an error message.

use crate::error::BridgeError;
use crate::protocol::{GetPromptResult, McpToolResult};
use std::fmt;

/// Text returned for a successful tool call with zero content parts
pub const NO_CONTENT: &str = "No content returned";

/// Text returned for a resolved prompt with zero messages
pub const NO_MESSAGES: &str = "No messages in prompt";

/// Marker every rendered error starts with
pub const ERROR_MARKER: &str = "Error: ";

/// Outcome of a tool call or prompt resolution
///
/// Failures are values, not panics or `Err`s: whoever consumes a binding
/// always gets something printable back. `Display` renders errors with the
/// [`ERROR_MARKER`] prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationResult {
    Text(String),
    Error(String),
}

impl InvocationResult {
    pub fn failure(err: impl Into<BridgeError>) -> Self {
        InvocationResult::Error(err.into().to_string())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, InvocationResult::Error(_))
    }

    /// The text or error message, without the error marker
    pub fn message(&self) -> &str {
        match self {
            InvocationResult::Text(text) | InvocationResult::Error(text) => text,
        }
    }

    pub fn into_result(self) -> Result<String, String> {
        match self {
            InvocationResult::Text(text) => Ok(text),
            InvocationResult::Error(message) => Err(message),
        }
    }
}

impl fmt::Display for InvocationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationResult::Text(text) => f.write_str(text),
            InvocationResult::Error(message) => write!(f, "{}{}", ERROR_MARKER, message),
        }
    }
}

/// Concatenate the textual parts of a tool result, one per line
pub(crate) fn render_tool_result(tool: &str, result: McpToolResult) -> InvocationResult {
    let text = result
        .content
        .iter()
        .filter_map(|part| part.as_text())
        .collect::<Vec<_>>()
        .join("\n");

    if result.is_error {
        let detail = if text.is_empty() {
            "server reported an error without details".to_string()
        } else {
            text
        };
        return InvocationResult::failure(BridgeError::remote(format!("tool `{}`", tool), detail));
    }
    if result.content.is_empty() {
        return InvocationResult::Text(NO_CONTENT.to_string());
    }
    InvocationResult::Text(text)
}

/// Format prompt messages as `role: text` lines
pub(crate) fn render_prompt(result: GetPromptResult) -> InvocationResult {
    if result.messages.is_empty() {
        return InvocationResult::Text(NO_MESSAGES.to_string());
    }
    let transcript = result
        .messages
        .iter()
        .filter_map(|message| {
            message
                .content
                .as_text()
                .map(|text| format!("{}: {}", message.role, text))
        })
        .collect::<Vec<_>>()
        .join("\n");
    InvocationResult::Text(transcript)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{McpContent, PromptMessage};

    fn tool_result(parts: Vec<McpContent>, is_error: bool) -> McpToolResult {
        McpToolResult {
            content: parts,
            is_error,
        }
    }

    #[test]
    fn test_text_parts_joined_by_newline() {
        let result = render_tool_result(
            "list_cities_tool",
            tool_result(
                vec![
                    McpContent::text("Available cities:"),
                    McpContent::Image {
                        data: "AAAA".into(),
                        mime_type: "image/png".into(),
                    },
                    McpContent::text("- London"),
                ],
                false,
            ),
        );
        assert_eq!(
            result,
            InvocationResult::Text("Available cities:\n- London".to_string())
        );
    }

    #[test]
    fn test_empty_content_marker() {
        let result = render_tool_result("noop", tool_result(vec![], false));
        assert_eq!(result.to_string(), "No content returned");
        assert!(!result.is_error());
    }

    #[test]
    fn test_error_result_carries_tool_name() {
        let result = render_tool_result(
            "get_weather_tool",
            tool_result(vec![McpContent::text("city is required")], true),
        );
        assert!(result.is_error());
        assert_eq!(
            result.to_string(),
            "Error: tool `get_weather_tool` failed: city is required"
        );
    }

    #[test]
    fn test_prompt_transcript() {
        let result = render_prompt(GetPromptResult {
            description: None,
            messages: vec![
                PromptMessage {
                    role: "user".into(),
                    content: McpContent::text("Create a weather report for London"),
                },
                PromptMessage {
                    role: "assistant".into(),
                    content: McpContent::text("Sure."),
                },
            ],
        });
        assert_eq!(
            result.message(),
            "user: Create a weather report for London\nassistant: Sure."
        );
    }

    #[test]
    fn test_empty_prompt_marker() {
        let result = render_prompt(GetPromptResult {
            description: Some("empty".into()),
            messages: vec![],
        });
        assert_eq!(result, InvocationResult::Text(NO_MESSAGES.to_string()));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(InvocationResult::Text("ok".into()).into_result(), Ok("ok".into()));
        assert_eq!(
            InvocationResult::Error("boom".into()).into_result(),
            Err("boom".into())
        );
    }
}
