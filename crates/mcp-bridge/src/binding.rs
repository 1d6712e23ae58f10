//! Callable Binding
//!
//! Local callables for discovered tools and prompts. A binding holds a
//! non-owning reference to its [`SessionHandle`]; once the handle is
//! dropped or disconnected, invocations return an error result.
//!
//! Argument handling is permissive: missing required fields are logged and
//! forwarded anyway, unknown fields pass through untouched, and only
//! numeric-looking strings for numeric fields are coerced. The server stays
//! the authority on its own schema.

use crate::blocking::block_on;
use crate::error::BridgeError;
use crate::result::InvocationResult;
use crate::schema::{FieldType, PromptDescriptor, ToolDescriptor};
use crate::session::SessionHandle;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, instrument, warn};

/// Field name a free-text input falls back to
pub const QUERY_FIELD: &str = "query";

/// Binding for one discovered tool
#[derive(Debug, Clone)]
pub struct ToolBinding {
    descriptor: ToolDescriptor,
    session: Weak<SessionHandle>,
}

impl ToolBinding {
    pub fn new(descriptor: ToolDescriptor, session: &Arc<SessionHandle>) -> Self {
        Self {
            descriptor,
            session: Arc::downgrade(session),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn description(&self) -> &str {
        &self.descriptor.description
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Apply the permissive argument policy
    ///
    /// Declared defaults fill absent optional fields; numeric strings are
    /// coerced for numeric fields; everything else is left as given.
    pub fn prepare_arguments(&self, mut arguments: Map<String, Value>) -> Map<String, Value> {
        for field in &self.descriptor.fields {
            match arguments.get_mut(&field.name) {
                Some(value) => {
                    if let Some(coerced) = coerce(field.field_type, value) {
                        debug!(field = %field.name, "Coerced numeric string argument");
                        *value = coerced;
                    }
                }
                None if field.is_required() => {
                    warn!(
                        tool_name = %self.descriptor.name,
                        field = %field.name,
                        "Required argument missing, forwarding call anyway"
                    );
                }
                None => {
                    if let Some(default) = field.default_value() {
                        arguments.insert(field.name.clone(), default.clone());
                    }
                }
            }
        }
        arguments
    }

    /// Call the tool; failures come back as [`InvocationResult::Error`]
    #[instrument(skip(self, arguments), fields(tool_name = %self.descriptor.name))]
    pub async fn invoke(&self, arguments: Map<String, Value>) -> InvocationResult {
        let Some(session) = self.session.upgrade() else {
            return InvocationResult::failure(BridgeError::remote(
                format!("tool `{}`", self.descriptor.name),
                BridgeError::NotConnected,
            ));
        };
        let arguments = self.prepare_arguments(arguments);
        session.call_tool(&self.descriptor.name, arguments).await
    }

    /// [`invoke`](Self::invoke) for synchronous callers
    pub fn invoke_blocking(&self, arguments: Map<String, Value>) -> InvocationResult {
        block_on(self.invoke(arguments))
    }

    /// Build arguments from a single free-text input
    ///
    /// A JSON object is used as-is. Any other text is bound to the only
    /// required field, else the only field, else [`QUERY_FIELD`].
    pub fn arguments_from_text(&self, input: &str) -> Map<String, Value> {
        let trimmed = input.trim();
        if trimmed.starts_with('{') {
            match serde_json::from_str::<Map<String, Value>>(trimmed) {
                Ok(arguments) => return arguments,
                Err(e) => debug!(error = %e, "Input is not a JSON object, binding it as text"),
            }
        }

        let mut required = self.descriptor.required_fields();
        let target = match (required.next(), required.next()) {
            (Some(only), None) => only.name.as_str(),
            _ => match self.descriptor.fields.as_slice() {
                [only] => only.name.as_str(),
                _ => QUERY_FIELD,
            },
        };

        let mut arguments = Map::new();
        arguments.insert(target.to_string(), Value::String(input.to_string()));
        arguments
    }

    pub async fn invoke_text(&self, input: &str) -> InvocationResult {
        self.invoke(self.arguments_from_text(input)).await
    }

    pub fn invoke_text_blocking(&self, input: &str) -> InvocationResult {
        self.invoke_blocking(self.arguments_from_text(input))
    }
}

fn coerce(field_type: FieldType, value: &Value) -> Option<Value> {
    let text = value.as_str()?.trim();
    match field_type {
        FieldType::Integer => text.parse::<i64>().ok().map(Value::from),
        FieldType::Float => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
}

/// Binding for one discovered prompt
#[derive(Debug, Clone)]
pub struct PromptBinding {
    descriptor: PromptDescriptor,
    session: Weak<SessionHandle>,
}

impl PromptBinding {
    pub fn new(descriptor: PromptDescriptor, session: &Arc<SessionHandle>) -> Self {
        Self {
            descriptor,
            session: Arc::downgrade(session),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn description(&self) -> &str {
        &self.descriptor.description
    }

    pub fn descriptor(&self) -> &PromptDescriptor {
        &self.descriptor
    }

    /// Resolve the prompt into a `role: text` transcript
    #[instrument(skip(self, arguments), fields(prompt_name = %self.descriptor.name))]
    pub async fn invoke(&self, arguments: HashMap<String, String>) -> InvocationResult {
        let Some(session) = self.session.upgrade() else {
            return InvocationResult::failure(BridgeError::remote(
                format!("prompt `{}`", self.descriptor.name),
                BridgeError::NotConnected,
            ));
        };
        for argument in self.descriptor.required_arguments() {
            if !arguments.contains_key(&argument.name) {
                warn!(
                    prompt_name = %self.descriptor.name,
                    argument = %argument.name,
                    "Required prompt argument missing, forwarding anyway"
                );
            }
        }
        session.get_prompt(&self.descriptor.name, Some(arguments)).await
    }

    pub fn invoke_blocking(&self, arguments: HashMap<String, String>) -> InvocationResult {
        block_on(self.invoke(arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ProtocolSession;
    use crate::config::BridgeConfig;
    use crate::connector::Connector;
    use crate::protocol::{
        GetPromptResult, InitializeResult, McpContent, McpError, McpPrompt, McpTool,
        McpToolResult, PromptMessage, ServerCapabilities, ServerInfo,
    };
    use crate::schema::{translate_prompt, translate_tool};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<(String, Value)>>>;

    /// Echoes every call's arguments back as the result text
    struct EchoSession {
        seen: Seen,
    }

    #[async_trait]
    impl ProtocolSession for EchoSession {
        async fn initialize(&mut self) -> Result<InitializeResult, McpError> {
            Ok(InitializeResult {
                protocol_version: "2024-11-05".into(),
                capabilities: ServerCapabilities::default(),
                server_info: ServerInfo {
                    name: "echo".into(),
                    version: None,
                },
                instructions: None,
            })
        }

        async fn list_tools(&mut self) -> Result<Vec<McpTool>, McpError> {
            Ok(vec![])
        }

        async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<McpToolResult, McpError> {
            self.seen.lock().unwrap().push((name.to_string(), arguments.clone()));
            Ok(McpToolResult {
                content: vec![McpContent::text(arguments.to_string())],
                is_error: false,
            })
        }

        async fn list_prompts(&mut self) -> Result<Vec<McpPrompt>, McpError> {
            Ok(vec![])
        }

        async fn get_prompt(
            &mut self,
            name: &str,
            arguments: HashMap<String, String>,
        ) -> Result<GetPromptResult, McpError> {
            let city = arguments.get("city").cloned().unwrap_or_default();
            Ok(GetPromptResult {
                description: None,
                messages: vec![PromptMessage {
                    role: "user".into(),
                    content: McpContent::text(format!("{} for {}", name, city)),
                }],
            })
        }

        async fn close(&mut self) -> Result<(), McpError> {
            Ok(())
        }
    }

    struct EchoConnector {
        seen: Seen,
    }

    #[async_trait]
    impl Connector for EchoConnector {
        async fn open(&self, _config: &BridgeConfig) -> Result<Box<dyn ProtocolSession>, McpError> {
            Ok(Box::new(EchoSession {
                seen: self.seen.clone(),
            }))
        }

        fn describe(&self) -> String {
            "echo".into()
        }
    }

    async fn connected() -> (Arc<SessionHandle>, Seen) {
        let seen: Seen = Arc::default();
        let handle = Arc::new(SessionHandle::new(
            EchoConnector { seen: seen.clone() },
            BridgeConfig::default(),
        ));
        assert!(handle.connect().await);
        (handle, seen)
    }

    fn weather_update_tool() -> ToolDescriptor {
        translate_tool(&McpTool {
            name: "set_weather_tool".into(),
            description: Some("Update the weather for a city".into()),
            input_schema: Some(json!({
                "type": "object",
                "properties": {
                    "city": {"type": "string"},
                    "temp": {"type": "number"},
                    "humidity": {"type": "integer", "default": 50},
                    "condition": {"type": "string"}
                },
                "required": ["city", "temp"]
            })),
        })
        .unwrap()
    }

    fn weather_tool() -> ToolDescriptor {
        translate_tool(&McpTool {
            name: "get_weather_tool".into(),
            description: None,
            input_schema: Some(json!({
                "type": "object",
                "properties": {"city": {"type": "string"}, "units": {"type": "string"}},
                "required": ["city"]
            })),
        })
        .unwrap()
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_prepare_arguments_policy() {
        let (session, _) = connected().await;
        let binding = ToolBinding::new(weather_update_tool(), &session);

        let prepared = binding.prepare_arguments(args(json!({
            "city": "London",
            "temp": " 21.5",
            "pressure": "1013"
        })));

        assert_eq!(prepared["temp"], json!(21.5));
        // Default filled, absent-without-default stays absent
        assert_eq!(prepared["humidity"], json!(50));
        assert!(!prepared.contains_key("condition"));
        // Unknown fields pass through verbatim
        assert_eq!(prepared["pressure"], json!("1013"));
    }

    #[tokio::test]
    async fn test_ambiguous_values_pass_through() {
        let (session, _) = connected().await;
        let binding = ToolBinding::new(weather_update_tool(), &session);

        let prepared = binding.prepare_arguments(args(json!({
            "city": 7,
            "temp": "warm",
            "humidity": "high"
        })));
        assert_eq!(prepared["city"], json!(7));
        assert_eq!(prepared["temp"], json!("warm"));
        assert_eq!(prepared["humidity"], json!("high"));
    }

    #[tokio::test]
    async fn test_missing_required_is_forwarded() {
        let (session, seen) = connected().await;
        let binding = ToolBinding::new(weather_update_tool(), &session);

        let result = binding.invoke(Map::new()).await;
        assert!(!result.is_error());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "set_weather_tool");
        assert_eq!(seen[0].1, json!({"humidity": 50}));
    }

    #[tokio::test]
    async fn test_arguments_from_text() {
        let (session, _) = connected().await;
        let binding = ToolBinding::new(weather_tool(), &session);

        assert_eq!(binding.arguments_from_text("Tokyo"), args(json!({"city": "Tokyo"})));
        assert_eq!(
            binding.arguments_from_text(r#"{"city": "Paris", "units": "C"}"#),
            args(json!({"city": "Paris", "units": "C"}))
        );
        // Malformed JSON falls back to plain text
        assert_eq!(binding.arguments_from_text("{oops"), args(json!({"city": "{oops"})));

        let update = ToolBinding::new(weather_update_tool(), &session);
        assert_eq!(update.arguments_from_text("London"), args(json!({"query": "London"})));
    }

    #[tokio::test]
    async fn test_dropped_session_fails_cleanly() {
        let (session, _) = connected().await;
        let binding = ToolBinding::new(weather_tool(), &session);
        drop(session);

        let result = binding.invoke(Map::new()).await;
        assert_eq!(
            result.to_string(),
            "Error: tool `get_weather_tool` failed: not connected"
        );
    }

    #[test]
    fn test_invoke_blocking_without_scheduler() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (session, seen) = runtime.block_on(connected());
        let binding = ToolBinding::new(weather_tool(), &session);

        let result = binding.invoke_text_blocking("Berlin");
        assert_eq!(result.message(), r#"{"city":"Berlin"}"#);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prompt_binding() {
        let (session, _) = connected().await;
        let descriptor = translate_prompt(&McpPrompt {
            name: "weather_report".into(),
            description: None,
            arguments: Some(vec![crate::protocol::PromptArgument {
                name: "city".into(),
                description: None,
                required: true,
            }]),
        })
        .unwrap();
        let binding = PromptBinding::new(descriptor, &session);

        let mut arguments = HashMap::new();
        arguments.insert("city".to_string(), "London".to_string());
        let result = binding.invoke(arguments).await;
        assert_eq!(result.message(), "user: weather_report for London");

        // Missing required argument is still sent
        let result = binding.invoke(HashMap::new()).await;
        assert_eq!(result.message(), "user: weather_report for ");
    }
}
