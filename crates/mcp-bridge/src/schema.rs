//! Schema Translator
//!
//! Turns the JSON-schema-like `inputSchema` of a listing entry into a flat
//! [`ToolDescriptor`]: one [`FieldSpec`] per top-level property. Nested
//! schemas are not descended into; an object-typed property is simply an
//! [`FieldType::Object`] field.

use crate::error::SchemaError;
use crate::protocol::{McpPrompt, McpTool};
use serde_json::{Map, Value};
use std::fmt;

/// Primitive category of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    List,
    Object,
    Any,
}

impl FieldType {
    /// Map a JSON Schema `type` tag. Unknown or missing tags are strings;
    /// a union collapses to its single non-null member, else `Any`.
    pub fn from_type_tag(tag: Option<&Value>) -> Self {
        match tag {
            Some(Value::String(name)) => Self::from_name(name).unwrap_or(FieldType::String),
            Some(Value::Array(members)) => {
                let mut concrete = members
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|name| *name != "null");
                match (concrete.next(), concrete.next()) {
                    (Some(only), None) => Self::from_name(only).unwrap_or(FieldType::String),
                    _ => FieldType::Any,
                }
            }
            _ => FieldType::String,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => FieldType::String,
            "integer" => FieldType::Integer,
            "number" => FieldType::Float,
            "boolean" => FieldType::Boolean,
            "array" => FieldType::List,
            "object" => FieldType::Object,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::List => "list",
            FieldType::Object => "object",
            FieldType::Any => "any",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a caller must supply a field
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    Required,
    /// `default` is `None` when the schema declares none; nothing is invented
    Optional { default: Option<Value> },
}

/// One named input of a tool
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub requirement: Requirement,
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn is_required(&self) -> bool {
        matches!(self.requirement, Requirement::Required)
    }

    /// Declared default of an optional field
    pub fn default_value(&self) -> Option<&Value> {
        match &self.requirement {
            Requirement::Optional { default } => default.as_ref(),
            Requirement::Required => None,
        }
    }
}

/// Flat description of a discovered tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub fields: Vec<FieldSpec>,
}

impl ToolDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.is_required())
    }
}

/// One string argument of a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptArgumentSpec {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
}

/// Description of a discovered prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptDescriptor {
    pub name: String,
    pub description: String,
    pub arguments: Vec<PromptArgumentSpec>,
}

impl PromptDescriptor {
    pub fn required_arguments(&self) -> impl Iterator<Item = &PromptArgumentSpec> {
        self.arguments.iter().filter(|a| a.required)
    }
}

/// Translate a `tools/list` entry
///
/// Rejects entries without a name, without an object `inputSchema`, or
/// whose schema has no `properties` object.
pub fn translate_tool(tool: &McpTool) -> Result<ToolDescriptor, SchemaError> {
    if tool.name.trim().is_empty() {
        return Err(SchemaError::new("", "tool has no name"));
    }
    let schema = tool
        .input_schema
        .as_ref()
        .ok_or_else(|| SchemaError::new(&tool.name, "missing inputSchema"))?
        .as_object()
        .ok_or_else(|| SchemaError::new(&tool.name, "inputSchema is not an object"))?;
    let properties = schema
        .get("properties")
        .ok_or_else(|| SchemaError::new(&tool.name, "inputSchema has no properties"))?
        .as_object()
        .ok_or_else(|| SchemaError::new(&tool.name, "properties is not an object"))?;

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let fields = properties
        .iter()
        .map(|(name, property)| field_from_property(name, property, required.contains(&name.as_str())))
        .collect();

    Ok(ToolDescriptor {
        name: tool.name.clone(),
        description: tool.description.clone().unwrap_or_default(),
        fields,
    })
}

fn field_from_property(name: &str, property: &Value, required: bool) -> FieldSpec {
    let empty = Map::new();
    let property = property.as_object().unwrap_or(&empty);

    let requirement = if required {
        Requirement::Required
    } else {
        Requirement::Optional {
            default: property.get("default").cloned(),
        }
    };

    FieldSpec {
        name: name.to_string(),
        field_type: FieldType::from_type_tag(property.get("type")),
        requirement,
        description: property
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Translate a `prompts/list` entry
pub fn translate_prompt(prompt: &McpPrompt) -> Result<PromptDescriptor, SchemaError> {
    if prompt.name.trim().is_empty() {
        return Err(SchemaError::new("", "prompt has no name"));
    }
    let arguments = prompt
        .arguments
        .iter()
        .flatten()
        .map(|arg| {
            if arg.name.trim().is_empty() {
                return Err(SchemaError::new(&prompt.name, "argument has no name"));
            }
            Ok(PromptArgumentSpec {
                name: arg.name.clone(),
                description: arg.description.clone(),
                required: arg.required,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PromptDescriptor {
        name: prompt.name.clone(),
        description: prompt.description.clone().unwrap_or_default(),
        arguments,
    })
}
