//! Tool trait: typed capabilities a handler may invoke.
//!
//! Every tool declares a name, a JSON schema for its input, and an
//! `execute` that delegates to an external collaborator. Input is checked
//! against the schema before `execute` runs; collaborator failures are turned
//! into textual results so a handler's loop never aborts on a tool error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::thread::ThreadId;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Matches the model's tool_call id
    pub id: String,

    pub name: String,

    pub arguments: Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,

    /// False when the collaborator failed and `output` carries the error text
    pub success: bool,

    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    /// A collaborator failure, worded as `Error performing <operation>: <message>`.
    pub fn failure(operation: &str, error: impl std::fmt::Display) -> Self {
        Self {
            call_id: String::new(),
            success: false,
            output: format!("Error performing {operation}: {error}"),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Per-invocation context supplied by the handler.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub thread_id: ThreadId,
    pub user_id: String,
    pub now: DateTime<Utc>,
}

impl ToolContext {
    pub fn new(thread_id: ThreadId, user_id: impl Into<String>) -> Self {
        Self {
            thread_id,
            user_id: user_id.into(),
            now: Utc::now(),
        }
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "create_task").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Check the payload before execution.
    ///
    /// The default checks required fields, primitive types, enums and
    /// `minLength` against [`Tool::parameters_schema`].
    fn validate(&self, arguments: &Value) -> std::result::Result<(), ToolError> {
        validate_against_schema(self.name(), &self.parameters_schema(), arguments)
    }

    /// Execute the tool. Collaborator failures come back as
    /// `Ok(ToolResult::failure(..))`; `Err` is reserved for input problems.
    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Deserialize validated arguments into a typed input struct.
pub fn parse_input<T: DeserializeOwned>(tool_name: &str, arguments: Value) -> std::result::Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::invalid(tool_name, e.to_string()))
}

/// Minimal JSON-schema check covering what tool schemas declare.
pub fn validate_against_schema(tool_name: &str, schema: &Value, arguments: &Value) -> std::result::Result<(), ToolError> {
    let Some(args) = arguments.as_object() else {
        return Err(ToolError::invalid(tool_name, "arguments must be a JSON object"));
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            match args.get(field) {
                None | Some(Value::Null) => {
                    return Err(ToolError::invalid(tool_name, format!("missing required field `{field}`")));
                }
                _ => {}
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (field, value) in args {
        if value.is_null() {
            continue;
        }
        let Some(spec) = properties.get(field) else {
            continue;
        };
        let type_ok = match spec.get("type").and_then(Value::as_str) {
            Some("string") => value.is_string(),
            Some("integer") => value.is_i64() || value.is_u64(),
            Some("number") => value.is_number(),
            Some("boolean") => value.is_boolean(),
            Some("object") => value.is_object(),
            Some("array") => value.is_array(),
            _ => true,
        };
        if !type_ok {
            return Err(ToolError::invalid(
                tool_name,
                format!("field `{field}` must be of type {}", spec["type"]),
            ));
        }
        if let Some(allowed) = spec.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(ToolError::invalid(
                    tool_name,
                    format!("field `{field}` must be one of {}", Value::Array(allowed.clone())),
                ));
            }
        }
        if let (Some(min), Some(text)) = (spec.get("minLength").and_then(Value::as_u64), value.as_str()) {
            if (text.trim().chars().count() as u64) < min {
                return Err(ToolError::invalid(tool_name, format!("field `{field}` must not be empty")));
            }
        }
    }
    Ok(())
}

/// A per-handler set of tools.
///
/// Each handler builds its own registry at construction time, so a handler
/// can only ever reach the tools it was given.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Builder-style [`ToolRegistry::register`].
    pub fn with(mut self, tool: Box<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Tool definitions in name order (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Validate and execute a tool call.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> std::result::Result<ToolResult, ToolError> {
        let tool = self.tools.get(&call.name).ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.validate(&call.arguments)?;
        let mut result = tool.execute(ctx, call.arguments.clone()).await?;
        result.call_id = call.id.clone();
        Ok(result)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
