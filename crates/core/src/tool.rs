//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! run shell commands, read/write files, tell the time, schedule jobs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::ToolError;
use crate::message::ToolCallRequest;
use crate::provider::ToolDefinition;
use crate::schema::{ObjectSchema, SchemaType};

/// The outcome of dispatching one [`ToolCallRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The call ID this result answers
    pub call_id: String,

    /// The tool that was requested
    pub tool_name: String,

    /// Tool output, or the rendered error text
    pub output: String,

    /// Whether the tool ran and succeeded
    pub success: bool,
}

/// The core Tool trait.
///
/// A tool is single-shot: anything it opens during `execute` is released
/// before it returns.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell_run", "file_read").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// Shape of the argument object.
    fn parameters(&self) -> ObjectSchema;

    /// Execute the tool with parsed arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: SchemaType::Object(self.parameters()),
        }
    }
}

/// A registry of available tools, keyed by unique name.
///
/// The orchestrator uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. A second tool with the same name is rejected.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        debug!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// The full catalogue exposed to the model, ordered by name.
    pub fn schemas(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name with a raw argument payload.
    ///
    /// The payload is parsed before the tool sees it. Malformed payloads and
    /// argument errors reported by the tool come back as `ExecutionFailed`.
    pub async fn execute(&self, name: &str, payload: &str) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let arguments = parse_arguments(name, payload)?;

        let missing = tool.parameters().missing_required(&arguments).join(", ");
        if !missing.is_empty() {
            return Err(ToolError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: format!("missing required argument(s): {missing}"),
            });
        }

        tool.execute(arguments).await.map_err(|e| match e {
            ToolError::InvalidArguments(reason) => ToolError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: format!("invalid arguments: {reason}"),
            },
            other => other,
        })
    }

    /// Execute a tool call and fold any failure into result text.
    pub async fn dispatch(&self, call: &ToolCallRequest) -> ToolCallResult {
        let (output, success) = match self.execute(&call.name, &call.arguments).await {
            Ok(output) => (output, true),
            Err(e) => (format!("Error: {e}"), false),
        };
        ToolCallResult {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            output,
            success,
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_arguments(tool_name: &str, payload: &str) -> Result<serde_json::Value, ToolError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason: format!("malformed arguments: {e}"),
        })?;
    if !value.is_object() {
        return Err(ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason: "malformed arguments: expected a JSON object".into(),
        });
    }
    Ok(value)
}
