//! File read tool: read file contents with path validation.

use async_trait::async_trait;
use relayclaw_core::error::ToolError;
use relayclaw_core::schema::{ObjectSchema, SchemaType};
use relayclaw_core::tool::Tool;

use crate::path_guard::PathGuard;
use crate::{permission_denied, string_arg};

pub struct FileReadTool {
    guard: PathGuard,
}

impl FileReadTool {
    pub fn new(guard: PathGuard) -> Self {
        Self { guard }
    }
}

impl Default for FileReadTool {
    fn default() -> Self {
        Self::new(PathGuard::unrestricted())
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file."
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new().required_property("path", SchemaType::string("The path to the file"))
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = string_arg(&arguments, "path")?;
        let resolved = self
            .guard
            .check(path)
            .map_err(|e| permission_denied(self.name(), e))?;

        tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("Failed to read {path}: {e}"),
            })
    }
}
