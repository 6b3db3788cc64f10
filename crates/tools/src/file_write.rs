//! File write tool: create or overwrite files with path validation.

use async_trait::async_trait;
use relayclaw_core::error::ToolError;
use relayclaw_core::schema::{ObjectSchema, SchemaType};
use relayclaw_core::tool::Tool;
use tracing::debug;

use crate::path_guard::PathGuard;
use crate::{permission_denied, string_arg};

pub struct FileWriteTool {
    guard: PathGuard,
}

impl FileWriteTool {
    pub fn new(guard: PathGuard) -> Self {
        Self { guard }
    }
}

impl Default for FileWriteTool {
    fn default() -> Self {
        Self::new(PathGuard::unrestricted())
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file (overwrite)."
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new()
            .required_property("path", SchemaType::string("The path to the file"))
            .required_property("content", SchemaType::string("The content to write"))
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = string_arg(&arguments, "path")?;
        let content = string_arg(&arguments, "content")?;

        let resolved = self
            .guard
            .check(path)
            .map_err(|e| permission_denied(self.name(), e))?;

        debug!(path = %resolved.display(), bytes = content.len(), "Writing file");

        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("Failed to write {path}: {e}"),
            })?;

        Ok(format!("File written to {path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        let path = file.to_str().unwrap();
        let tool = FileWriteTool::default();

        let out = tool
            .execute(serde_json::json!({ "path": path, "content": "first" }))
            .await
            .unwrap();
        assert_eq!(out, format!("File written to {path}"));

        tool.execute(serde_json::json!({ "path": path, "content": "second" }))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "second");
    }

    #[tokio::test]
    async fn missing_content_argument() {
        let result = FileWriteTool::default()
            .execute(serde_json::json!({ "path": "/tmp/x.txt" }))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn forbidden_path_denied() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileWriteTool::new(PathGuard::new(vec![], vec![dir.path().to_path_buf()]));
        let target = dir.path().join("blocked.txt");
        let err = tool
            .execute(serde_json::json!({ "path": target.to_str().unwrap(), "content": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn missing_parent_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("no/such/dir/file.txt");
        let err = FileWriteTool::default()
            .execute(serde_json::json!({ "path": target.to_str().unwrap(), "content": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
