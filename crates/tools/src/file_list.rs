//! File list tool: directory listing with sizes.

use async_trait::async_trait;
use relayclaw_core::error::ToolError;
use relayclaw_core::schema::{ObjectSchema, SchemaType};
use relayclaw_core::tool::Tool;

use crate::path_guard::PathGuard;
use crate::{permission_denied, string_arg};

pub struct FileListTool {
    guard: PathGuard,
}

impl FileListTool {
    pub fn new(guard: PathGuard) -> Self {
        Self { guard }
    }
}

impl Default for FileListTool {
    fn default() -> Self {
        Self::new(PathGuard::unrestricted())
    }
}

#[async_trait]
impl Tool for FileListTool {
    fn name(&self) -> &str {
        "file_list"
    }

    fn description(&self) -> &str {
        "List files in a directory."
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new().required_property("path", SchemaType::string("The directory path"))
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = string_arg(&arguments, "path")?;
        let resolved = self
            .guard
            .check(path)
            .map_err(|e| permission_denied(self.name(), e))?;

        let failed = |e: std::io::Error| ToolError::ExecutionFailed {
            tool_name: "file_list".into(),
            reason: format!("Failed to list {path}: {e}"),
        };

        let mut dir = tokio::fs::read_dir(&resolved).await.map_err(failed)?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(failed)? {
            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            entries.push((entry.file_name().to_string_lossy().into_owned(), size));
        }

        if entries.is_empty() {
            return Ok(format!("Directory {path} is empty"));
        }

        entries.sort();
        Ok(entries
            .iter()
            .map(|(name, size)| format!("{name} ({size} bytes)\n"))
            .collect())
    }
}
