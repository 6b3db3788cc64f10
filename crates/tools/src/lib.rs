//! Built-in tool implementations for RelayClaw.
//!
//! Tools give the agent the ability to interact with the machine it runs
//! on and the web: tell the time, work with files, run shell commands and
//! read pages.

pub mod browser;
pub mod clock;
pub mod file_list;
pub mod file_read;
pub mod file_write;
pub mod path_guard;
pub mod shell;

pub use browser::BrowserOpenTool;
pub use clock::ClockTool;
pub use file_list::FileListTool;
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use path_guard::{PathGuard, PathGuardError};
pub use shell::ShellRunTool;

use relayclaw_config::ToolsConfig;
use relayclaw_core::error::ToolError;
use relayclaw_core::tool::ToolRegistry;

/// Create a registry with the built-in tools enabled in `config`.
///
/// `shell_env` holds `KEY=VALUE` pairs contributed by skills.
pub fn builtin_registry(
    config: &ToolsConfig,
    shell_env: Vec<(String, String)>,
) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ClockTool))?;

    if config.file_enabled {
        let guard = PathGuard::new(config.allowed_roots.clone(), config.forbidden_paths.clone());
        registry.register(Box::new(FileReadTool::new(guard.clone())))?;
        registry.register(Box::new(FileListTool::new(guard.clone())))?;
        registry.register(Box::new(FileWriteTool::new(guard)))?;
    }

    if config.browser_enabled {
        registry.register(Box::new(BrowserOpenTool::new()))?;
    }

    if config.shell_enabled {
        registry.register(Box::new(
            ShellRunTool::new(config.allowed_commands.clone()).with_env(shell_env),
        ))?;
    }

    Ok(registry)
}

/// Fetch a required string argument.
pub(crate) fn string_arg<'a>(
    arguments: &'a serde_json::Value,
    name: &str,
) -> Result<&'a str, ToolError> {
    arguments[name]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{name}' argument")))
}

pub(crate) fn permission_denied(tool_name: &str, e: PathGuardError) -> ToolError {
    ToolError::PermissionDenied {
        tool_name: tool_name.into(),
        reason: e.to_string(),
    }
}
