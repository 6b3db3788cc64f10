//! Shell tool: execute system commands.
//!
//! Supports command allowlisting and passes skill-provided environment
//! variables to the child process. The child is killed if the call is
//! dropped (timeout or shutdown).

use async_trait::async_trait;
use relayclaw_core::error::ToolError;
use relayclaw_core::schema::{ObjectSchema, SchemaType};
use relayclaw_core::tool::Tool;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::string_arg;

const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '`', '\n', '\r', '>', '<'];

/// Execute shell commands with safety constraints.
pub struct ShellRunTool {
    /// If non-empty, only these commands are allowed.
    allowed_commands: Vec<String>,
    /// Extra environment for every child process.
    env: Vec<(String, String)>,
}

impl ShellRunTool {
    pub fn new(allowed_commands: Vec<String>) -> Self {
        Self {
            allowed_commands,
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    /// With an allowlist set, the command must be a single invocation: no
    /// chaining, substitution, piping or redirection that `sh -c` would honour.
    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true;
        }
        if command.contains(SHELL_METACHARACTERS) || command.contains("$(") {
            return false;
        }

        let base_cmd = command.split_whitespace().next().unwrap_or("");
        self.allowed_commands.iter().any(|a| a == base_cmd)
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)))
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Tool for ShellRunTool {
    fn name(&self) -> &str {
        "shell_run"
    }

    fn description(&self) -> &str {
        "Run a shell command and return the output. Use with caution."
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new().required_property("command", SchemaType::string("The command to run"))
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let command = string_arg(&arguments, "command")?;

        if !self.is_command_allowed(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: self.name().into(),
                reason: format!(
                    "Command '{}' not in allowlist or uses shell operators",
                    command.split_whitespace().next().unwrap_or("")
                ),
            });
        }

        debug!(command = %command, "Executing shell command");

        let output = self
            .command(command)
            .output()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("command exited with code {code}, output: {}", combined.trim()),
            });
        }

        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_check() {
        let tool = ShellRunTool::new(vec!["ls".into(), "cat".into(), "git".into()]);
        assert!(tool.is_command_allowed("ls -la"));
        assert!(tool.is_command_allowed("git status"));
        assert!(!tool.is_command_allowed("rm -rf /"));
        assert!(!tool.is_command_allowed("sudo something"));
    }

    #[test]
    fn allowlist_rejects_chained_commands() {
        let tool = ShellRunTool::new(vec!["echo".into()]);
        assert!(tool.is_command_allowed("echo ok"));
        for command in [
            "echo ok; id -un",
            "echo ok && id",
            "echo ok | sh",
            "echo `id`",
            "echo $(id)",
            "echo ok\nid",
            "echo ok > /etc/passwd",
            "echo < /etc/shadow",
        ] {
            assert!(!tool.is_command_allowed(command), "{command:?} should be rejected");
        }
    }

    #[tokio::test]
    async fn chained_command_is_denied_before_running() {
        let result = ShellRunTool::new(vec!["echo".into()])
            .execute(serde_json::json!({"command": "echo ok; id -un"}))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }

    #[test]
    fn empty_allowlist_allows_all() {
        let tool = ShellRunTool::new(vec![]);
        assert!(tool.is_command_allowed("anything goes"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_echo() {
        let out = ShellRunTool::new(vec![])
            .execute(serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn skill_env_reaches_child() {
        let tool = ShellRunTool::new(vec![])
            .with_env(vec![("SMTP_HOST".into(), "mail.example.com".into())]);
        let out = tool
            .execute(serde_json::json!({"command": "echo $SMTP_HOST"}))
            .await
            .unwrap();
        assert_eq!(out.trim(), "mail.example.com");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_output() {
        let err = ShellRunTool::new(vec![])
            .execute(serde_json::json!({"command": "echo oops >&2; exit 3"}))
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("code 3"));
        assert!(text.contains("oops"));
    }

    #[tokio::test]
    async fn blocked_command() {
        let result = ShellRunTool::new(vec!["ls".into()])
            .execute(serde_json::json!({"command": "rm -rf /"}))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }
}
