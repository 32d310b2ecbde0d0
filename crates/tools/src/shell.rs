//! `run_shell`: execute a command in the workspace root.
//!
//! Flagged unsafe, so safe mode denies it regardless of grants.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use ferrocode_core::{PermissionCategory, Tool, ToolError};
use serde_json::{Map, Value, json};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::args::required_str;

const NAME: &str = "run_shell";

pub struct ShellTool {
    working_dir: PathBuf,
    timeout_secs: u64,
}

impl ShellTool {
    pub fn new(working_dir: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            working_dir: working_dir.into(),
            timeout_secs,
        }
    }

    fn command(&self, line: &str) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", line]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", line]);
            c
        };
        cmd.current_dir(&self.working_dir).kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace root and return its stdout/stderr. Use for builds, tests, git, and searching files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    fn category(&self) -> PermissionCategory {
        PermissionCategory::Execute
    }

    fn is_unsafe(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let line = required_str(NAME, arguments, "command")?;
        debug!(command = %line, "Executing shell command");

        let run = self.command(line).output();
        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), run)
            .await
            .map_err(|_| {
                warn!(command = %line, timeout_secs = self.timeout_secs, "Command timed out");
                ToolError::Timeout {
                    tool_name: NAME.into(),
                    timeout_secs: self.timeout_secs,
                }
            })?
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            let text = if stderr.is_empty() {
                stdout.into_owned()
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            };
            return Ok(text.trim().to_string());
        }

        let code = output.status.code().unwrap_or(-1);
        warn!(command = %line, exit_code = code, "Command failed");
        Err(ToolError::ExecutionFailed {
            tool_name: NAME.into(),
            reason: format!("[exit code: {code}]\n{stdout}\n{stderr}")
                .trim()
                .to_string(),
        })
    }
}
