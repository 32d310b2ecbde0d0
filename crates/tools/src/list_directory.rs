//! `list_directory`: one level of a workspace directory.

use async_trait::async_trait;
use ferrocode_core::{PermissionCategory, Tool, ToolError};
use ferrocode_policy::WorkspaceSandbox;
use serde_json::{Map, Value, json};

use crate::args::{io_failure, sandboxed};

const NAME: &str = "list_directory";

pub struct ListDirectoryTool {
    sandbox: WorkspaceSandbox,
}

impl ListDirectoryTool {
    pub fn new(sandbox: WorkspaceSandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "List the entries of a workspace directory. Directories are shown with a trailing '/'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory relative to the workspace root (default: the root)"
                }
            }
        })
    }

    fn category(&self) -> PermissionCategory {
        PermissionCategory::Read
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let requested = arguments
            .get("path")
            .and_then(Value::as_str)
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(".");
        let dir = if requested == "." {
            self.sandbox.root().to_path_buf()
        } else {
            sandboxed(NAME, &self.sandbox, requested)?
        };

        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| io_failure(NAME, "list", requested, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| io_failure(NAME, "list", requested, e))?
        {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                name.push('/');
            }
            entries.push(name);
        }

        if entries.is_empty() {
            return Ok("(empty directory)".into());
        }
        entries.sort();
        Ok(entries.join("\n"))
    }
}
