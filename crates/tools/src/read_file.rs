//! `read_file`: file contents from inside the workspace, optionally a
//! window of lines.

use async_trait::async_trait;
use ferrocode_core::{PermissionCategory, Tool, ToolError};
use ferrocode_policy::WorkspaceSandbox;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::args::{io_failure, optional_usize, required_str, sandboxed};

const NAME: &str = "read_file";

pub struct ReadFileTool {
    sandbox: WorkspaceSandbox,
}

impl ReadFileTool {
    pub fn new(sandbox: WorkspaceSandbox) -> Self {
        Self { sandbox }
    }
}

/// Lines `offset..offset + limit` (1-based offset) of `content`.
fn window(content: &str, offset: Option<usize>, limit: Option<usize>) -> String {
    if offset.is_none() && limit.is_none() {
        return content.to_string();
    }
    let skip = offset.unwrap_or(1).saturating_sub(1);
    let lines = content.lines().skip(skip);
    let selected: Vec<&str> = match limit {
        Some(limit) => lines.take(limit).collect(),
        None => lines.collect(),
    };
    selected.join("\n")
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Read a text file from the workspace. Use offset (1-based line) and limit to read part of a large file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file, relative to the workspace root"
                },
                "offset": {
                    "type": "integer",
                    "description": "First line to return (1-based)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return"
                }
            },
            "required": ["file_path"]
        })
    }

    fn category(&self) -> PermissionCategory {
        PermissionCategory::Read
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let requested = required_str(NAME, arguments, "file_path")?;
        let offset = optional_usize(NAME, arguments, "offset")?;
        let limit = optional_usize(NAME, arguments, "limit")?;
        let path = sandboxed(NAME, &self.sandbox, requested)?;

        debug!(path = %path.display(), "Reading file");
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_failure(NAME, "read", requested, e))?;
        Ok(window(&content, offset, limit))
    }
}
