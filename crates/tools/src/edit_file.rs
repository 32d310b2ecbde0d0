//! `edit_file`: replace one exact occurrence of a text fragment.

use async_trait::async_trait;
use ferrocode_core::{PermissionCategory, ProposedWrite, Tool, ToolError};
use ferrocode_policy::WorkspaceSandbox;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::args::{io_failure, required_str, sandboxed};

const NAME: &str = "edit_file";

pub struct EditFileTool {
    sandbox: WorkspaceSandbox,
}

impl EditFileTool {
    pub fn new(sandbox: WorkspaceSandbox) -> Self {
        Self { sandbox }
    }
}

/// `original` with the single occurrence of `old_text` replaced.
pub(crate) fn apply_edit(original: &str, old_text: &str, new_text: &str) -> Result<String, String> {
    if old_text.is_empty() {
        return Err("old_text must not be empty".into());
    }
    match original.matches(old_text).count() {
        0 => Err("old_text was not found in the file".into()),
        1 => Ok(original.replacen(old_text, new_text, 1)),
        n => Err(format!(
            "old_text occurs {n} times; include more surrounding context so it is unique"
        )),
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Edit a file in the workspace by replacing old_text, which must occur exactly once, with new_text."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file, relative to the workspace root"
                },
                "old_text": {
                    "type": "string",
                    "description": "Exact text to replace"
                },
                "new_text": {
                    "type": "string",
                    "description": "Replacement text"
                }
            },
            "required": ["path", "old_text", "new_text"]
        })
    }

    fn category(&self) -> PermissionCategory {
        PermissionCategory::Write
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let requested = required_str(NAME, arguments, "path")?;
        let old_text = required_str(NAME, arguments, "old_text")?;
        let new_text = required_str(NAME, arguments, "new_text")?;
        let path = sandboxed(NAME, &self.sandbox, requested)?;

        let original = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_failure(NAME, "read", requested, e))?;
        let updated = apply_edit(&original, old_text, new_text).map_err(|reason| {
            ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason,
            }
        })?;
        tokio::fs::write(&path, &updated)
            .await
            .map_err(|e| io_failure(NAME, "write", requested, e))?;

        debug!(path = %path.display(), "File edited");
        Ok(format!("Edited {}", self.sandbox.display(&path)))
    }

    async fn proposed_write(&self, arguments: &Map<String, Value>) -> Option<ProposedWrite> {
        let requested = arguments.get("path")?.as_str()?;
        let old_text = arguments.get("old_text")?.as_str()?;
        let new_text = arguments.get("new_text")?.as_str()?;
        let path = self.sandbox.resolve(requested).ok()?;
        let original = tokio::fs::read_to_string(&path).await.ok()?;
        let new_content = apply_edit(&original, old_text, new_text).ok()?;
        Some(ProposedWrite {
            path: path.to_string_lossy().into_owned(),
            display_path: self.sandbox.display(&path),
            new_content,
        })
    }
}
