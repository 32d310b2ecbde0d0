//! `write_file`: create or overwrite a file inside the workspace.

use async_trait::async_trait;
use ferrocode_core::{PermissionCategory, ProposedWrite, Tool, ToolError};
use ferrocode_policy::WorkspaceSandbox;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::args::{io_failure, required_str, sandboxed};

const NAME: &str = "write_file";

pub struct WriteFileTool {
    sandbox: WorkspaceSandbox,
}

impl WriteFileTool {
    pub fn new(sandbox: WorkspaceSandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Write content to a file in the workspace. Creates the file (and missing parent directories) if needed, overwrites it otherwise."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file, relative to the workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "The complete new file content"
                }
            },
            "required": ["path", "content"]
        })
    }

    fn category(&self) -> PermissionCategory {
        PermissionCategory::Write
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let requested = required_str(NAME, arguments, "path")?;
        let content = required_str(NAME, arguments, "content")?;
        let path = sandboxed(NAME, &self.sandbox, requested)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_failure(NAME, "create parent directories for", requested, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_failure(NAME, "write", requested, e))?;

        debug!(path = %path.display(), bytes = content.len(), "File written");
        Ok(format!(
            "Wrote {} bytes to {}",
            content.len(),
            self.sandbox.display(&path)
        ))
    }

    async fn proposed_write(&self, arguments: &Map<String, Value>) -> Option<ProposedWrite> {
        let requested = arguments.get("path")?.as_str()?;
        let content = arguments.get("content")?.as_str()?;
        let path = self.sandbox.resolve(requested).ok()?;
        Some(ProposedWrite {
            path: path.to_string_lossy().into_owned(),
            display_path: self.sandbox.display(&path),
            new_content: content.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn writes_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(WorkspaceSandbox::new(dir.path()));

        let out = tool
            .execute(&args(json!({"path": "src/new.rs", "content": "fn main() {}\n"})))
            .await
            .unwrap();
        assert!(out.contains("13 bytes"));
        assert!(out.contains("src/new.rs"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/new.rs")).unwrap(),
            "fn main() {}\n"
        );
    }

    #[tokio::test]
    async fn proposed_write_reports_resolved_and_display_paths() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = WorkspaceSandbox::new(dir.path());
        let root = sandbox.root().to_path_buf();
        let tool = WriteFileTool::new(sandbox);

        let proposed = tool
            .proposed_write(&args(json!({"path": "b.txt", "content": "new"})))
            .await
            .unwrap();
        assert_eq!(proposed.display_path, "b.txt");
        assert_eq!(proposed.path, root.join("b.txt").to_string_lossy());
        assert_eq!(proposed.new_content, "new");
        // Nothing is written by proposing.
        assert!(!dir.path().join("b.txt").exists());
    }

    #[tokio::test]
    async fn refuses_paths_outside_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(WorkspaceSandbox::new(dir.path()));
        let a = args(json!({"path": "../../evil.txt", "content": "x"}));

        assert!(tool.proposed_write(&a).await.is_none());
        assert!(matches!(
            tool.execute(&a).await.unwrap_err(),
            ToolError::PermissionDenied { .. }
        ));
    }
}
