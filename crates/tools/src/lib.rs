//! Built-in workspace tools for ferrocode.
//!
//! File tools resolve every path through a [`WorkspaceSandbox`], so the agent
//! can only read and write below the workspace root. `run_shell` is flagged
//! unsafe and therefore denied while safe mode is on.

mod args;
pub mod edit_file;
pub mod list_directory;
pub mod read_file;
pub mod shell;
pub mod write_file;

use std::path::PathBuf;
use std::sync::Arc;

use ferrocode_core::ToolSet;
use ferrocode_policy::WorkspaceSandbox;

pub use edit_file::EditFileTool;
pub use list_directory::ListDirectoryTool;
pub use read_file::ReadFileTool;
pub use shell::ShellTool;
pub use write_file::WriteFileTool;

/// The registry of built-in tools scoped to `workspace_root`.
pub fn default_registry(workspace_root: impl Into<PathBuf>, shell_timeout_secs: u64) -> ToolSet {
    let sandbox = WorkspaceSandbox::new(workspace_root);
    let mut registry = ToolSet::new();
    registry.register(Arc::new(ReadFileTool::new(sandbox.clone())));
    registry.register(Arc::new(WriteFileTool::new(sandbox.clone())));
    registry.register(Arc::new(EditFileTool::new(sandbox.clone())));
    registry.register(Arc::new(ListDirectoryTool::new(sandbox.clone())));
    registry.register(Arc::new(ShellTool::new(
        sandbox.root().to_path_buf(),
        shell_timeout_secs,
    )));
    registry
}
