//! Argument helpers shared by the built-in tools.

use std::path::PathBuf;

use ferrocode_core::ToolError;
use ferrocode_policy::WorkspaceSandbox;
use serde_json::{Map, Value};

pub(crate) fn required_str<'a>(
    tool: &str,
    arguments: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("{tool}: missing '{key}' argument")))
}

pub(crate) fn optional_usize(
    tool: &str,
    arguments: &Map<String, Value>,
    key: &str,
) -> Result<Option<usize>, ToolError> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                ToolError::InvalidArguments(format!(
                    "{tool}: '{key}' must be a non-negative integer"
                ))
            }),
    }
}

/// Resolve `path` through the sandbox, reporting a refusal as a security
/// failure of `tool`.
pub(crate) fn sandboxed(
    tool: &str,
    sandbox: &WorkspaceSandbox,
    path: &str,
) -> Result<PathBuf, ToolError> {
    sandbox.resolve(path).map_err(|e| ToolError::PermissionDenied {
        tool_name: tool.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn io_failure(tool: &str, action: &str, shown: &str, e: std::io::Error) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool.to_string(),
        reason: format!("failed to {action} '{shown}': {e}"),
    }
}
