//! Workspace sandbox: file tools may only touch paths under the workspace
//! root, and never the forbidden locations below it or elsewhere.

use std::path::{Component, Path, PathBuf};

/// Error returned when a path fails the sandbox check.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathValidationError {
    #[error("Path '{path}' is outside the workspace")]
    OutsideWorkspace { path: String },

    #[error("Path '{path}' matches forbidden pattern '{pattern}'")]
    ForbiddenPath { path: String, pattern: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Failed to resolve path '{path}': {reason}")]
    ResolveFailed { path: String, reason: String },
}

/// Locations that are refused even when they sit under the workspace.
pub const DEFAULT_FORBIDDEN: &[&str] = &["~/.ssh", "~/.gnupg", "~/.aws", "/etc", "/proc", "/sys"];

#[derive(Debug, Clone)]
pub struct WorkspaceSandbox {
    root: PathBuf,
    forbidden: Vec<String>,
}

impl WorkspaceSandbox {
    /// Sandbox rooted at `root` (canonicalized when it exists).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self {
            root,
            forbidden: DEFAULT_FORBIDDEN.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_forbidden(mut self, forbidden: Vec<String>) -> Self {
        self.forbidden = forbidden;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool-supplied path (relative paths are taken from the
    /// workspace root) and check it against the sandbox.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathValidationError> {
        let candidate = Path::new(path);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        validate_path(&joined, std::slice::from_ref(&self.root), &self.forbidden)
            .map_err(|e| match e {
                PathValidationError::OutsideWorkspace { .. } => {
                    PathValidationError::OutsideWorkspace { path: path.into() }
                }
                other => other,
            })
    }

    /// `absolute` shown relative to the workspace root when possible.
    pub fn display(&self, absolute: &Path) -> String {
        absolute
            .strip_prefix(&self.root)
            .unwrap_or(absolute)
            .to_string_lossy()
            .into_owned()
    }
}

/// Validate that a path is safe to access.
///
/// `..` components are refused outright. The path is resolved through its
/// nearest existing ancestor so symlinks cannot escape the allowed roots,
/// then checked against the forbidden list and the roots (forbidden wins).
/// Returns the resolved path.
pub fn validate_path(
    path: &Path,
    allowed_roots: &[PathBuf],
    forbidden_paths: &[String],
) -> Result<PathBuf, PathValidationError> {
    let shown = path.to_string_lossy().into_owned();

    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(PathValidationError::PathTraversal { path: shown });
    }

    let resolved = resolve_existing_prefix(path).map_err(|reason| {
        PathValidationError::ResolveFailed {
            path: shown.clone(),
            reason,
        }
    })?;

    for pattern in forbidden_paths {
        let forbidden = PathBuf::from(expand_tilde(pattern));
        if resolved.starts_with(&forbidden) {
            return Err(PathValidationError::ForbiddenPath {
                path: shown,
                pattern: pattern.clone(),
            });
        }
    }

    if !allowed_roots.is_empty() && !allowed_roots.iter().any(|root| resolved.starts_with(root)) {
        return Err(PathValidationError::OutsideWorkspace { path: shown });
    }

    Ok(resolved)
}

/// Canonicalize the longest existing ancestor and re-append the rest, so
/// paths of files about to be created still resolve symlinks above them.
fn resolve_existing_prefix(path: &Path) -> Result<PathBuf, String> {
    let mut existing = path.to_path_buf();
    let mut tail = Vec::new();
    while !existing.exists() {
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                tail.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => return Ok(path.to_path_buf()),
        }
    }
    let mut resolved = existing.canonicalize().map_err(|e| e.to_string())?;
    for part in tail.into_iter().rev() {
        resolved.push(part);
    }
    Ok(resolved)
}

fn expand_tilde(path: &str) -> String {
    if (path.starts_with("~/") || path == "~")
        && let Ok(home) = std::env::var("HOME")
    {
        return path.replacen('~', &home, 1);
    }
    path.to_string()
}
