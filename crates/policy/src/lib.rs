//! Execution policy for ferrocode.
//!
//! Provides:
//! - **Policy**: the single authority deciding auto-execute / confirm / deny
//! - **Grants**: live permission categories, changeable between turns
//! - **Diff previews**: old-vs-new content attached to write confirmations
//! - **Decision audit**: structured record of every decision
//! - **Sandbox**: workspace path validation for file tools

pub mod audit;
pub mod diff;
pub mod execution;
pub mod grants;
pub mod policy;
pub mod sandbox;

pub use audit::{AuditSink, Decision, DecisionAudit, DecisionEntry, TracingSink};
pub use diff::{build_preview, preview_write};
pub use execution::{ExecutionStatus, ToolExecution};
pub use grants::PermissionGrants;
pub use policy::{Disposition, ExecutionPolicy, Requirement};
pub use sandbox::{PathValidationError, WorkspaceSandbox, validate_path};
