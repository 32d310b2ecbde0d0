//! Interaction sink: how the runtime reports lifecycle events and asks
//! for confirmation without depending on any UI code.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tool::PermissionCategory;

/// Old-vs-new content for a write that awaits confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffPreview {
    pub path: String,
    pub old_content: String,
    pub new_content: String,
    /// Unified diff of `old_content` → `new_content`.
    pub unified_diff: String,
    /// False when the file did not exist before.
    pub existed: bool,
}

/// Everything a front-end needs to render a confirmation prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
    pub category: PermissionCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffPreview>,
}

/// The user's answer to a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmDecision {
    /// Run this call only.
    Approve,
    /// Run this call and grant its permission category for the session.
    ApproveAlways,
    Decline,
}

impl ConfirmDecision {
    pub fn is_approved(&self) -> bool {
        !matches!(self, Self::Decline)
    }
}

/// Adapter-supplied callbacks. Only `request_confirmation` may suspend.
#[async_trait]
pub trait InteractionSink: Send + Sync {
    fn on_tool_call(&self, name: &str, arguments: &Map<String, Value>);

    fn on_tool_result(&self, text: &str);

    fn on_tool_skipped(&self);

    fn on_assistant_content(&self, text: &str);

    fn on_thinking_content(&self, text: &str);

    async fn request_confirmation(&self, request: ConfirmationRequest) -> ConfirmDecision;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_decline_is_not_approved() {
        assert!(ConfirmDecision::Approve.is_approved());
        assert!(ConfirmDecision::ApproveAlways.is_approved());
        assert!(!ConfirmDecision::Decline.is_approved());
    }
}
