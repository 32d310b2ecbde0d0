//! The outcome of routing one invocation through the policy.

use ferrocode_core::{ErrorCategory, Message, ToolInvocation, ToolOutput};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "category")]
pub enum ExecutionStatus {
    Success,
    /// The registry ran (or refused) the tool and reported an error.
    Failed(ErrorCategory),
    /// Refused by safe mode.
    Denied,
    /// Declined by the user, or never started because the turn was cancelled.
    Skipped,
    /// Malformed call markup; nothing was executed.
    ParseError,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed(_) => "failed",
            Self::Denied => "denied",
            Self::Skipped => "skipped",
            Self::ParseError => "parse_error",
        }
    }

    /// True when the registry actually ran the tool.
    pub fn executed(&self) -> bool {
        matches!(self, Self::Success | Self::Failed(_))
    }
}

/// One invocation's result, ready to become a tool-result message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    pub call_id: String,
    pub tool_name: String,
    pub status: ExecutionStatus,
    pub content: String,
}

impl ToolExecution {
    pub fn from_output(invocation: &ToolInvocation, output: ToolOutput) -> Self {
        let (status, content) = if output.ok {
            (ExecutionStatus::Success, output.content)
        } else {
            (
                ExecutionStatus::Failed(output.error_category),
                format!("Error ({}): {}", output.error_category, output.content),
            )
        };
        Self::with(invocation, status, content)
    }

    pub fn parse_error(invocation: &ToolInvocation) -> Self {
        let reason = invocation.parse_error.as_deref().unwrap_or("malformed tool call");
        Self::with(
            invocation,
            ExecutionStatus::ParseError,
            format!(
                "Error: could not parse {} tool call: {reason}. Fix the markup and try again.",
                invocation.source_format
            ),
        )
    }

    pub fn denied(invocation: &ToolInvocation) -> Self {
        Self::with(
            invocation,
            ExecutionStatus::Denied,
            format!(
                "Denied: tool '{}' is disabled while safe mode is active.",
                invocation.name
            ),
        )
    }

    pub fn declined(invocation: &ToolInvocation) -> Self {
        Self::with(
            invocation,
            ExecutionStatus::Skipped,
            format!("Skipped: the user declined to run '{}'.", invocation.name),
        )
    }

    pub fn cancelled(invocation: &ToolInvocation) -> Self {
        Self::with(
            invocation,
            ExecutionStatus::Skipped,
            format!(
                "Skipped: the turn was cancelled before '{}' ran.",
                invocation.name
            ),
        )
    }

    /// Not run because a denial earlier in the same batch stopped it.
    pub fn batch_stopped(invocation: &ToolInvocation) -> Self {
        Self::with(
            invocation,
            ExecutionStatus::Skipped,
            format!(
                "Skipped: '{}' was not run because another call in this batch was denied.",
                invocation.name
            ),
        )
    }

    fn with(invocation: &ToolInvocation, status: ExecutionStatus, content: String) -> Self {
        Self {
            call_id: invocation.id.clone(),
            tool_name: invocation.name.clone(),
            status,
            content,
        }
    }

    /// The tool-result message appended to the conversation.
    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.call_id, &self.tool_name, &self.content)
    }
}
