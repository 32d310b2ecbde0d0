//! The four seams a front-end plugs into the engine.

use std::sync::Arc;

use async_trait::async_trait;
use ferrocode_core::{
    InteractionSink, ModelRequest, ModelResponse, ModelTransport, ProviderError, ToolInvocation,
};
use ferrocode_parser::ParsedResponse;
use ferrocode_policy::{ExecutionPolicy, ToolExecution};
use tokio_util::sync::CancellationToken;

/// What to do after a call was denied by safe mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenyAction {
    /// Skip every call of the batch that has not run yet.
    pub stop_batch: bool,
    /// Appended as a user message after the batch's results.
    pub injected_text: Option<String>,
}

/// Front-end specific behavior. The orchestration loop (iteration
/// counting, checkpoint evaluation, result ordering) lives in the engine and
/// is the same for every implementation.
#[async_trait]
pub trait EngineHooks: Send + Sync {
    async fn call_model(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError>;

    /// Run one invocation through the execution policy. `cancel` may cut a
    /// pending confirmation short but never a running tool.
    async fn execute_one_tool(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationToken,
    ) -> ToolExecution;

    /// Called once per model response with the raw text and its parsed form.
    fn on_response_content(&self, _raw: &str, _parsed: &ParsedResponse) {}

    fn on_deny(&self, _invocation: &ToolInvocation) -> DenyAction {
        DenyAction::default()
    }
}

/// Transport, policy and interaction sink wired together. Both front-ends
/// use this; the chat UI wraps it to change `on_deny`.
pub struct StandardHooks {
    transport: Arc<dyn ModelTransport>,
    policy: Arc<ExecutionPolicy>,
    sink: Arc<dyn InteractionSink>,
}

impl StandardHooks {
    pub fn new(
        transport: Arc<dyn ModelTransport>,
        policy: Arc<ExecutionPolicy>,
        sink: Arc<dyn InteractionSink>,
    ) -> Self {
        Self {
            transport,
            policy,
            sink,
        }
    }

    pub fn policy(&self) -> &Arc<ExecutionPolicy> {
        &self.policy
    }

    pub fn sink(&self) -> &Arc<dyn InteractionSink> {
        &self.sink
    }
}

#[async_trait]
impl EngineHooks for StandardHooks {
    async fn call_model(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        self.transport.call(request).await
    }

    async fn execute_one_tool(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationToken,
    ) -> ToolExecution {
        self.policy
            .execute(invocation, self.sink.as_ref(), cancel)
            .await
    }

    fn on_response_content(&self, _raw: &str, parsed: &ParsedResponse) {
        for block in &parsed.thinking {
            self.sink.on_thinking_content(block);
        }
        if !parsed.display_text.is_empty() {
            self.sink.on_assistant_content(&parsed.display_text);
        }
    }
}
