//! The execution policy: the single place that decides whether a tool call
//! runs, asks first, or is refused.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use ferrocode_core::{
    ConfirmDecision, ConfirmationRequest, InteractionSink, PermissionCategory, ToolDescriptor,
    ToolInvocation, ToolRegistry,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audit::{Decision, DecisionAudit};
use crate::diff::preview_write;
use crate::execution::ToolExecution;
use crate::grants::PermissionGrants;

/// Whether a call needs a human in the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Auto,
    Confirm,
}

/// How the engine should schedule a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Runs without asking; may run concurrently with other auto calls.
    Auto,
    /// Needs confirmation; runs sequentially.
    Confirm,
    /// Refused outright; never reaches the registry.
    Deny,
}

pub struct ExecutionPolicy {
    registry: Arc<dyn ToolRegistry>,
    grants: PermissionGrants,
    safe_mode: AtomicBool,
    audit: DecisionAudit,
}

impl ExecutionPolicy {
    pub fn new(registry: Arc<dyn ToolRegistry>, grants: PermissionGrants) -> Self {
        Self {
            registry,
            grants,
            safe_mode: AtomicBool::new(false),
            audit: DecisionAudit::default(),
        }
    }

    pub fn with_safe_mode(self, enabled: bool) -> Self {
        self.safe_mode.store(enabled, Ordering::Relaxed);
        self
    }

    pub fn with_audit(mut self, audit: DecisionAudit) -> Self {
        self.audit = audit;
        self
    }

    pub fn safe_mode(&self) -> bool {
        self.safe_mode.load(Ordering::Relaxed)
    }

    /// Toggle safe mode between turns.
    pub fn set_safe_mode(&self, enabled: bool) {
        self.safe_mode.store(enabled, Ordering::Relaxed);
        info!(enabled, "Safe mode changed");
    }

    pub fn grants(&self) -> &PermissionGrants {
        &self.grants
    }

    pub fn audit(&self) -> &DecisionAudit {
        &self.audit
    }

    pub fn registry(&self) -> &Arc<dyn ToolRegistry> {
        &self.registry
    }

    /// Descriptors of every registered tool.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.registry.descriptors()
    }

    /// `Auto` when the tool's category is granted. Unknown tools are `Auto`
    /// too: the registry rejects them without side effects.
    pub fn get_requirement(&self, tool_name: &str) -> Requirement {
        match self.registry.descriptor(tool_name) {
            Some(d) if !self.grants.is_granted(d.category) => Requirement::Confirm,
            _ => Requirement::Auto,
        }
    }

    /// True if the tool is flagged unsafe and safe mode is on, regardless
    /// of grants.
    pub fn check_denied(&self, tool_name: &str, safe_mode: bool) -> bool {
        safe_mode
            && self
                .registry
                .descriptor(tool_name)
                .is_some_and(|d| d.unsafe_tool)
    }

    /// Scheduling class for an invocation under the current grants and
    /// safe-mode setting. Parse failures are `Auto`: they resolve to an
    /// error result without executing anything.
    pub fn classify(&self, invocation: &ToolInvocation) -> Disposition {
        if invocation.is_parse_error() {
            return Disposition::Auto;
        }
        if self.check_denied(&invocation.name, self.safe_mode()) {
            return Disposition::Deny;
        }
        match self.get_requirement(&invocation.name) {
            Requirement::Auto => Disposition::Auto,
            Requirement::Confirm => Disposition::Confirm,
        }
    }

    /// Route one invocation: deny, confirm, or delegate to the registry.
    /// Every lifecycle notification goes through `sink`.
    ///
    /// `cancel` only interrupts a pending confirmation. Once the registry
    /// has the call it runs to completion.
    pub async fn execute(
        &self,
        invocation: &ToolInvocation,
        sink: &dyn InteractionSink,
        cancel: &CancellationToken,
    ) -> ToolExecution {
        if invocation.is_parse_error() {
            warn!(
                tool = %invocation.name,
                format = %invocation.source_format,
                error = invocation.parse_error.as_deref().unwrap_or_default(),
                "Malformed tool call"
            );
            let execution = ToolExecution::parse_error(invocation);
            sink.on_tool_result(&execution.content);
            return execution;
        }

        let descriptor = self.registry.descriptor(&invocation.name);
        let category = descriptor.as_ref().map(|d| d.category);
        sink.on_tool_call(&invocation.name, &invocation.arguments);

        if self.check_denied(&invocation.name, self.safe_mode()) {
            self.audit
                .log(&invocation.id, &invocation.name, category, Decision::Denied);
            sink.on_tool_skipped();
            return ToolExecution::denied(invocation);
        }

        match (self.get_requirement(&invocation.name), category) {
            (Requirement::Confirm, Some(category)) => {
                let decision = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    decision = self.confirm(invocation, category, sink) => Some(decision),
                };
                let Some(decision) = decision else {
                    debug!(tool = %invocation.name, "Confirmation abandoned on cancel");
                    self.audit.log(
                        &invocation.id,
                        &invocation.name,
                        Some(category),
                        Decision::Declined,
                    );
                    sink.on_tool_skipped();
                    return ToolExecution::cancelled(invocation);
                };
                if !decision.is_approved() {
                    self.audit.log(
                        &invocation.id,
                        &invocation.name,
                        Some(category),
                        Decision::Declined,
                    );
                    sink.on_tool_skipped();
                    return ToolExecution::declined(invocation);
                }
                if decision == ConfirmDecision::ApproveAlways {
                    self.grants.grant(category);
                }
                self.audit.log(
                    &invocation.id,
                    &invocation.name,
                    Some(category),
                    Decision::Confirmed,
                );
            }
            _ => {
                self.audit
                    .log(&invocation.id, &invocation.name, category, Decision::Auto);
            }
        }

        let started = Instant::now();
        let output = self
            .registry
            .execute(&invocation.name, &invocation.arguments)
            .await;
        debug!(
            tool = %invocation.name,
            ok = output.ok,
            duration_ms = started.elapsed().as_millis() as u64,
            "Tool finished"
        );

        let execution = ToolExecution::from_output(invocation, output);
        sink.on_tool_result(&execution.content);
        execution
    }

    async fn confirm(
        &self,
        invocation: &ToolInvocation,
        category: PermissionCategory,
        sink: &dyn InteractionSink,
    ) -> ConfirmDecision {
        let diff = if category == PermissionCategory::Write {
            match self
                .registry
                .proposed_write(&invocation.name, &invocation.arguments)
                .await
            {
                Some(proposed) => Some(preview_write(proposed).await),
                None => None,
            }
        } else {
            None
        };

        sink.request_confirmation(ConfirmationRequest {
            call_id: invocation.id.clone(),
            tool_name: invocation.name.clone(),
            arguments: invocation.arguments.clone(),
            category,
            diff,
        })
        .await
    }
}

impl std::fmt::Debug for ExecutionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPolicy")
            .field("grants", &self.grants.snapshot())
            .field("safe_mode", &self.safe_mode())
            .field("audit", &self.audit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionStatus;
    use async_trait::async_trait;
    use ferrocode_core::{
        ErrorCategory, ProposedWrite, SourceFormat, ToolOutput, tool::validate_arguments,
    };
    use serde_json::{Map, Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    struct RecordingRegistry {
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl RecordingRegistry {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn descriptor(name: &str, category: PermissionCategory, unsafe_tool: bool) -> ToolDescriptor {
        ToolDescriptor {
            name: name.into(),
            description: String::new(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            }),
            category,
            unsafe_tool,
        }
    }

    #[async_trait]
    impl ToolRegistry for RecordingRegistry {
        fn descriptors(&self) -> Vec<ToolDescriptor> {
            vec![
                descriptor("read_file", PermissionCategory::Read, false),
                descriptor("write_file", PermissionCategory::Write, false),
                descriptor("run_shell", PermissionCategory::Execute, true),
            ]
        }

        async fn execute(&self, name: &str, arguments: &Map<String, Value>) -> ToolOutput {
            let Some(d) = self.descriptor(name) else {
                return ToolOutput::failure(ErrorCategory::Validation, format!("unknown tool '{name}'"));
            };
            if let Err(e) = validate_arguments(&d, arguments) {
                return e.into();
            }
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), Value::Object(arguments.clone())));
            ToolOutput::success(format!("ran {name}"))
        }

        async fn proposed_write(
            &self,
            _name: &str,
            arguments: &Map<String, Value>,
        ) -> Option<ProposedWrite> {
            let path = arguments.get("path")?.as_str()?.to_string();
            Some(ProposedWrite {
                display_path: path.clone(),
                path,
                new_content: "new\n".into(),
            })
        }
    }

    #[derive(Default)]
    struct ScriptedSink {
        decision: Option<ConfirmDecision>,
        confirmations: AtomicUsize,
        last_request: Mutex<Option<ConfirmationRequest>>,
        events: Mutex<Vec<String>>,
    }

    impl ScriptedSink {
        fn answering(decision: ConfirmDecision) -> Self {
            Self {
                decision: Some(decision),
                ..Default::default()
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl InteractionSink for ScriptedSink {
        fn on_tool_call(&self, name: &str, _arguments: &Map<String, Value>) {
            self.events.lock().unwrap().push(format!("call:{name}"));
        }
        fn on_tool_result(&self, _text: &str) {
            self.events.lock().unwrap().push("result".into());
        }
        fn on_tool_skipped(&self) {
            self.events.lock().unwrap().push("skipped".into());
        }
        fn on_assistant_content(&self, _text: &str) {}
        fn on_thinking_content(&self, _text: &str) {}
        async fn request_confirmation(&self, request: ConfirmationRequest) -> ConfirmDecision {
            self.confirmations.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request);
            self.decision.unwrap_or(ConfirmDecision::Decline)
        }
    }

    fn call(name: &str, args: Value) -> ToolInvocation {
        let Value::Object(map) = args else { panic!("object expected") };
        ToolInvocation::new("call_1", name, map, SourceFormat::Native)
    }

    #[tokio::test]
    async fn granted_category_never_confirms() {
        let registry = RecordingRegistry::new();
        let policy = ExecutionPolicy::new(registry.clone(), PermissionGrants::read_only());
        let sink = ScriptedSink::default();

        let exec = policy
            .execute(&call("read_file", json!({"path": "a.txt"})), &sink, &CancellationToken::new())
            .await;

        assert_eq!(exec.status, ExecutionStatus::Success);
        assert_eq!(sink.confirmations.load(Ordering::SeqCst), 0);
        assert_eq!(registry.calls(), vec![("read_file".into(), json!({"path": "a.txt"}))]);
        assert_eq!(sink.events(), vec!["call:read_file", "result"]);
    }

    #[tokio::test]
    async fn unsafe_tool_in_safe_mode_never_reaches_registry() {
        let registry = RecordingRegistry::new();
        let grants = PermissionGrants::new([PermissionCategory::Execute]);
        let policy = ExecutionPolicy::new(registry.clone(), grants).with_safe_mode(true);
        let sink = ScriptedSink::answering(ConfirmDecision::Approve);
        let invocation = call("run_shell", json!({"path": "ls"}));

        assert_eq!(policy.classify(&invocation), Disposition::Deny);
        let exec = policy.execute(&invocation, &sink, &CancellationToken::new()).await;

        assert_eq!(exec.status, ExecutionStatus::Denied);
        assert!(registry.calls().is_empty());
        assert_eq!(sink.confirmations.load(Ordering::SeqCst), 0);
        assert_eq!(policy.audit().entries_with(Decision::Denied).len(), 1);
    }

    #[tokio::test]
    async fn declined_write_is_skipped_with_diff_preview() {
        let registry = RecordingRegistry::new();
        let policy = ExecutionPolicy::new(registry.clone(), PermissionGrants::read_only());
        let sink = ScriptedSink::answering(ConfirmDecision::Decline);

        let exec = policy
            .execute(&call("write_file", json!({"path": "/nonexistent/out.txt"})), &sink, &CancellationToken::new())
            .await;

        assert_eq!(exec.status, ExecutionStatus::Skipped);
        assert!(registry.calls().is_empty());
        assert_eq!(sink.events(), vec!["call:write_file", "skipped"]);
        let request = sink.last_request.lock().unwrap().clone().unwrap();
        let diff = request.diff.unwrap();
        assert!(!diff.existed);
        assert!(diff.unified_diff.contains("+new"));
    }

    #[tokio::test]
    async fn approve_always_grants_the_category() {
        let registry = RecordingRegistry::new();
        let policy = ExecutionPolicy::new(registry.clone(), PermissionGrants::read_only());
        let sink = ScriptedSink::answering(ConfirmDecision::ApproveAlways);
        let invocation = call("write_file", json!({"path": "/nonexistent/out.txt"}));

        assert_eq!(policy.classify(&invocation), Disposition::Confirm);
        let exec = policy.execute(&invocation, &sink, &CancellationToken::new()).await;
        assert_eq!(exec.status, ExecutionStatus::Success);
        assert_eq!(policy.classify(&invocation), Disposition::Auto);

        policy.execute(&invocation, &sink, &CancellationToken::new()).await;
        assert_eq!(sink.confirmations.load(Ordering::SeqCst), 1);
        assert_eq!(registry.calls().len(), 2);
    }

    #[tokio::test]
    async fn parse_error_is_reported_not_executed() {
        let registry = RecordingRegistry::new();
        let policy = ExecutionPolicy::new(registry.clone(), PermissionGrants::read_only());
        let sink = ScriptedSink::default();
        let bad = ToolInvocation::parse_failure("write_file", SourceFormat::Standard, "unterminated");

        assert_eq!(policy.classify(&bad), Disposition::Auto);
        let exec = policy.execute(&bad, &sink, &CancellationToken::new()).await;

        assert_eq!(exec.status, ExecutionStatus::ParseError);
        assert!(registry.calls().is_empty());
        assert_eq!(sink.events(), vec!["result"]);
    }

    #[tokio::test]
    async fn unknown_tool_is_validation_failure() {
        let registry = RecordingRegistry::new();
        let policy = ExecutionPolicy::new(registry.clone(), PermissionGrants::default());
        let sink = ScriptedSink::default();

        assert_eq!(policy.get_requirement("frobnicate"), Requirement::Auto);
        let exec = policy.execute(&call("frobnicate", json!({})), &sink, &CancellationToken::new()).await;
        assert_eq!(exec.status, ExecutionStatus::Failed(ErrorCategory::Validation));
        assert_eq!(sink.confirmations.load(Ordering::SeqCst), 0);
    }

    struct SilentSink;

    #[async_trait]
    impl InteractionSink for SilentSink {
        fn on_tool_call(&self, _name: &str, _arguments: &Map<String, Value>) {}
        fn on_tool_result(&self, _text: &str) {}
        fn on_tool_skipped(&self) {}
        fn on_assistant_content(&self, _text: &str) {}
        fn on_thinking_content(&self, _text: &str) {}
        async fn request_confirmation(&self, _request: ConfirmationRequest) -> ConfirmDecision {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn cancel_abandons_an_unanswered_confirmation() {
        let registry = RecordingRegistry::new();
        let policy = ExecutionPolicy::new(registry.clone(), PermissionGrants::read_only());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let exec = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            policy.execute(&call("write_file", json!({"path": "/nonexistent/a.txt"})), &SilentSink, &cancel),
        )
        .await
        .expect("confirmation should be abandoned");

        assert_eq!(exec.status, ExecutionStatus::Skipped);
        assert!(exec.content.contains("cancelled"));
        assert!(registry.calls().is_empty());
        assert_eq!(policy.audit().entries_with(Decision::Declined).len(), 1);
    }

    #[test]
    fn check_denied_ignores_grants() {
        let registry = RecordingRegistry::new();
        let policy = ExecutionPolicy::new(
            registry,
            PermissionGrants::new([PermissionCategory::Execute]),
        );
        assert!(policy.check_denied("run_shell", true));
        assert!(!policy.check_denied("run_shell", false));
        assert!(!policy.check_denied("write_file", true));
    }
}
