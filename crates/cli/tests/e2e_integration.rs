//! End-to-end integration tests for the ferrocode runtime.
//!
//! These tests assemble the same stack the CLI does (built-in tools sandboxed
//! to a temporary workspace, execution policy, file-backed checkpoints) and
//! drive it with a scripted model transport.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ferrocode_agent::{AgentEngine, EngineConfig, EngineHooks, EngineState, StandardHooks};
use ferrocode_checkpoint::{
    CheckpointOrchestrator, CheckpointSettings, CheckpointStore, FileCheckpointStore,
};
use ferrocode_core::{
    ConfirmDecision, ConfirmationRequest, InteractionSink, ModelRequest, ModelResponse,
    ModelTransport, NativeToolCall, PermissionCategory, ProviderError, Role, Usage,
};
use ferrocode_policy::{ExecutionPolicy, PermissionGrants};
use ferrocode_tools::default_registry;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

// ── Mock transport ───────────────────────────────────────────────────────

/// A transport that returns scripted responses in sequence.
struct ScriptedTransport {
    responses: Mutex<VecDeque<ModelResponse>>,
    calls: Mutex<usize>,
}

impl ScriptedTransport {
    fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn call(&self, _request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedTransport exhausted: call #{}", *calls));
        Ok(response)
    }
}

fn text_response(text: &str) -> ModelResponse {
    ModelResponse {
        content: text.into(),
        tool_calls: None,
        usage: Usage { total_tokens: 15 },
    }
}

fn tool_response(calls: Vec<NativeToolCall>) -> ModelResponse {
    ModelResponse {
        content: String::new(),
        tool_calls: Some(calls),
        usage: Usage { total_tokens: 15 },
    }
}

fn make_tool_call(id: &str, name: &str, args: Value) -> NativeToolCall {
    NativeToolCall {
        id: id.into(),
        name: name.into(),
        // Providers send arguments JSON-encoded.
        arguments: Value::String(args.to_string()),
    }
}

// ── Mock sink ────────────────────────────────────────────────────────────

/// Answers every confirmation with the same decision and keeps what it saw.
struct RecordingSink {
    decision: ConfirmDecision,
    requests: Mutex<Vec<ConfirmationRequest>>,
    results: Mutex<Vec<String>>,
    assistant: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn new(decision: ConfirmDecision) -> Self {
        Self {
            decision,
            requests: Mutex::new(Vec::new()),
            results: Mutex::new(Vec::new()),
            assistant: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ConfirmationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InteractionSink for RecordingSink {
    fn on_tool_call(&self, _name: &str, _arguments: &Map<String, Value>) {}

    fn on_tool_result(&self, text: &str) {
        self.results.lock().unwrap().push(text.to_string());
    }

    fn on_tool_skipped(&self) {}

    fn on_assistant_content(&self, text: &str) {
        self.assistant.lock().unwrap().push(text.to_string());
    }

    fn on_thinking_content(&self, _text: &str) {}

    async fn request_confirmation(&self, request: ConfirmationRequest) -> ConfirmDecision {
        self.requests.lock().unwrap().push(request);
        self.decision
    }
}

// ── Stack assembly ───────────────────────────────────────────────────────

struct Stack {
    engine: AgentEngine,
    transport: Arc<ScriptedTransport>,
    sink: Arc<RecordingSink>,
}

struct StackOptions<'a> {
    workspace: &'a Path,
    grants: Vec<PermissionCategory>,
    safe_mode: bool,
    decision: ConfirmDecision,
    checkpoint: Option<(&'a Path, u32)>,
}

impl<'a> StackOptions<'a> {
    fn new(workspace: &'a Path) -> Self {
        Self {
            workspace,
            grants: vec![PermissionCategory::Read],
            safe_mode: false,
            decision: ConfirmDecision::Approve,
            checkpoint: None,
        }
    }
}

async fn stack(options: StackOptions<'_>, responses: Vec<ModelResponse>) -> Stack {
    let transport = Arc::new(ScriptedTransport::new(responses));
    let sink = Arc::new(RecordingSink::new(options.decision));
    let registry = Arc::new(default_registry(options.workspace, 10));
    let policy = Arc::new(
        ExecutionPolicy::new(registry, PermissionGrants::new(options.grants))
            .with_safe_mode(options.safe_mode),
    );

    let checkpoint = match options.checkpoint {
        Some((path, max_iterations)) => CheckpointOrchestrator::open(
            Arc::new(FileCheckpointStore::new(path)),
            CheckpointSettings {
                enabled: true,
                max_iterations,
            },
        )
        .await
        .unwrap(),
        None => CheckpointOrchestrator::disabled(
            Arc::new(FileCheckpointStore::new(options.workspace.join("unused.md"))),
            25,
        ),
    };

    let hooks: Arc<dyn EngineHooks> = Arc::new(StandardHooks::new(
        transport.clone(),
        policy.clone(),
        sink.clone(),
    ));
    let engine = AgentEngine::new(
        hooks,
        policy,
        Arc::new(checkpoint),
        EngineConfig::default(),
    );

    Stack {
        engine,
        transport,
        sink,
    }
}

fn tool_results(state: &EngineState) -> Vec<String> {
    state
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.content.clone())
        .collect()
}

// ── E2E: file tools ──────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_write_then_read_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = StackOptions::new(dir.path());
    options.grants = vec![PermissionCategory::Read, PermissionCategory::Write];

    let stack = stack(
        options,
        vec![
            tool_response(vec![make_tool_call(
                "call_1",
                "write_file",
                json!({"path": "notes/todo.md", "content": "- ship it\n"}),
            )]),
            tool_response(vec![make_tool_call(
                "call_2",
                "read_file",
                json!({"file_path": "notes/todo.md"}),
            )]),
            text_response("Created notes/todo.md."),
        ],
    )
    .await;

    let mut state = EngineState::new("You are a coding agent.");
    let answer = stack
        .engine
        .run(&mut state, "Write a todo list", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answer.as_deref(), Some("Created notes/todo.md."));
    assert_eq!(stack.transport.calls(), 3);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("notes/todo.md")).unwrap(),
        "- ship it\n"
    );

    let results = tool_results(&state);
    assert_eq!(results.len(), 2);
    assert!(results[0].starts_with("Wrote 10 bytes"), "{}", results[0]);
    assert!(results[1].contains("- ship it"), "{}", results[1]);
    // Both categories were granted, so nothing asked.
    assert!(stack.sink.requests().is_empty());
    assert_eq!(stack.sink.results.lock().unwrap().len(), 2);
    assert_eq!(
        stack.sink.assistant.lock().unwrap().as_slice(),
        ["Created notes/todo.md."]
    );
}

#[tokio::test]
async fn e2e_edit_asks_with_a_diff() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();

    let stack = stack(
        StackOptions::new(dir.path()),
        vec![
            text_response(
                "I'll add the call.\n<function=edit_file>\n<parameter=path>main.rs</parameter>\n\
                 <parameter=old_text>fn main() {}</parameter>\n\
                 <parameter=new_text>fn main() { run() }</parameter>\n</function>",
            ),
            text_response("Done."),
        ],
    )
    .await;

    let mut state = EngineState::new("sys");
    stack
        .engine
        .run(&mut state, "call run from main", &CancellationToken::new())
        .await
        .unwrap();

    let requests = stack.sink.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].tool_name, "edit_file");
    let diff = requests[0].diff.as_ref().expect("edit confirmations carry a diff");
    assert!(diff.existed);
    assert_eq!(diff.path, "main.rs");
    assert!(diff.unified_diff.contains("-fn main() {}"));
    assert!(diff.unified_diff.contains("+fn main() { run() }"));

    assert_eq!(
        std::fs::read_to_string(dir.path().join("main.rs")).unwrap(),
        "fn main() { run() }\n"
    );
    // The markup is not part of what the model sees next time.
    assert_eq!(state.messages[2].content, "I'll add the call.");
}

#[tokio::test]
async fn e2e_declined_write_leaves_disk_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = StackOptions::new(dir.path());
    options.decision = ConfirmDecision::Decline;

    let stack = stack(
        options,
        vec![
            tool_response(vec![make_tool_call(
                "call_1",
                "write_file",
                json!({"path": "new.txt", "content": "hello"}),
            )]),
            text_response("Okay, I won't."),
        ],
    )
    .await;

    let mut state = EngineState::new("sys");
    stack
        .engine
        .run(&mut state, "create new.txt", &CancellationToken::new())
        .await
        .unwrap();

    assert!(!dir.path().join("new.txt").exists());
    let diff = stack.sink.requests()[0].diff.clone().unwrap();
    assert!(!diff.existed);
    assert_eq!(
        tool_results(&state),
        ["Skipped: the user declined to run 'write_file'."]
    );
}

#[tokio::test]
async fn e2e_approve_always_stops_asking() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = StackOptions::new(dir.path());
    options.decision = ConfirmDecision::ApproveAlways;

    let stack = stack(
        options,
        vec![
            tool_response(vec![make_tool_call(
                "call_1",
                "write_file",
                json!({"path": "a.txt", "content": "a"}),
            )]),
            tool_response(vec![make_tool_call(
                "call_2",
                "write_file",
                json!({"path": "b.txt", "content": "b"}),
            )]),
            text_response("Both written."),
        ],
    )
    .await;

    let mut state = EngineState::new("sys");
    stack
        .engine
        .run(&mut state, "write two files", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stack.sink.requests().len(), 1);
    assert!(dir.path().join("a.txt").exists());
    assert!(dir.path().join("b.txt").exists());
    assert!(
        stack
            .engine
            .policy()
            .grants()
            .is_granted(PermissionCategory::Write)
    );
}

#[tokio::test]
async fn e2e_sandbox_escape_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack(
        StackOptions::new(dir.path()),
        vec![
            tool_response(vec![make_tool_call(
                "call_1",
                "read_file",
                json!({"file_path": "../../etc/passwd"}),
            )]),
            text_response("That file is outside the workspace."),
        ],
    )
    .await;

    let mut state = EngineState::new("sys");
    let answer = stack
        .engine
        .run(&mut state, "read /etc/passwd", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answer.as_deref(), Some("That file is outside the workspace."));
    let results = tool_results(&state);
    assert!(results[0].starts_with("Error (security)"), "{}", results[0]);
}

// ── E2E: shell and safe mode ─────────────────────────────────────────────

#[tokio::test]
async fn e2e_safe_mode_denies_shell_without_running_it() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = StackOptions::new(dir.path());
    options.grants = vec![
        PermissionCategory::Read,
        PermissionCategory::Write,
        PermissionCategory::Execute,
    ];
    options.safe_mode = true;

    let stack = stack(
        options,
        vec![
            tool_response(vec![make_tool_call(
                "call_1",
                "run_shell",
                json!({"command": "touch marker"}),
            )]),
            text_response("Shell is disabled."),
        ],
    )
    .await;

    let mut state = EngineState::new("sys");
    stack
        .engine
        .run(&mut state, "touch a file", &CancellationToken::new())
        .await
        .unwrap();

    assert!(!dir.path().join("marker").exists());
    assert_eq!(
        tool_results(&state),
        ["Denied: tool 'run_shell' is disabled while safe mode is active."]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn e2e_granted_shell_runs_in_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = StackOptions::new(dir.path());
    options.grants = vec![PermissionCategory::Read, PermissionCategory::Execute];

    let stack = stack(
        options,
        vec![
            tool_response(vec![make_tool_call(
                "call_1",
                "run_shell",
                json!({"command": "echo built > out.txt && cat out.txt"}),
            )]),
            text_response("Built."),
        ],
    )
    .await;

    let mut state = EngineState::new("sys");
    stack
        .engine
        .run(&mut state, "build it", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(tool_results(&state), ["built"]);
    assert!(dir.path().join("out.txt").exists());
}

// ── E2E: checkpoints across sessions ─────────────────────────────────────

#[tokio::test]
async fn e2e_checkpoint_is_written_then_restored_by_next_session() {
    let workspace = tempfile::tempdir().unwrap();
    let state_dir = tempfile::tempdir().unwrap();
    let checkpoint_path = state_dir.path().join("checkpoint.md");
    std::fs::write(workspace.path().join("README.md"), "hello\n").unwrap();

    // Session one: a single tool round reaches the limit and gets summarized.
    {
        let mut options = StackOptions::new(workspace.path());
        options.checkpoint = Some((checkpoint_path.as_path(), 1));
        let stack = stack(
            options,
            vec![
                tool_response(vec![make_tool_call("call_1", "list_directory", json!({}))]),
                text_response("Listed the workspace; it has a README."),
                text_response("Finished."),
            ],
        )
        .await;

        let mut state = EngineState::new("sys");
        let answer = stack
            .engine
            .run(&mut state, "look around", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(answer.as_deref(), Some("Finished."));
        assert_eq!(stack.transport.calls(), 3);
        assert_eq!(state.iteration, 0);
        assert_eq!(state.messages[0].role, Role::System);
        assert!(state.messages[1].content.starts_with("[Checkpoint 1 restored]"));
    }

    let record = FileCheckpointStore::new(&checkpoint_path)
        .read()
        .await
        .unwrap()
        .expect("checkpoint file written");
    assert_eq!(record.cycle, 1);
    assert_eq!(record.summary, "Listed the workspace; it has a README.");

    // Session two: the first trigger restores instead of summarizing.
    let mut options = StackOptions::new(workspace.path());
    options.checkpoint = Some((checkpoint_path.as_path(), 1));
    let stack = stack(
        options,
        vec![
            tool_response(vec![make_tool_call(
                "call_1",
                "read_file",
                json!({"file_path": "README.md"}),
            )]),
            text_response("Resumed."),
        ],
    )
    .await;

    let mut state = EngineState::new("sys");
    stack
        .engine
        .run(&mut state, "continue", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stack.transport.calls(), 2);
    assert!(state.messages[1].content.contains("it has a README"));
    let unchanged = FileCheckpointStore::new(&checkpoint_path)
        .read()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.cycle, 1);
}
