//! `ferrocode chat`: interactive session.
//!
//! The engine runs as a future next to the input reader. Its sink never
//! touches the terminal; it posts [`UiEvent`]s over a channel and the loop
//! below renders them, so a confirmation prompt and a Ctrl-C can both be
//! answered while a turn is in flight.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use ferrocode_agent::{DenyAction, EngineHooks, StandardHooks};
use ferrocode_core::{
    ConfirmDecision, ConfirmationRequest, InteractionSink, ModelRequest, ModelResponse,
    ProviderError, ToolInvocation,
};
use ferrocode_parser::ParsedResponse;
use ferrocode_policy::ToolExecution;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::prompt;
use crate::session::{self, Session};

const HELP: &str = "\
  /help              Show this help
  /clear             Start a new conversation (keeps the checkpoint file)
  /clear-checkpoint  Delete the saved checkpoint
  /safe              Toggle safe mode
  /status            Show token usage and grants
  /exit, /quit       Leave";

enum UiEvent {
    ToolCall(String),
    ToolResult(String),
    ToolSkipped,
    Assistant(String),
    Thinking(String),
    Confirm {
        request: ConfirmationRequest,
        reply: oneshot::Sender<ConfirmDecision>,
    },
}

struct ChannelSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelSink {
    fn post(&self, event: UiEvent) {
        // The receiver only goes away on shutdown.
        let _ = self.tx.send(event);
    }
}

#[async_trait]
impl InteractionSink for ChannelSink {
    fn on_tool_call(&self, name: &str, arguments: &Map<String, Value>) {
        self.post(UiEvent::ToolCall(format!(
            "{name} {}",
            prompt::compact_arguments(arguments)
        )));
    }

    fn on_tool_result(&self, text: &str) {
        self.post(UiEvent::ToolResult(text.to_string()));
    }

    fn on_tool_skipped(&self) {
        self.post(UiEvent::ToolSkipped);
    }

    fn on_assistant_content(&self, text: &str) {
        self.post(UiEvent::Assistant(text.to_string()));
    }

    fn on_thinking_content(&self, text: &str) {
        self.post(UiEvent::Thinking(text.to_string()));
    }

    async fn request_confirmation(&self, request: ConfirmationRequest) -> ConfirmDecision {
        let (reply, answer) = oneshot::channel();
        if self.tx.send(UiEvent::Confirm { request, reply }).is_err() {
            return ConfirmDecision::Decline;
        }
        answer.await.unwrap_or(ConfirmDecision::Decline)
    }
}

/// Standard hooks, except a safe-mode denial ends the whole batch and
/// tells the model not to retry.
struct ChatHooks {
    inner: StandardHooks,
}

#[async_trait]
impl EngineHooks for ChatHooks {
    async fn call_model(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        self.inner.call_model(request).await
    }

    async fn execute_one_tool(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationToken,
    ) -> ToolExecution {
        self.inner.execute_one_tool(invocation, cancel).await
    }

    fn on_response_content(&self, raw: &str, parsed: &ParsedResponse) {
        self.inner.on_response_content(raw, parsed);
    }

    fn on_deny(&self, invocation: &ToolInvocation) -> DenyAction {
        DenyAction {
            stop_batch: true,
            injected_text: Some(deny_guidance(&invocation.name)),
        }
    }
}

fn deny_guidance(tool: &str) -> String {
    format!(
        "Safe mode blocked '{tool}' and the rest of that batch was skipped. \
         Do not call '{tool}' again; continue with the remaining tools or tell me \
         what to run myself."
    )
}

pub fn execute(safe_mode: bool) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(chat(safe_mode))
}

async fn chat(safe_mode: bool) -> anyhow::Result<()> {
    let config = session::load_config()?;
    let (tx, mut events) = mpsc::unbounded_channel();
    let sink = Arc::new(ChannelSink { tx });
    let mut session = session::build(&config, sink, safe_mode, |inner| {
        Arc::new(ChatHooks { inner }) as Arc<dyn EngineHooks>
    })
    .await?;

    println!("ferrocode chat ({}). Type /help for commands.", config.model.model);
    if session.engine.policy().safe_mode() {
        println!("Safe mode is on.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        let _ = std::io::stdout().flush();

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            if !slash_command(input, &mut session).await? {
                break;
            }
            continue;
        }

        let cancel = CancellationToken::new();
        let mut stdin_open = true;
        let outcome = {
            let turn = session.engine.run(&mut session.state, input, &cancel);
            tokio::pin!(turn);
            let mut pending: Option<oneshot::Sender<ConfirmDecision>> = None;

            loop {
                tokio::select! {
                    result = &mut turn => break result,
                    Some(event) = events.recv() => {
                        if let Some(reply) = render(event) {
                            pending = Some(reply);
                        }
                    }
                    answer = lines.next_line(), if stdin_open => match answer {
                        Ok(Some(answer)) => match pending.take() {
                            Some(reply) => {
                                let _ = reply.send(prompt::parse_decision(&answer));
                            }
                            None => eprintln!("  (busy; press Ctrl-C to interrupt)"),
                        },
                        _ => {
                            stdin_open = false;
                            cancel.cancel();
                        }
                    },
                    _ = tokio::signal::ctrl_c() => {
                        cancel.cancel();
                        if let Some(reply) = pending.take() {
                            let _ = reply.send(ConfirmDecision::Decline);
                        }
                    }
                }
            }
        };

        while let Ok(event) = events.try_recv() {
            if let Some(reply) = render(event) {
                let _ = reply.send(ConfirmDecision::Decline);
            }
        }

        match outcome {
            Ok(_) if session.state.cancelled => println!("\n  Interrupted."),
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Turn failed");
                eprintln!("\n  Error: {e}");
            }
        }

        if !stdin_open {
            break;
        }
    }

    info!(tokens = session.state.total_tokens, "Session ended");
    Ok(())
}

/// Draw one event. A confirmation hands back its reply channel.
fn render(event: UiEvent) -> Option<oneshot::Sender<ConfirmDecision>> {
    match event {
        UiEvent::ToolCall(summary) => eprintln!("  > {summary}"),
        UiEvent::ToolResult(text) => eprintln!("    {}", prompt::preview_result(&text)),
        UiEvent::ToolSkipped => eprintln!("    (skipped)"),
        UiEvent::Assistant(text) => println!("\n{text}"),
        UiEvent::Thinking(text) => eprintln!("  (thinking: {} chars)", text.chars().count()),
        UiEvent::Confirm { request, reply } => {
            eprint!("{}{}", prompt::render_request(&request), prompt::CONFIRM_PROMPT);
            let _ = std::io::stderr().flush();
            return Some(reply);
        }
    }
    None
}

/// Returns false when the session should end.
async fn slash_command(input: &str, session: &mut Session) -> anyhow::Result<bool> {
    match input {
        "/exit" | "/quit" => return Ok(false),
        "/help" => println!("{HELP}"),
        "/clear" => {
            session.state.reset();
            println!("  Conversation cleared.");
        }
        "/clear-checkpoint" => {
            session.engine.checkpoint().store().clear().await?;
            println!("  Checkpoint deleted.");
        }
        "/safe" => {
            let policy = session.engine.policy();
            policy.set_safe_mode(!policy.safe_mode());
            println!(
                "  Safe mode {}.",
                if policy.safe_mode() { "on" } else { "off" }
            );
        }
        "/status" => {
            let grants: Vec<String> = session
                .engine
                .policy()
                .grants()
                .snapshot()
                .iter()
                .map(ToString::to_string)
                .collect();
            println!("  Tokens:     {}", session.state.total_tokens);
            println!("  Messages:   {}", session.state.messages.len());
            println!(
                "  Iteration:  {}/{}",
                session.state.iteration,
                session.engine.checkpoint().max_iterations()
            );
            println!("  Granted:    {}", grants.join(", "));
        }
        other => println!("  Unknown command {other}. Type /help."),
    }
    Ok(true)
}
