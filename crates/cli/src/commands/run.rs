//! `ferrocode run`: one prompt, run to completion, then exit.
//!
//! Tool activity and confirmation prompts go to stderr; assistant text goes
//! to stdout so the answer can be piped.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use ferrocode_agent::EngineHooks;
use ferrocode_core::{ConfirmDecision, ConfirmationRequest, InteractionSink};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::prompt;
use crate::session;

/// Blocking terminal sink: confirmations read one line from stdin.
struct TerminalSink {
    auto_approve: bool,
}

#[async_trait]
impl InteractionSink for TerminalSink {
    fn on_tool_call(&self, name: &str, arguments: &Map<String, Value>) {
        eprintln!("  > {name} {}", prompt::compact_arguments(arguments));
    }

    fn on_tool_result(&self, text: &str) {
        eprintln!("    {}", prompt::preview_result(text));
    }

    fn on_tool_skipped(&self) {
        eprintln!("    (skipped)");
    }

    fn on_assistant_content(&self, text: &str) {
        println!("{text}");
    }

    fn on_thinking_content(&self, text: &str) {
        debug!(chars = text.len(), "Model thinking");
    }

    async fn request_confirmation(&self, request: ConfirmationRequest) -> ConfirmDecision {
        if self.auto_approve {
            return ConfirmDecision::Approve;
        }

        eprint!("{}{}", prompt::render_request(&request), prompt::CONFIRM_PROMPT);
        let _ = std::io::stderr().flush();

        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => prompt::parse_decision(&line),
            _ => ConfirmDecision::Decline,
        }
    }
}

pub fn execute(input: &str, auto_approve: bool, safe_mode: bool) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(input, auto_approve, safe_mode))
}

async fn run(input: &str, auto_approve: bool, safe_mode: bool) -> anyhow::Result<()> {
    let config = session::load_config()?;
    let sink = Arc::new(TerminalSink { auto_approve });
    let mut session = session::build(&config, sink, safe_mode, |hooks| {
        Arc::new(hooks) as Arc<dyn EngineHooks>
    })
    .await?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = session.engine.run(&mut session.state, input, &cancel).await;
    interrupt.abort();

    result?;
    if session.state.cancelled {
        anyhow::bail!("Interrupted");
    }
    info!(
        tokens = session.state.total_tokens,
        messages = session.state.messages.len(),
        "Done"
    );
    Ok(())
}
