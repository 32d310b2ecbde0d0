//! The agent engine: model call, tool dispatch, checkpoint evaluation.
//!
//! ```text
//! RUNNING -> model call -> no calls? -> DONE
//!                       -> TOOL_DISPATCH -> iteration += 1 -> CHECKPOINT? -> RUNNING
//! ```
//!
//! `CANCELLED` is reachable at the suspension points: before and during the
//! model call, while a confirmation is pending, and before and after each
//! tool batch.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use ferrocode_checkpoint::{CheckpointOrchestrator, Summarizer, summary_request};
use ferrocode_core::{
    CallOptions, DomainEvent, EventBus, Message, ModelRequest, ProviderError, ToolDefinition,
    ToolInvocation,
};
use ferrocode_parser::{ParsedResponse, ToolCallParser, strip_thinking};
use ferrocode_policy::{Disposition, ExecutionPolicy, ExecutionStatus, ToolExecution};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::hooks::EngineHooks;
use crate::state::EngineState;

/// Results of one tool round, in issue order.
struct Round {
    results: Vec<ToolExecution>,
    injected: Vec<String>,
    skipped: usize,
}

/// The orchestration loop shared by every front-end. Holds no
/// conversation state; each `run()` works on the [`EngineState`] it is
/// given.
pub struct AgentEngine {
    hooks: Arc<dyn EngineHooks>,
    policy: Arc<ExecutionPolicy>,
    checkpoint: Arc<CheckpointOrchestrator>,
    parser: ToolCallParser,
    tools: Vec<ToolDefinition>,
    config: EngineConfig,
    events: Arc<EventBus>,
}

impl AgentEngine {
    pub fn new(
        hooks: Arc<dyn EngineHooks>,
        policy: Arc<ExecutionPolicy>,
        checkpoint: Arc<CheckpointOrchestrator>,
        config: EngineConfig,
    ) -> Self {
        let descriptors = policy.descriptors();
        Self {
            parser: ToolCallParser::new(&descriptors),
            tools: descriptors.iter().map(|d| d.definition()).collect(),
            hooks,
            policy,
            checkpoint,
            config,
            events: Arc::new(EventBus::default()),
        }
    }

    /// Publish progress on a shared bus instead of a private one.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn policy(&self) -> &Arc<ExecutionPolicy> {
        &self.policy
    }

    pub fn checkpoint(&self) -> &Arc<CheckpointOrchestrator> {
        &self.checkpoint
    }

    pub fn parser(&self) -> &ToolCallParser {
        &self.parser
    }

    /// Process one user input until the model answers without tool calls.
    ///
    /// Returns the display text of the final assistant message, or `None`
    /// when the turn was cancelled (`state.cancelled` is then set).
    /// Transport and checkpoint failures end the turn with every message
    /// appended so far left in place; tool failures never do.
    pub async fn run(
        &self,
        state: &mut EngineState,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, EngineError> {
        state.cancelled = false;
        state.messages.push(Message::user(input));
        self.events.publish(DomainEvent::TurnStarted {
            iteration: state.iteration,
            timestamp: Utc::now(),
        });
        info!(
            iteration = state.iteration,
            messages = state.messages.len(),
            "Turn started"
        );

        loop {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(state, 0));
            }

            let request = self.request(&state.messages);
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.cancelled(state, 0)),
                response = self.hooks.call_model(request) => response?,
            };

            state.total_tokens += u64::from(response.usage.total_tokens);
            let parsed = self
                .parser
                .analyze(&response.content, response.tool_calls.as_deref());
            self.hooks.on_response_content(&response.content, &parsed);
            self.events.publish(DomainEvent::ModelResponded {
                tool_calls: parsed.invocations.len(),
                tokens_used: response.usage.total_tokens,
                timestamp: Utc::now(),
            });

            let ParsedResponse {
                invocations,
                display_text,
                ..
            } = parsed;
            state
                .messages
                .push(Message::assistant_with_calls(display_text, invocations.clone()));

            if invocations.is_empty() {
                info!(
                    iteration = state.iteration,
                    total_tokens = state.total_tokens,
                    "Turn finished"
                );
                return Ok(state.last_assistant_text().map(str::to_string));
            }

            debug!(
                iteration = state.iteration,
                calls = invocations.len(),
                "Dispatching tool calls"
            );
            let round = self.dispatch(&invocations, cancel).await;
            state
                .messages
                .extend(round.results.iter().map(ToolExecution::to_message));
            state
                .messages
                .extend(round.injected.into_iter().map(Message::user));
            state.iteration += 1;

            if cancel.is_cancelled() {
                return Ok(self.cancelled(state, round.skipped));
            }

            if self.checkpoint.should_trigger(state.iteration) {
                self.apply_checkpoint(state).await?;
            }
        }
    }

    fn request(&self, messages: &[Message]) -> ModelRequest {
        ModelRequest {
            messages: messages.to_vec(),
            model: self.config.model.clone(),
            tools: self.tools.clone(),
            options: self.config.options.clone(),
        }
    }

    /// Denials first (they never reach the registry), then auto calls
    /// concurrently, then confirm calls one at a time. Calls that never
    /// started get an explicit skipped result.
    async fn dispatch(&self, invocations: &[ToolInvocation], cancel: &CancellationToken) -> Round {
        let dispositions: Vec<Disposition> = invocations
            .iter()
            .map(|call| self.policy.classify(call))
            .collect();
        let mut slots: Vec<Option<ToolExecution>> = vec![None; invocations.len()];
        let mut injected = Vec::new();
        let mut stopped = false;
        let mut abandoned = 0;

        for (i, call) in invocations.iter().enumerate() {
            if dispositions[i] != Disposition::Deny {
                continue;
            }
            slots[i] = Some(self.execute_timed(call, cancel).await);
            let action = self.hooks.on_deny(call);
            injected.extend(action.injected_text);
            if action.stop_batch {
                debug!(tool = %call.name, "Denial stopped the batch");
                stopped = true;
                break;
            }
        }

        if !stopped && !cancel.is_cancelled() {
            let auto: Vec<usize> = (0..invocations.len())
                .filter(|&i| dispositions[i] == Disposition::Auto)
                .collect();
            let finished: Vec<(usize, Option<ToolExecution>)> = stream::iter(auto)
                .map(|i| async move {
                    if cancel.is_cancelled() {
                        return (i, None);
                    }
                    (i, Some(self.execute_timed(&invocations[i], cancel).await))
                })
                .buffer_unordered(self.config.max_parallel_tools.max(1))
                .collect()
                .await;
            for (i, execution) in finished {
                slots[i] = execution;
            }

            for i in 0..invocations.len() {
                if dispositions[i] != Disposition::Confirm {
                    continue;
                }
                if cancel.is_cancelled() {
                    break;
                }
                let execution = self.execute_timed(&invocations[i], cancel).await;
                if cancel.is_cancelled() && execution.status == ExecutionStatus::Skipped {
                    abandoned += 1;
                }
                slots[i] = Some(execution);
            }
        }

        let mut results = Vec::with_capacity(invocations.len());
        let mut skipped = abandoned;
        for (slot, call) in slots.into_iter().zip(invocations) {
            let execution = match slot {
                Some(execution) => execution,
                None => {
                    skipped += 1;
                    let execution = if stopped {
                        ToolExecution::batch_stopped(call)
                    } else {
                        ToolExecution::cancelled(call)
                    };
                    self.publish_execution(&execution, 0);
                    execution
                }
            };
            results.push(execution);
        }

        Round {
            results,
            injected,
            skipped,
        }
    }

    async fn execute_timed(
        &self,
        call: &ToolInvocation,
        cancel: &CancellationToken,
    ) -> ToolExecution {
        let started = Instant::now();
        let execution = self.hooks.execute_one_tool(call, cancel).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(
            tool = %call.name,
            status = execution.status.as_str(),
            duration_ms,
            "Tool call resolved"
        );
        self.publish_execution(&execution, duration_ms);
        execution
    }

    fn publish_execution(&self, execution: &ToolExecution, duration_ms: u64) {
        self.events.publish(DomainEvent::ToolExecuted {
            tool_name: execution.tool_name.clone(),
            status: execution.status.as_str().to_string(),
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    /// Replace the history with `[system, restore]` (or, with checkpointing
    /// disabled, only reset the counter).
    async fn apply_checkpoint(&self, state: &mut EngineState) -> Result<(), EngineError> {
        let system = state
            .system()
            .cloned()
            .unwrap_or_else(|| Message::system(""));
        let summarizer = ModelSummarizer {
            hooks: self.hooks.as_ref(),
            model: &self.config.model,
            options: &self.config.options,
        };

        if let Some(outcome) = self
            .checkpoint
            .perform(&system, &state.messages, &summarizer)
            .await?
        {
            info!(
                cycle = outcome.record.cycle,
                resumed = outcome.resumed,
                replaced = state.messages.len(),
                "History compacted"
            );
            state.messages = outcome.messages;
            self.events.publish(DomainEvent::CheckpointCreated {
                cycle: outcome.record.cycle,
                resumed: outcome.resumed,
                timestamp: Utc::now(),
            });
        }
        state.iteration = 0;
        Ok(())
    }

    fn cancelled(&self, state: &mut EngineState, skipped: usize) -> Option<String> {
        state.cancelled = true;
        warn!(skipped, "Turn cancelled");
        self.events.publish(DomainEvent::TurnCancelled {
            skipped_calls: skipped,
            timestamp: Utc::now(),
        });
        None
    }
}

/// Asks the model for a checkpoint summary with tool access disabled.
struct ModelSummarizer<'a> {
    hooks: &'a dyn EngineHooks,
    model: &'a str,
    options: &'a CallOptions,
}

#[async_trait]
impl<'a> Summarizer for ModelSummarizer<'a> {
    async fn summarize(&self, history: &[Message]) -> Result<String, ProviderError> {
        let request = ModelRequest {
            messages: summary_request(history),
            model: self.model.to_string(),
            tools: Vec::new(),
            options: self.options.clone(),
        }
        .without_tools();
        let response = self.hooks.call_model(request).await?;
        Ok(strip_thinking(&response.content))
    }
}
