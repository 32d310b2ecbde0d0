//! History compaction: when the iteration counter reaches its limit the
//! conversation is summarized, persisted, and replaced by the summary.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use ferrocode_core::{CheckpointError, Message, ProviderError};
use tracing::{debug, info, warn};

use crate::record::CheckpointRecord;
use crate::store::CheckpointStore;

/// Instruction appended to the history when asking for a summary.
pub const SUMMARY_PROMPT: &str = "Your context is about to be reset. Write a concise but complete \
summary of this session so far so that you can continue the task from it alone. Include: the \
user's goal, what has been done (files read or changed, commands run, key findings), decisions \
made, and the exact next steps. Reply with the summary only, in Markdown, without calling tools.";

/// Produces the summary text. The engine implements this with a model
/// call that has tool access disabled.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, history: &[Message]) -> Result<String, ProviderError>;
}

/// The messages to send when requesting a summary of `history`.
pub fn summary_request(history: &[Message]) -> Vec<Message> {
    let mut messages = history.to_vec();
    messages.push(Message::user(SUMMARY_PROMPT));
    messages
}

/// The single message that carries a checkpoint into the fresh history.
pub fn restore_message(record: &CheckpointRecord) -> Message {
    Message::user(format!(
        "[Checkpoint {} restored]\n\nThe earlier conversation was compacted into this summary:\n\n{}\n\nContinue the task from here.",
        record.cycle,
        record.summary.trim_end()
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointPhase {
    Normal,
    Triggered,
    Restoring,
}

#[derive(Debug, Clone)]
pub struct CheckpointSettings {
    pub enabled: bool,
    pub max_iterations: u32,
}

/// What a completed checkpoint produced.
#[derive(Debug, Clone)]
pub struct CheckpointOutcome {
    pub record: CheckpointRecord,
    /// True when an earlier session's checkpoint was restored instead of
    /// summarizing.
    pub resumed: bool,
    /// The replacement history: `[system, restore]`.
    pub messages: Vec<Message>,
}

pub struct CheckpointOrchestrator {
    store: Arc<dyn CheckpointStore>,
    settings: CheckpointSettings,
    phase: Mutex<CheckpointPhase>,
    pending_resume: AtomicBool,
    cycle: AtomicU32,
}

impl CheckpointOrchestrator {
    /// Open the orchestrator for a new session. A checkpoint already in the
    /// store is restored (not re-summarized) at the first trigger. One that
    /// cannot be read is ignored and replaced by the next save.
    pub async fn open(
        store: Arc<dyn CheckpointStore>,
        settings: CheckpointSettings,
    ) -> Result<Self, CheckpointError> {
        let existing = if settings.enabled {
            match store.read().await {
                Ok(record) => record,
                Err(e) => {
                    warn!(store = store.name(), error = %e, "Ignoring unreadable checkpoint");
                    None
                }
            }
        } else {
            None
        };
        if let Some(record) = &existing {
            info!(cycle = record.cycle, store = store.name(), "Found checkpoint from an earlier session");
        }

        Ok(Self {
            cycle: AtomicU32::new(existing.as_ref().map_or(0, |r| r.cycle)),
            pending_resume: AtomicBool::new(existing.is_some()),
            phase: Mutex::new(CheckpointPhase::Normal),
            store,
            settings,
        })
    }

    /// An orchestrator that never persists anything.
    pub fn disabled(store: Arc<dyn CheckpointStore>, max_iterations: u32) -> Self {
        Self {
            store,
            settings: CheckpointSettings {
                enabled: false,
                max_iterations,
            },
            phase: Mutex::new(CheckpointPhase::Normal),
            pending_resume: AtomicBool::new(false),
            cycle: AtomicU32::new(0),
        }
    }

    pub fn enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn max_iterations(&self) -> u32 {
        self.settings.max_iterations
    }

    pub fn phase(&self) -> CheckpointPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last persisted cycle (0 when none).
    pub fn cycle(&self) -> u32 {
        self.cycle.load(Ordering::Relaxed)
    }

    pub fn has_pending_resume(&self) -> bool {
        self.pending_resume.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub fn should_trigger(&self, iteration: u32) -> bool {
        iteration >= self.settings.max_iterations
    }

    /// Run the checkpoint transition. Returns `None` when checkpointing is
    /// disabled; the caller still resets its iteration counter.
    ///
    /// On error the phase returns to `Normal` and nothing was replaced, so
    /// the caller's history is untouched.
    pub async fn perform(
        &self,
        system: &Message,
        history: &[Message],
        summarizer: &dyn Summarizer,
    ) -> Result<Option<CheckpointOutcome>, CheckpointError> {
        if !self.settings.enabled {
            debug!("Checkpointing disabled; only resetting the iteration counter");
            return Ok(None);
        }

        self.set_phase(CheckpointPhase::Triggered);
        let result = self.obtain_record(history, summarizer).await;
        let (record, resumed) = match result {
            Ok(found) => found,
            Err(e) => {
                self.set_phase(CheckpointPhase::Normal);
                return Err(e);
            }
        };

        self.set_phase(CheckpointPhase::Restoring);
        self.cycle.store(record.cycle, Ordering::Relaxed);
        let messages = vec![system.clone(), restore_message(&record)];
        self.set_phase(CheckpointPhase::Normal);

        info!(cycle = record.cycle, resumed, "Checkpoint applied");
        Ok(Some(CheckpointOutcome {
            record,
            resumed,
            messages,
        }))
    }

    async fn obtain_record(
        &self,
        history: &[Message],
        summarizer: &dyn Summarizer,
    ) -> Result<(CheckpointRecord, bool), CheckpointError> {
        if self.pending_resume.swap(false, Ordering::Relaxed)
            && let Some(record) = self.store.read().await?
        {
            return Ok((record, true));
        }

        let summary = summarizer.summarize(history).await?;
        let summary = if summary.trim().is_empty() {
            "(the model returned an empty summary)".to_string()
        } else {
            summary
        };
        let record = self.store.save(&summary).await?;
        Ok((record, false))
    }

    fn set_phase(&self, phase: CheckpointPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }
}
