//! Checkpointing for ferrocode: bounded-context history compaction.
//!
//! The [`CheckpointOrchestrator`] decides when to compact and builds the
//! replacement history; a [`CheckpointStore`] persists the summary as one
//! Markdown file whose header carries the cycle counter.

pub mod orchestrator;
pub mod record;
pub mod store;

pub use orchestrator::{
    CheckpointOrchestrator, CheckpointOutcome, CheckpointPhase, CheckpointSettings, SUMMARY_PROMPT,
    Summarizer, restore_message, summary_request,
};
pub use record::CheckpointRecord;
pub use store::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
