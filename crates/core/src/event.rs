//! Domain events for decoupled progress reporting.
//!
//! The engine publishes events as a turn advances. Front-ends and
//! diagnostics subscribe without the engine knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A `run()` call started
    TurnStarted {
        iteration: u32,
        timestamp: DateTime<Utc>,
    },

    /// The model answered
    ModelResponded {
        tool_calls: usize,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool invocation finished (or was skipped/denied)
    ToolExecuted {
        tool_name: String,
        status: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// History was compacted into a checkpoint
    CheckpointCreated {
        cycle: u32,
        resumed: bool,
        timestamp: DateTime<Utc>,
    },

    /// A turn stopped on the cancellation flag
    TurnCancelled {
        skipped_calls: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
