//! Decision audit: a structured record of every execute/confirm/deny
//! decision the policy makes.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use ferrocode_core::PermissionCategory;
use serde::{Deserialize, Serialize};

/// What the policy decided for one invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Ran without asking.
    Auto,
    /// The user approved it.
    Confirmed,
    /// The user declined it.
    Declined,
    /// Refused by safe mode.
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub timestamp: DateTime<Utc>,
    pub call_id: String,
    pub tool_name: String,
    pub category: Option<PermissionCategory>,
    pub decision: Decision,
}

/// Trait for audit sinks (where entries are forwarded).
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &DecisionEntry);
}

/// Forwards entries to `tracing` at info level.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &DecisionEntry) {
        tracing::info!(
            call_id = %entry.call_id,
            tool = %entry.tool_name,
            category = ?entry.category,
            decision = ?entry.decision,
            "Policy decision"
        );
    }
}

/// In-memory decision log with optional sinks.
pub struct DecisionAudit {
    entries: Mutex<Vec<DecisionEntry>>,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for DecisionAudit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionAudit")
            .field("entry_count", &self.count())
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for DecisionAudit {
    fn default() -> Self {
        Self::with_sinks(vec![Box::new(TracingSink)])
    }
}

impl DecisionAudit {
    /// An audit log with no sinks.
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sinks,
        }
    }

    pub fn log(
        &self,
        call_id: &str,
        tool_name: &str,
        category: Option<PermissionCategory>,
        decision: Decision,
    ) {
        let entry = DecisionEntry {
            timestamp: Utc::now(),
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            category,
            decision,
        };

        for sink in &self.sinks {
            sink.record(&entry);
        }
        self.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<DecisionEntry> {
        self.lock().clone()
    }

    pub fn entries_with(&self, decision: Decision) -> Vec<DecisionEntry> {
        self.lock()
            .iter()
            .filter(|e| e.decision == decision)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DecisionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn log_and_filter() {
        let audit = DecisionAudit::new();
        audit.log("c1", "read_file", Some(PermissionCategory::Read), Decision::Auto);
        audit.log("c2", "write_file", Some(PermissionCategory::Write), Decision::Declined);
        audit.log("c3", "write_file", Some(PermissionCategory::Write), Decision::Confirmed);

        assert_eq!(audit.count(), 3);
        let declined = audit.entries_with(Decision::Declined);
        assert_eq!(declined.len(), 1);
        assert_eq!(declined[0].call_id, "c2");

        audit.clear();
        assert_eq!(audit.count(), 0);
    }

    #[test]
    fn custom_sink_receives_entries() {
        struct Collect(Arc<Mutex<Vec<String>>>);
        impl AuditSink for Collect {
            fn record(&self, entry: &DecisionEntry) {
                self.0.lock().unwrap().push(entry.tool_name.clone());
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let audit = DecisionAudit::with_sinks(vec![Box::new(Collect(seen.clone()))]);
        audit.log("c1", "run_shell", Some(PermissionCategory::Execute), Decision::Denied);
        assert_eq!(*seen.lock().unwrap(), vec!["run_shell".to_string()]);
    }

    #[test]
    fn entry_serializes_decision_in_snake_case() {
        let audit = DecisionAudit::new();
        audit.log("c1", "read_file", None, Decision::Auto);
        let json = serde_json::to_value(&audit.entries()[0]).unwrap();
        assert_eq!(json["decision"], "auto");
        assert!(format!("{audit:?}").contains("entry_count"));
    }
}
