//! The on-disk checkpoint format: one header line, then the summary body
//! verbatim.
//!
//! ```text
//! <!-- ferrocode-checkpoint cycle=3 timestamp=2026-01-05T10:00:00+00:00 -->
//! ...summary...
//! ```

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use ferrocode_core::CheckpointError;
use regex_lite::Regex;

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<!-- ferrocode-checkpoint cycle=(\d+) timestamp=(\S+) -->$").unwrap()
});

#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointRecord {
    pub cycle: u32,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
}

impl CheckpointRecord {
    pub fn new(cycle: u32, summary: impl Into<String>) -> Self {
        Self {
            cycle,
            timestamp: Utc::now(),
            summary: summary.into(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "<!-- ferrocode-checkpoint cycle={} timestamp={} -->\n{}",
            self.cycle,
            self.timestamp.to_rfc3339(),
            self.summary
        )
    }

    pub fn parse(text: &str) -> Result<Self, CheckpointError> {
        let (header, summary) = text.split_once('\n').unwrap_or((text, ""));
        let caps = HEADER
            .captures(header.trim_end_matches('\r'))
            .ok_or_else(|| CheckpointError::MalformedHeader(header.chars().take(120).collect()))?;

        let cycle = caps[1]
            .parse::<u32>()
            .map_err(|e| CheckpointError::MalformedHeader(format!("cycle: {e}")))?;
        let timestamp = DateTime::parse_from_rfc3339(&caps[2])
            .map_err(|e| CheckpointError::MalformedHeader(format!("timestamp: {e}")))?
            .with_timezone(&Utc);

        Ok(Self {
            cycle,
            timestamp,
            summary: summary.to_string(),
        })
    }
}
