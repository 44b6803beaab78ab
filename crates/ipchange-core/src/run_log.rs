//! Operator-facing log of a single run
//!
//! Every line is forwarded to `tracing` as it is recorded and kept with its
//! timestamp, so the full notification can replay the run.

use chrono::{DateTime, Utc};
use tracing::info;

/// Timestamped lines recorded during one run
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    lines: Vec<(DateTime<Utc>, String)>,
}

impl RunLog {
    /// Create an empty run log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a line
    pub fn record(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!("{}", line);
        self.lines.push((Utc::now(), line));
    }

    /// Recorded lines with their timestamps, oldest first
    pub fn entries(&self) -> &[(DateTime<Utc>, String)] {
        &self.lines
    }

    /// Recorded lines without timestamps
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|(_, line)| line.as_str())
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
