// # IP Log Store Trait
//
// Defines the interface for the authoritative record of the last IP the
// pipeline fully propagated.
//
// ## Purpose
//
// The IP log is what makes runs idempotent across restarts:
// - `current()` is the "old IP" of the next run
// - the history is an append-only audit trail of every propagated change
//
// It is written LAST in a run. An aborted run leaves it unadvanced, so the
// next scheduled invocation re-attempts the whole pipeline.
//
// ## Implementations
//
// - File-based: JSON file with atomic writes and backup recovery
// - In-memory: for tests and embedding

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The current IP and when it was recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpLogSnapshot {
    /// The last fully propagated IP
    pub current_ip: String,
    /// When it was recorded
    pub updated_at: DateTime<Utc>,
}

/// One history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpLogEntry {
    /// The propagated IP
    pub ip: String,
    /// When it was recorded
    pub updated_at: DateTime<Utc>,
}

/// Trait for IP log implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// Stores perform persistent I/O but make no decisions: whether a change
/// happened is owned by the change detector, when to record it is owned by
/// the engine.
#[async_trait]
pub trait IpLogStore: Send + Sync {
    /// Get the current IP snapshot
    ///
    /// # Returns
    ///
    /// - `Ok(Some(snapshot))`: An IP was recorded before
    /// - `Ok(None)`: First run
    /// - `Err(Error)`: Storage error
    async fn current(&self) -> Result<Option<IpLogSnapshot>, crate::Error>;

    /// Record a new current IP and append it to the history
    ///
    /// Implementations must make the write durable before returning.
    async fn record(&self, ip: &str, at: DateTime<Utc>) -> Result<(), crate::Error>;

    /// Full history, oldest first
    async fn history(&self) -> Result<Vec<IpLogEntry>, crate::Error>;

    /// Convenience accessor for the current IP string
    async fn current_ip(&self) -> Result<Option<String>, crate::Error> {
        Ok(self.current().await?.map(|snapshot| snapshot.current_ip))
    }
}
