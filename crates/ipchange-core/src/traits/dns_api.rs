// # DNS API Trait
//
// Defines the interface to a hosted DNS service: create-or-replace a record
// set, ask whether a submitted change has propagated, and read a record's
// current value.
//
// ## Usage
//
// ```rust,ignore
// use ipchange_core::traits::{DnsApi, RecordChange, RecordType};
//
// let change = RecordChange::new("Z123", "home.example.com", 60, RecordType::A, "203.0.113.7");
// let change_id = api.upsert_record(&change).await?;
// while api.change_status(&change_id).await? == ChangeStatus::Pending {
//     tokio::time::sleep(Duration::from_secs(10)).await;
// }
// ```

use async_trait::async_trait;
use std::fmt;

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// Text record (carries the shared state document)
    Txt,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Txt => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A create-or-replace of a single-value record set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChange {
    /// Hosted zone id
    pub zone_id: String,
    /// Fully qualified record name
    pub name: String,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Record type
    pub record_type: RecordType,
    /// Record value
    pub value: String,
}

impl RecordChange {
    /// Create a new record change
    pub fn new(
        zone_id: impl Into<String>,
        name: impl Into<String>,
        ttl: u32,
        record_type: RecordType,
        value: impl Into<String>,
    ) -> Self {
        Self {
            zone_id: zone_id.into(),
            name: name.into(),
            ttl,
            record_type,
            value: value.into(),
        }
    }
}

/// Identifier of a submitted change, used to poll its status
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeId(pub String);

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Propagation status of a submitted change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Not yet applied on all authoritative servers
    Pending,
    /// Fully propagated
    InSync,
}

/// Trait for hosted DNS service implementations
///
/// Implementations perform exactly one remote call per method. They must not
/// retry, sleep, or wait for propagation: the engine owns the propagation
/// poll and its interval.
#[async_trait]
pub trait DnsApi: Send + Sync {
    /// Create or replace a record set (UPSERT)
    ///
    /// # Idempotency
    ///
    /// Submitting the same change twice must leave the record in the same
    /// state as submitting it once.
    ///
    /// # Returns
    ///
    /// - `Ok(ChangeId)`: Id to poll with [`DnsApi::change_status`]
    /// - `Err(Error)`: If the submission failed
    async fn upsert_record(&self, change: &RecordChange) -> Result<ChangeId, crate::Error>;

    /// Query the propagation status of a submitted change
    async fn change_status(&self, change_id: &ChangeId) -> Result<ChangeStatus, crate::Error>;

    /// Read the first value of a record set
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))`: The record exists (TXT values keep their quotes)
    /// - `Ok(None)`: No such record
    /// - `Err(Error)`: If the request failed
    async fn record_value(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<String>, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
