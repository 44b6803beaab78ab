//! Propagation poll
//!
//! Waits for a submitted DNS change to reach `InSync`. There is no deadline
//! and no attempt limit; a remote API that never reports `InSync` blocks the
//! caller until it is dropped.

use std::time::Duration;

use crate::error::Result;
use crate::run_log::RunLog;
use crate::traits::{ChangeId, ChangeStatus, DnsApi};

/// Polls a change id at a fixed interval until it is in sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationPoller {
    interval: Duration,
}

impl PropagationPoller {
    /// Create a poller with the given interval
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Poller with the interval from the engine settings
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until `change_id` is in sync
    ///
    /// The status is queried before the first wait, so an already propagated
    /// change returns without sleeping. A failed status query is returned
    /// as is.
    pub async fn wait_in_sync(
        &self,
        dns: &dyn DnsApi,
        change_id: &ChangeId,
        label: &str,
        log: &mut RunLog,
    ) -> Result<()> {
        loop {
            match dns.change_status(change_id).await? {
                ChangeStatus::InSync => {
                    log.record(format!("{label}: Change ID \"{change_id}\": Change IN SYNC. Done."));
                    return Ok(());
                }
                ChangeStatus::Pending => {
                    log.record(format!(
                        "{label}: Change ID \"{change_id}\": Change is still pending. (Can take a while.)"
                    ));
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}

impl Default for PropagationPoller {
    fn default() -> Self {
        Self::from_secs(10)
    }
}
