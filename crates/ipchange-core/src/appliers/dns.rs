// # DNS Applier
//
// Points every configured host's A record at the new IP.
//
// Each host is upserted and then polled until the change is in sync before
// the next host is touched. The first failure aborts the remaining hosts.

use crate::config::DnsHost;
use crate::error::{Result, Stage};
use crate::ip_state::IpState;
use crate::run_log::RunLog;
use crate::traits::{ChangeId, DnsApi, RecordChange, RecordType};

use super::PropagationPoller;

/// Result of updating one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsOutcome {
    /// Host name
    pub host: String,
    /// Id of the propagated change
    pub change_id: ChangeId,
}

/// Upserts A records for the configured hosts
pub struct DnsApplier<'a> {
    dns: &'a dyn DnsApi,
    poller: PropagationPoller,
}

impl<'a> DnsApplier<'a> {
    pub fn new(dns: &'a dyn DnsApi, poller: PropagationPoller) -> Self {
        Self { dns, poller }
    }

    /// Update one host and wait for propagation
    ///
    /// Errors are returned unwrapped; [`DnsApplier::apply_all`] adds the
    /// stage and host.
    pub async fn apply(
        &self,
        host: &DnsHost,
        ip_state: &IpState,
        log: &mut RunLog,
    ) -> Result<DnsOutcome> {
        log.record(format!(
            "DNS: Starting item: {host}, new IP address: {}",
            ip_state.new_ip()
        ));

        let change = RecordChange::new(
            host.zone_id.clone(),
            host.name.clone(),
            host.ttl,
            RecordType::A,
            ip_state.new_ip(),
        );

        let change_id = self.dns.upsert_record(&change).await?;
        log.record(format!(
            "DNS: Change ID \"{change_id}\": ChangeRequest was submitted to {}.",
            self.dns.provider_name()
        ));

        self.poller
            .wait_in_sync(self.dns, &change_id, "DNS", log)
            .await?;

        Ok(DnsOutcome {
            host: host.name.clone(),
            change_id,
        })
    }

    /// Update all hosts in order, stopping at the first failure
    pub async fn apply_all(
        &self,
        hosts: &[DnsHost],
        ip_state: &IpState,
        log: &mut RunLog,
    ) -> Result<Vec<DnsOutcome>> {
        let mut outcomes = Vec::with_capacity(hosts.len());
        for host in hosts {
            let outcome = self
                .apply(host, ip_state, log)
                .await
                .map_err(|e| e.at(Stage::Dns, host.name.clone()))?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}
