// # Dry-Run Collaborators
//
// Stand-ins for the remote backends that log the intended calls instead of
// performing them.
//
// - `DryRunDnsApi` keeps records in memory; every change is immediately in
//   sync, so shared state written in one run can be read back in the same
//   process.
// - `DryRunSecurityGroupApi` accepts every authorize and revoke.
// - `LogMailSender` logs messages instead of sending them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::info;

use crate::Error;
use crate::traits::{
    ChangeId, ChangeStatus, DnsApi, IngressPermission, MailMessage, MailSender, RecordChange,
    RecordType, SecurityGroupApi,
};

type RecordKey = (String, String, RecordType);

/// DNS API that keeps records in memory
#[derive(Debug, Default)]
pub struct DryRunDnsApi {
    records: RwLock<HashMap<RecordKey, String>>,
    next_change: AtomicU64,
}

impl DryRunDnsApi {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DnsApi for DryRunDnsApi {
    async fn upsert_record(&self, change: &RecordChange) -> Result<ChangeId, Error> {
        let id = self.next_change.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "[DRY-RUN] Would UPSERT {} {} (zone {}, ttl {}) -> {}",
            change.record_type, change.name, change.zone_id, change.ttl, change.value
        );

        self.records.write().await.insert(
            (change.zone_id.clone(), change.name.to_lowercase(), change.record_type),
            change.value.clone(),
        );
        Ok(ChangeId(format!("/change/DRYRUN{id}")))
    }

    async fn change_status(&self, _change_id: &ChangeId) -> Result<ChangeStatus, Error> {
        Ok(ChangeStatus::InSync)
    }

    async fn record_value(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<String>, Error> {
        let key = (zone_id.to_string(), name.to_lowercase(), record_type);
        Ok(self.records.read().await.get(&key).cloned())
    }

    fn provider_name(&self) -> &'static str {
        "dry-run"
    }
}

/// Security group API that accepts everything
#[derive(Debug, Default)]
pub struct DryRunSecurityGroupApi;

#[async_trait]
impl SecurityGroupApi for DryRunSecurityGroupApi {
    async fn authorize(&self, group_id: &str, permission: &IngressPermission) -> Result<(), Error> {
        info!("[DRY-RUN] Would authorize {} on {}", permission, group_id);
        Ok(())
    }

    async fn revoke(&self, group_id: &str, permission: &IngressPermission) -> Result<(), Error> {
        info!("[DRY-RUN] Would revoke {} on {}", permission, group_id);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "dry-run"
    }
}

/// Mail sender that logs messages
#[derive(Debug, Default)]
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, message: &MailMessage) -> Result<(), Error> {
        info!(
            "[DRY-RUN] Would send mail from {} to {}: {}",
            message.from, message.to, message.subject
        );
        Ok(())
    }
}
