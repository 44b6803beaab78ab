// # Firewall Applier
//
// Moves security group ingress permissions from the old IP to the new one.
//
// ## Per Entry
//
// 1. Revoke `old_ip/32`, only when there was an old IP, the IP changed and no
//    instance in the shared state still claims the old IP. Revoke failures
//    are logged and swallowed so the new permission is still added.
// 2. Authorize `new_ip/32`. An already existing permission counts as success;
//    any other failure aborts the run.

use std::fmt;

use tracing::warn;

use crate::config::FirewallEntry;
use crate::error::{Result, Stage};
use crate::ip_state::IpState;
use crate::run_log::RunLog;
use crate::shared_state::SharedStateStore;
use crate::traits::{IngressPermission, SecurityGroupApi};

/// Why a revoke was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// First run, nothing to revoke
    NoOldIp,
    /// Forced run with an unchanged IP
    Unchanged,
    /// Another instance still holds the old IP
    StillClaimed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoOldIp => f.write_str("no old IP"),
            SkipReason::Unchanged => f.write_str("IP unchanged"),
            SkipReason::StillClaimed => f.write_str("old IP still claimed by another client"),
        }
    }
}

/// What happened to the old permission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    Skipped(SkipReason),
    /// The remote call failed; the permission was likely not revoked
    Failed(String),
}

/// What happened to the new permission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    Authorized,
    /// The permission already existed
    AlreadyPresent,
}

/// Result of applying one firewall entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallOutcome {
    /// Security group id
    pub group_id: String,
    pub revoke: RevokeOutcome,
    pub authorize: AuthorizeOutcome,
}

/// Applies firewall entries against a security group API
pub struct FirewallApplier<'a> {
    api: &'a dyn SecurityGroupApi,
}

impl<'a> FirewallApplier<'a> {
    pub fn new(api: &'a dyn SecurityGroupApi) -> Self {
        Self { api }
    }

    /// Apply one entry
    ///
    /// `shared` gates the revoke when multi-client coordination is enabled.
    /// Errors are returned unwrapped; [`FirewallApplier::apply_all`] adds the
    /// stage and group id.
    pub async fn apply(
        &self,
        entry: &FirewallEntry,
        ip_state: &IpState,
        shared: Option<&mut SharedStateStore<'_>>,
        log: &mut RunLog,
    ) -> Result<FirewallOutcome> {
        let revoke = self.revoke_old(entry, ip_state, shared, log).await?;
        let authorize = self.authorize_new(entry, ip_state, log).await?;

        Ok(FirewallOutcome {
            group_id: entry.group_id.clone(),
            revoke,
            authorize,
        })
    }

    /// Apply all entries in order, stopping at the first fatal failure
    pub async fn apply_all(
        &self,
        entries: &[FirewallEntry],
        ip_state: &IpState,
        mut shared: Option<&mut SharedStateStore<'_>>,
        log: &mut RunLog,
    ) -> Result<Vec<FirewallOutcome>> {
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            let outcome = self
                .apply(entry, ip_state, shared.as_deref_mut(), log)
                .await
                .map_err(|e| e.at(Stage::Firewall, entry.group_id.clone()))?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn revoke_old(
        &self,
        entry: &FirewallEntry,
        ip_state: &IpState,
        shared: Option<&mut SharedStateStore<'_>>,
        log: &mut RunLog,
    ) -> Result<RevokeOutcome> {
        let (Some(old_ip), Some(old_range)) = (ip_state.old_ip(), ip_state.old_ip_range()) else {
            return Ok(RevokeOutcome::Skipped(SkipReason::NoOldIp));
        };

        if !ip_state.changed() {
            return Ok(RevokeOutcome::Skipped(SkipReason::Unchanged));
        }

        if let Some(store) = shared {
            let claimed = store
                .is_claimed(old_ip, log)
                .await
                .map_err(|e| e.at(Stage::SharedState, store.settings().record_name.clone()))?;
            if claimed {
                log.record(format!(
                    "Firewall: Kept Security Group Rule: {entry} for Old IP: {old_ip}, still claimed by another client"
                ));
                return Ok(RevokeOutcome::Skipped(SkipReason::StillClaimed));
            }
        }

        let permission = IngressPermission::for_entry(entry, old_range);
        match self.api.revoke(&entry.group_id, &permission).await {
            Ok(()) => {
                log.record(format!(
                    "Firewall: Revoked Security Group Rule: {entry} for Old IP: {old_ip}"
                ));
                Ok(RevokeOutcome::Revoked)
            }
            Err(e) => {
                warn!(
                    "Failed to revoke {} on {} via {}: {}",
                    permission,
                    entry.group_id,
                    self.api.provider_name(),
                    e
                );
                log.record(format!(
                    "Firewall: [ACTION REQUIRED] Revoking Security Group Rule: {entry} for Old IP: {old_ip} failed. Rule was likely not revoked. Error was: {e}"
                ));
                Ok(RevokeOutcome::Failed(e.to_string()))
            }
        }
    }

    async fn authorize_new(
        &self,
        entry: &FirewallEntry,
        ip_state: &IpState,
        log: &mut RunLog,
    ) -> Result<AuthorizeOutcome> {
        let permission = IngressPermission::for_entry(entry, ip_state.new_ip_range());
        log.record(format!(
            "Firewall: START   : Adding Security Group Rule: {entry} for New IP: {}",
            ip_state.new_ip()
        ));

        let outcome = match self.api.authorize(&entry.group_id, &permission).await {
            Ok(()) => AuthorizeOutcome::Authorized,
            Err(e) if e.is_duplicate_permission() => {
                log.record(format!(
                    "Firewall: The entry: {entry} for New IP: {} was already present. No entry was added.",
                    ip_state.new_ip()
                ));
                AuthorizeOutcome::AlreadyPresent
            }
            Err(e) => {
                log.record(format!(
                    "Firewall: ERROR   : While adding the entry: {entry} for New IP: {} an error occurred: {e}",
                    ip_state.new_ip()
                ));
                return Err(e);
            }
        };

        log.record(format!(
            "Firewall: COMPLETE: Finished adding Security Group Rule: {entry} for New IP: {}",
            ip_state.new_ip()
        ));
        Ok(outcome)
    }
}
