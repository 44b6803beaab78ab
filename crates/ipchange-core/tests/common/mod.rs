//! Test doubles and common utilities for pipeline contract tests
//!
//! Every double is a cheap handle around shared state: clone it, hand one
//! clone to the engine and keep the other to inspect calls afterwards.

#![allow(dead_code)]

use ipchange_core::config::{BaseSettings, DnsHost, FirewallEntry, IpChangeConfig, PortRange};
use ipchange_core::engine::Collaborators;
use ipchange_core::error::{DUPLICATE_PERMISSION_CODE, Error, Result};
use ipchange_core::ip_log::MemoryIpLog;
use ipchange_core::traits::{
    ChangeId, ChangeStatus, DnsApi, ExternalIpSource, IngressPermission, MailMessage, MailSender,
    RecordChange, RecordType, SecurityGroupApi,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// An IP source returning a fixed address
#[derive(Clone)]
pub struct FixedIpSource {
    ip: Arc<Mutex<String>>,
    fail: bool,
    call_count: Arc<AtomicUsize>,
}

impl FixedIpSource {
    pub fn new(ip: &str) -> Self {
        Self {
            ip: Arc::new(Mutex::new(ip.to_string())),
            fail: false,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source whose lookups always fail
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    /// Change the address returned by subsequent calls
    pub fn set_ip(&self, ip: &str) {
        *self.ip.lock().unwrap() = ip.to_string();
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ExternalIpSource for FixedIpSource {
    async fn current(&self) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::ip_source("lookup failed"));
        }
        Ok(self.ip.lock().unwrap().clone())
    }

    fn source_name(&self) -> &'static str {
        "fixed"
    }
}

/// A mock DNS API that records upserts and keeps record values
#[derive(Clone, Default)]
pub struct MockDnsApi {
    records: Arc<Mutex<HashMap<(String, String, RecordType), String>>>,
    upserts: Arc<Mutex<Vec<RecordChange>>>,
    remaining_pending: Arc<Mutex<HashMap<String, usize>>>,
    status_calls: Arc<AtomicUsize>,
    pending_polls: usize,
    stalled: bool,
    failing_name: Option<String>,
    failing_status: bool,
}

impl MockDnsApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `Pending` this many times for every change before `InSync`
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Never report `InSync`
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    /// Fail upserts of records with this name
    pub fn failing_upsert_for(mut self, name: &str) -> Self {
        self.failing_name = Some(name.to_string());
        self
    }

    /// Fail every status query
    pub fn failing_status(mut self) -> Self {
        self.failing_status = true;
        self
    }

    /// Seed a TXT record value
    pub fn set_txt(&self, zone_id: &str, name: &str, value: &str) {
        self.records
            .lock()
            .unwrap()
            .insert((zone_id.to_string(), name.to_string(), RecordType::Txt), value.to_string());
    }

    pub fn txt(&self, zone_id: &str, name: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .get(&(zone_id.to_string(), name.to_string(), RecordType::Txt))
            .cloned()
    }

    pub fn upserts(&self) -> Vec<RecordChange> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn upserts_of(&self, record_type: RecordType) -> Vec<RecordChange> {
        self.upserts()
            .into_iter()
            .filter(|c| c.record_type == record_type)
            .collect()
    }

    pub fn status_call_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DnsApi for MockDnsApi {
    async fn upsert_record(&self, change: &RecordChange) -> Result<ChangeId> {
        if self.failing_name.as_deref() == Some(change.name.as_str()) {
            return Err(Error::remote("route53", "InvalidChangeBatch"));
        }

        let id = {
            let mut upserts = self.upserts.lock().unwrap();
            upserts.push(change.clone());
            format!("/change/C{}", upserts.len())
        };

        self.records.lock().unwrap().insert(
            (change.zone_id.clone(), change.name.clone(), change.record_type),
            change.value.clone(),
        );
        self.remaining_pending
            .lock()
            .unwrap()
            .insert(id.clone(), self.pending_polls);

        Ok(ChangeId(id))
    }

    async fn change_status(&self, change_id: &ChangeId) -> Result<ChangeStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_status {
            return Err(Error::remote("route53", "Throttling"));
        }
        if self.stalled {
            return Ok(ChangeStatus::Pending);
        }

        let mut remaining = self.remaining_pending.lock().unwrap();
        match remaining.get_mut(&change_id.0) {
            Some(n) if *n > 0 => {
                *n -= 1;
                Ok(ChangeStatus::Pending)
            }
            _ => Ok(ChangeStatus::InSync),
        }
    }

    async fn record_value(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<String>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(zone_id.to_string(), name.to_string(), record_type))
            .cloned())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A recorded security group call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SgCall {
    Authorize {
        group_id: String,
        permission: IngressPermission,
    },
    Revoke {
        group_id: String,
        permission: IngressPermission,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum AuthorizeMode {
    #[default]
    Succeed,
    Duplicate,
    Fail,
}

/// A mock security group API that records calls
#[derive(Clone, Default)]
pub struct MockSecurityGroupApi {
    calls: Arc<Mutex<Vec<SgCall>>>,
    authorize_mode: AuthorizeMode,
    revoke_fails: bool,
}

impl MockSecurityGroupApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject authorizations as already existing
    pub fn with_duplicate_authorize(mut self) -> Self {
        self.authorize_mode = AuthorizeMode::Duplicate;
        self
    }

    /// Reject authorizations with an unrelated error
    pub fn with_failing_authorize(mut self) -> Self {
        self.authorize_mode = AuthorizeMode::Fail;
        self
    }

    pub fn with_failing_revoke(mut self) -> Self {
        self.revoke_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<SgCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn authorized_cidrs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SgCall::Authorize { permission, .. } => Some(permission.cidr),
                SgCall::Revoke { .. } => None,
            })
            .collect()
    }

    pub fn revoked_cidrs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SgCall::Revoke { permission, .. } => Some(permission.cidr),
                SgCall::Authorize { .. } => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl SecurityGroupApi for MockSecurityGroupApi {
    async fn authorize(&self, group_id: &str, permission: &IngressPermission) -> Result<()> {
        self.calls.lock().unwrap().push(SgCall::Authorize {
            group_id: group_id.to_string(),
            permission: permission.clone(),
        });

        match self.authorize_mode {
            AuthorizeMode::Succeed => Ok(()),
            AuthorizeMode::Duplicate => Err(Error::remote_with_code(
                "ec2",
                DUPLICATE_PERMISSION_CODE.to_lowercase(),
                "the specified rule already exists",
            )),
            AuthorizeMode::Fail => Err(Error::remote_with_code(
                "ec2",
                "InvalidGroup.NotFound",
                "the security group does not exist",
            )),
        }
    }

    async fn revoke(&self, group_id: &str, permission: &IngressPermission) -> Result<()> {
        self.calls.lock().unwrap().push(SgCall::Revoke {
            group_id: group_id.to_string(),
            permission: permission.clone(),
        });

        if self.revoke_fails {
            return Err(Error::remote_with_code(
                "ec2",
                "InvalidPermission.NotFound",
                "the specified rule does not exist",
            ));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A mock mail sender that records messages
#[derive(Clone, Default)]
pub struct MockMailSender {
    sent: Arc<Mutex<Vec<MailMessage>>>,
    attempts: Arc<Mutex<Vec<String>>>,
    failing: Vec<String>,
}

impl MockMailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail sends to this address
    pub fn failing_for(mut self, address: &str) -> Self {
        self.failing.push(address.to_string());
        self
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Every address a send was attempted to, in order
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MailSender for MockMailSender {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        self.attempts.lock().unwrap().push(message.to.clone());
        if self.failing.contains(&message.to) {
            return Err(Error::notification(format!("mailbox {} unavailable", message.to)));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Handles to every double wired into an engine
#[derive(Clone, Default)]
pub struct Doubles {
    pub ip_source: Option<FixedIpSource>,
    pub dns: MockDnsApi,
    pub security_groups: MockSecurityGroupApi,
    pub mailer: MockMailSender,
    pub ip_log: MemoryIpLog,
}

impl Doubles {
    /// Doubles for a host whose last recorded IP is `old_ip` and whose
    /// current IP is `new_ip`
    pub fn new(old_ip: Option<&str>, new_ip: &str) -> Self {
        Self {
            ip_source: Some(FixedIpSource::new(new_ip)),
            ip_log: old_ip.map(MemoryIpLog::with_current).unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn ip_source(&self) -> FixedIpSource {
        self.ip_source
            .clone()
            .unwrap_or_else(|| FixedIpSource::new("10.0.0.1"))
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            ip_source: Box::new(self.ip_source()),
            dns: Box::new(self.dns.clone()),
            security_groups: Box::new(self.security_groups.clone()),
            mailer: Box::new(self.mailer.clone()),
            ip_log: Box::new(self.ip_log.clone()),
        }
    }
}

pub fn base_settings() -> BaseSettings {
    BaseSettings {
        access_key_id: "AKIDEXAMPLE".to_string(),
        secret_access_key: "wJalrXUtnFEMI".to_string(),
        region: "eu-west-1".to_string(),
    }
}

/// Config with one DNS host and one firewall entry on port 3389
pub fn minimal_config() -> IpChangeConfig {
    let mut config = IpChangeConfig::new(base_settings());
    config.dns_hosts = vec![DnsHost::new("Z123", "home.example.com")];
    config.firewall_entries = vec![FirewallEntry::new("sg-0001", PortRange::single(3389))];
    config
}
