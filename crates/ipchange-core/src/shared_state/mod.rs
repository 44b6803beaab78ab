// # Shared State Store
//
// Lets several instances that represent one logical identity publish their
// current IP into one document, stored in a single DNS TXT record.
//
// ## Purpose
//
// Before the firewall applier revokes the old IP it asks the store whether
// another instance still claims that IP. Only unclaimed IPs are revoked.
//
// ## Consistency
//
// The document has no version or revision token. Two instances that save
// from the same snapshot race, and the later write silently discards the
// earlier one. Callers that need stronger guarantees must serialize runs
// externally.
//
// ## Lifecycle
//
// The document is fetched lazily on first access, memoized for the rest of
// the run, mutated in memory and written back with [`SharedStateStore::save`].

pub mod cipher;
pub mod codec;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::appliers::PropagationPoller;
use crate::config::MultiClientSettings;
use crate::error::{Error, Result};
use crate::ip_state::IpState;
use crate::run_log::RunLog;
use crate::traits::{DnsApi, RecordChange, RecordType};

/// One instance's claim in the shared document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiClientEntry {
    /// Instance name, unique ignoring case
    pub name: String,
    /// IP the instance currently holds
    pub ip: String,
    /// When the claim was last written
    pub updated_on_utc: DateTime<Utc>,
}

impl MultiClientEntry {
    pub fn new(name: impl Into<String>, ip: impl Into<String>, updated_on_utc: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            ip: ip.into(),
            updated_on_utc,
        }
    }

    fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

impl fmt::Display for MultiClientEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Name: {}, IP: {}, Updated: {}",
            self.name,
            self.ip,
            self.updated_on_utc.to_rfc3339()
        )
    }
}

/// Shared document store backed by a DNS TXT record
///
/// Borrows the DNS API for the duration of a run.
pub struct SharedStateStore<'a> {
    dns: &'a dyn DnsApi,
    settings: MultiClientSettings,
    ttl: u32,
    poller: PropagationPoller,
    entries: Option<Vec<MultiClientEntry>>,
}

impl<'a> SharedStateStore<'a> {
    /// Create a store for the given settings
    ///
    /// # Parameters
    ///
    /// - `dns`: DNS API holding the TXT record
    /// - `settings`: Record location, instance name and password
    /// - `ttl`: TTL of the TXT record when saving
    /// - `poller`: Propagation poll used after saving
    pub fn new(
        dns: &'a dyn DnsApi,
        settings: MultiClientSettings,
        ttl: u32,
        poller: PropagationPoller,
    ) -> Self {
        Self {
            dns,
            settings,
            ttl,
            poller,
            entries: None,
        }
    }

    /// Settings this store was created with
    pub fn settings(&self) -> &MultiClientSettings {
        &self.settings
    }

    fn password(&self) -> Option<&str> {
        if self.settings.use_encryption {
            self.settings.password.as_deref()
        } else {
            None
        }
    }

    /// Read and decode the document from DNS, bypassing the memoized copy
    ///
    /// A missing or blank record is an empty document. Any decode failure is
    /// fatal.
    pub async fn fetch(&self, log: &mut RunLog) -> Result<Vec<MultiClientEntry>> {
        log.record("Shared state: Starting fetch of clients");

        let value = self
            .dns
            .record_value(&self.settings.zone_id, &self.settings.record_name, RecordType::Txt)
            .await?;

        let value = match value {
            Some(value) if !value.trim().is_empty() => value,
            _ => {
                log.record("Shared state: Found no existing record");
                return Ok(Vec::new());
            }
        };

        let json = codec::decode(&value, self.password())?;
        let entries = parse_entries(&json)?;

        log.record(format!("Shared state: Completed fetch. Got {} clients", entries.len()));
        Ok(entries)
    }

    async fn loaded(&mut self, log: &mut RunLog) -> Result<&mut Vec<MultiClientEntry>> {
        if self.entries.is_none() {
            self.entries = Some(self.fetch(log).await?);
        }
        Ok(self.entries.get_or_insert_with(Vec::new))
    }

    /// All entries, fetched on first access
    pub async fn clients(&mut self, log: &mut RunLog) -> Result<&[MultiClientEntry]> {
        Ok(self.loaded(log).await?.as_slice())
    }

    /// Insert or update the entry with the same name (ignoring case)
    ///
    /// Only the in-memory document changes; call [`SharedStateStore::save`]
    /// to publish it.
    pub async fn upsert(&mut self, entry: MultiClientEntry, log: &mut RunLog) -> Result<()> {
        let entries = self.loaded(log).await?;

        match entries.iter_mut().find(|e| e.has_name(&entry.name)) {
            Some(existing) => {
                existing.ip = entry.ip;
                existing.updated_on_utc = entry.updated_on_utc;
                log.record(format!("Shared state: Updated existing client entry: {existing}"));
            }
            None => {
                log.record(format!("Shared state: Created new client entry: {entry}"));
                entries.push(entry);
            }
        }

        Ok(())
    }

    /// Whether any instance claims `ip`
    pub async fn is_claimed(&mut self, ip: &str, log: &mut RunLog) -> Result<bool> {
        Ok(self.loaded(log).await?.iter().any(|e| e.ip == ip))
    }

    /// Publish the whole document and wait for it to propagate
    pub async fn save(&mut self, log: &mut RunLog) -> Result<()> {
        log.record("Shared state: Starting save of clients");

        let entries = self.loaded(log).await?;
        let json = if entries.is_empty() {
            log.record("Shared state: Had no clients");
            String::new()
        } else {
            log.record(format!("Shared state: Found {} clients", entries.len()));
            serde_json::to_string(&*entries)?
        };
        let count = entries.len();

        let value = codec::encode(&json, self.password())?;
        let change = RecordChange::new(
            self.settings.zone_id.clone(),
            self.settings.record_name.clone(),
            self.ttl,
            RecordType::Txt,
            value,
        );

        let change_id = self.dns.upsert_record(&change).await?;
        log.record(format!(
            "Shared state: Change ID \"{change_id}\": ChangeRequest was submitted to {}.",
            self.dns.provider_name()
        ));

        self.poller
            .wait_in_sync(self.dns, &change_id, "Shared state", log)
            .await?;

        log.record(format!("Shared state: Completed save of {count} clients"));
        Ok(())
    }

    /// Claim `ip_state.new_ip()` for this instance and publish the document
    pub async fn claim(&mut self, ip_state: &IpState, log: &mut RunLog) -> Result<()> {
        let entry = MultiClientEntry::new(
            self.settings.client_name.clone(),
            ip_state.new_ip(),
            Utc::now(),
        );
        self.upsert(entry, log).await?;
        self.save(log).await
    }
}

fn parse_entries(json: &str) -> Result<Vec<MultiClientEntry>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json)
        .map_err(|e| Error::shared_state(format!("Shared state is not a valid client list: {e}")))
}
