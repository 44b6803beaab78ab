//! Configuration types for the IP change pipeline
//!
//! This module defines all configuration structures used throughout the crate.
//! Configuration is read-only to the pipeline: it is loaded once through a
//! [`ConfigProvider`](crate::traits::ConfigProvider) and validated before the
//! engine is constructed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::traits::ConfigProvider;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpChangeConfig {
    /// Account credentials and region
    pub base: BaseSettings,

    /// DNS hosts to point at the new IP
    #[serde(default)]
    pub dns_hosts: Vec<DnsHost>,

    /// Security group ingress entries to move to the new IP
    #[serde(default)]
    pub firewall_entries: Vec<FirewallEntry>,

    /// Operator notifications
    #[serde(default)]
    pub notifications: Option<NotificationSettings>,

    /// Multi-instance coordination through a shared TXT record
    #[serde(default)]
    pub multi_client: Option<MultiClientSettings>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl IpChangeConfig {
    /// Create a configuration with the given base settings and nothing to update
    pub fn new(base: BaseSettings) -> Self {
        Self {
            base,
            dns_hosts: Vec::new(),
            firewall_entries: Vec::new(),
            notifications: None,
            multi_client: None,
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;

        for host in &self.dns_hosts {
            host.validate()?;
        }

        for entry in &self.firewall_entries {
            entry.validate()?;
        }

        if let Some(notifications) = &self.notifications {
            notifications.validate()?;
        }

        if let Some(multi_client) = &self.multi_client {
            multi_client.validate()?;
        }

        self.engine.validate()
    }

    /// Comma separated list of the configured DNS host names
    pub fn host_names(&self) -> String {
        self.dns_hosts
            .iter()
            .map(|h| h.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Account credentials and region
///
/// The Debug implementation intentionally does NOT expose the secret key.
#[derive(Clone, Serialize, Deserialize)]
pub struct BaseSettings {
    /// Access key id for the remote account
    pub access_key_id: String,

    /// Secret access key for the remote account
    /// ⚠️ NEVER log this value
    pub secret_access_key: String,

    /// Region to perform the changes in (e.g. "eu-west-1")
    pub region: String,
}

impl fmt::Debug for BaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseSettings")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<REDACTED>")
            .field("region", &self.region)
            .finish()
    }
}

impl BaseSettings {
    /// Validate the base settings
    pub fn validate(&self) -> Result<()> {
        if self.access_key_id.trim().is_empty()
            || self.secret_access_key.trim().is_empty()
            || self.region.trim().is_empty()
        {
            return Err(Error::validation(
                "Base settings must have non-empty access_key_id, secret_access_key and region",
            ));
        }
        Ok(())
    }
}

/// A DNS host to point at the new IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsHost {
    /// Hosted zone containing the record
    pub zone_id: String,

    /// Fully qualified record name
    pub name: String,

    /// Record TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

impl DnsHost {
    /// Create a new DNS host with the default TTL
    pub fn new(zone_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            zone_id: zone_id.into(),
            name: name.into(),
            ttl: default_ttl(),
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.zone_id.trim().is_empty() || self.name.trim().is_empty() {
            return Err(Error::validation(format!(
                "DNS host needs both zone_id and name (got zone_id='{}', name='{}')",
                self.zone_id, self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Display for DnsHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZoneId: {}, Name: {}, TTL: {}", self.zone_id, self.name, self.ttl)
    }
}

fn default_ttl() -> u32 {
    60
}

/// Ingress protocol of a firewall entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpProtocol {
    /// TCP
    #[default]
    Tcp,
    /// UDP
    Udp,
    /// ICMP (ports carry type/code)
    Icmp,
}

impl IpProtocol {
    /// Wire name of the protocol
    pub fn as_str(&self) -> &'static str {
        match self {
            IpProtocol::Tcp => "tcp",
            IpProtocol::Udp => "udp",
            IpProtocol::Icmp => "icmp",
        }
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive port range, written as `"25"` or `"5985-5986"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortRange {
    from_port: u16,
    to_port: u16,
}

impl PortRange {
    /// Create a port range; fails when `to_port < from_port`
    pub fn new(from_port: u16, to_port: u16) -> Result<Self> {
        if to_port < from_port {
            return Err(Error::validation(format!(
                "Port range must satisfy to_port >= from_port (got {from_port}-{to_port})"
            )));
        }
        Ok(Self { from_port, to_port })
    }

    /// A range covering a single port
    pub fn single(port: u16) -> Self {
        Self {
            from_port: port,
            to_port: port,
        }
    }

    /// Parse `"25"` or `"5985-5986"`
    ///
    /// Numeric parts are sorted, so `"5986-5985"` yields `5985-5986`.
    pub fn parse(input: &str) -> Result<Self> {
        let mut ports = input
            .split('-')
            .map(|part| part.trim().parse::<u16>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::validation(format!("Invalid port range: '{input}'")))?;

        ports.sort_unstable();
        match ports.as_slice() {
            [port] => Ok(Self::single(*port)),
            [from, to] => Self::new(*from, *to),
            _ => Err(Error::validation(format!("Invalid port range: '{input}'"))),
        }
    }

    /// First port of the range
    pub fn from_port(&self) -> u16 {
        self.from_port
    }

    /// Last port of the range
    pub fn to_port(&self) -> u16 {
        self.to_port
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from_port == self.to_port {
            write!(f, "{}", self.from_port)
        } else {
            write!(f, "{}-{}", self.from_port, self.to_port)
        }
    }
}

impl TryFrom<String> for PortRange {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PortRange> for String {
    fn from(range: PortRange) -> Self {
        range.to_string()
    }
}

/// A security group ingress entry to move to the new IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallEntry {
    /// Security group id
    pub group_id: String,

    /// Ports covered by the rule
    pub port_range: PortRange,

    /// Protocol of the rule
    #[serde(default)]
    pub ip_protocol: IpProtocol,

    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
}

impl FirewallEntry {
    /// Create a TCP entry
    pub fn new(group_id: impl Into<String>, port_range: PortRange) -> Self {
        Self {
            group_id: group_id.into(),
            port_range,
            ip_protocol: IpProtocol::Tcp,
            description: None,
        }
    }

    /// Set the protocol
    pub fn with_protocol(mut self, ip_protocol: IpProtocol) -> Self {
        self.ip_protocol = ip_protocol;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.group_id.trim().is_empty() {
            return Err(Error::validation("Firewall entry group_id cannot be empty"));
        }
        Ok(())
    }
}

impl fmt::Display for FirewallEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GroupId: {}, PortRange: {}, Protocol: {}",
            self.group_id, self.port_range, self.ip_protocol
        )
    }
}

/// Notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Settings for sending e-mail
    #[serde(default)]
    pub email: Option<EmailConfig>,

    /// Recipients to notify
    #[serde(default)]
    pub recipients: Vec<Recipient>,

    /// What a failed send does to the rest of the run
    #[serde(default)]
    pub delivery_policy: DeliveryPolicy,
}

impl NotificationSettings {
    /// Validate the notification settings
    pub fn validate(&self) -> Result<()> {
        let has_email_recipients = self
            .recipients
            .iter()
            .any(|r| matches!(r.channel, Channel::Email { .. }));

        match &self.email {
            None if has_email_recipients => Err(Error::validation(
                "Cannot notify e-mail recipients when there is no e-mail config",
            )),
            Some(email) => email.validate(),
            None => Ok(()),
        }
    }
}

/// What a failed notification send does to the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// Log the failure and keep notifying the remaining recipients
    #[default]
    BestEffort,
    /// Stop at the first failure and abort the run
    FailFast,
}

/// SMTP settings for e-mail notifications
///
/// The Debug implementation intentionally does NOT expose the password.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP server host name
    pub smtp_server: String,

    /// SMTP server port (25 is plain, anything else implies TLS)
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Username to authenticate with
    #[serde(default)]
    pub username: Option<String>,

    /// Password to authenticate with
    #[serde(default)]
    pub password: Option<String>,

    /// Account domain (Windows AD style), rarely needed
    #[serde(default)]
    pub domain: Option<String>,

    /// Sender address, optionally with a display name
    pub from: String,

    /// Prefix for the subject line
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: Option<String>,

    /// Operator message inserted into every notification body
    #[serde(default)]
    pub optional_message: Option<String>,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .field("domain", &self.domain)
            .field("from", &self.from)
            .field("subject_prefix", &self.subject_prefix)
            .finish()
    }
}

impl EmailConfig {
    /// Create an e-mail config with defaults for everything but server and sender
    pub fn new(smtp_server: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            smtp_server: smtp_server.into(),
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            domain: None,
            from: from.into(),
            subject_prefix: default_subject_prefix(),
            optional_message: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.smtp_server.trim().is_empty() {
            return Err(Error::validation("E-mail config smtp_server cannot be empty"));
        }
        if self.from.trim().is_empty() {
            return Err(Error::validation("E-mail config from cannot be empty"));
        }
        Ok(())
    }
}

fn default_smtp_port() -> u16 {
    25
}

fn default_subject_prefix() -> Option<String> {
    Some("[CLIENT TO AWS WORKER]".to_string())
}

/// A notification recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// How and what to send
    pub channel: Channel,

    /// Address of the recipient (e.g. an e-mail address)
    pub address: String,

    /// Display name of the recipient
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Recipient {
    /// Create an e-mail recipient
    pub fn email(address: impl Into<String>, content: ContentType) -> Self {
        Self {
            channel: Channel::Email { content },
            address: address.into(),
            display_name: None,
        }
    }

    /// The content type this recipient receives
    pub fn content(&self) -> ContentType {
        match self.channel {
            Channel::Email { content } => content,
        }
    }

    /// Display name, falling back to the address
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.address)
    }
}

/// Notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Channel {
    /// E-mail notification
    Email {
        /// Which message to send
        content: ContentType,
    },
}

/// Which message a recipient receives
///
/// Ordered by sensitivity: summaries are sent before full messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Host names and old/new IP only
    Summary,
    /// Summary plus the full run log (may contain confidential details)
    Full,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Summary => f.write_str("summary"),
            ContentType::Full => f.write_str("full"),
        }
    }
}

/// Multi-instance coordination settings
///
/// The Debug implementation intentionally does NOT expose the password.
#[derive(Clone, Serialize, Deserialize)]
pub struct MultiClientSettings {
    /// Name this instance claims in the shared document
    pub client_name: String,

    /// Hosted zone of the shared TXT record
    pub zone_id: String,

    /// Name of the shared TXT record
    pub record_name: String,

    /// Whether the shared document is encrypted
    #[serde(default = "default_use_encryption")]
    pub use_encryption: bool,

    /// Password the shared document is encrypted with
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for MultiClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiClientSettings")
            .field("client_name", &self.client_name)
            .field("zone_id", &self.zone_id)
            .field("record_name", &self.record_name)
            .field("use_encryption", &self.use_encryption)
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl MultiClientSettings {
    /// Create encrypted multi-client settings
    pub fn new(
        client_name: impl Into<String>,
        zone_id: impl Into<String>,
        record_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            zone_id: zone_id.into(),
            record_name: record_name.into(),
            use_encryption: true,
            password: Some(password.into()),
        }
    }

    /// Validate the multi-client settings
    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            return Err(Error::validation("Multi-client client_name must not be blank"));
        }
        if self.zone_id.trim().is_empty() {
            return Err(Error::validation("Multi-client zone_id must be set"));
        }
        if self.record_name.trim().is_empty() {
            return Err(Error::validation("Multi-client record_name must be set"));
        }
        if self.use_encryption && self.password.as_deref().is_none_or(|p| p.trim().is_empty()) {
            return Err(Error::validation(
                "Multi-client password must be set when use_encryption is true",
            ));
        }
        Ok(())
    }
}

fn default_use_encryption() -> bool {
    true
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between propagation status polls (in seconds)
    ///
    /// There is no deadline: an unresponsive API blocks the run.
    #[serde(default = "default_propagation_poll_interval_secs")]
    pub propagation_poll_interval_secs: u64,

    /// TTL of the shared state TXT record (in seconds)
    #[serde(default = "default_shared_state_ttl")]
    pub shared_state_ttl: u32,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    fn validate(&self) -> Result<()> {
        if self.event_channel_capacity == 0 {
            return Err(Error::validation("event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            propagation_poll_interval_secs: default_propagation_poll_interval_secs(),
            shared_state_ttl: default_shared_state_ttl(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_propagation_poll_interval_secs() -> u64 {
    10
}

fn default_shared_state_ttl() -> u32 {
    300
}

fn default_event_channel_capacity() -> usize {
    100
}

/// Loads [`IpChangeConfig`] from a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileConfigProvider {
    path: PathBuf,
}

impl JsonFileConfigProvider {
    /// Create a provider for the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ConfigProvider for JsonFileConfigProvider {
    fn load(&self) -> Result<IpChangeConfig> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let config: IpChangeConfig = serde_json::from_str(&content).map_err(|e| {
            Error::config(format!(
                "Failed to parse config file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }
}
