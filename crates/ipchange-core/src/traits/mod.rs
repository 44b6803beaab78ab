//! Collaborator traits for the IP change pipeline
//!
//! This module defines the abstract interfaces the engine drives.
//!
//! - [`ExternalIpSource`]: Discover the current public IPv4 address
//! - [`DnsApi`]: Upsert DNS records and poll their propagation
//! - [`SecurityGroupApi`]: Authorize/revoke firewall ingress permissions
//! - [`MailSender`]: Deliver operator notifications
//! - [`IpLogStore`]: Persist the authoritative current IP and its history
//! - [`ConfigProvider`]: Load the configuration

pub mod ip_source;
pub mod dns_api;
pub mod security_group;
pub mod mail;
pub mod ip_log;

pub use ip_source::ExternalIpSource;
pub use dns_api::{ChangeId, ChangeStatus, DnsApi, RecordChange, RecordType};
pub use security_group::{IngressPermission, SecurityGroupApi};
pub use mail::{MailMessage, MailSender};
pub use ip_log::{IpLogEntry, IpLogSnapshot, IpLogStore};

/// Loads the configuration once at startup
pub trait ConfigProvider {
    /// Load and validate the configuration
    fn load(&self) -> Result<crate::config::IpChangeConfig, crate::Error>;
}
