// # Security Group API Trait
//
// Defines the interface for adding and removing ingress permissions on a
// cloud firewall (security group).

use async_trait::async_trait;
use std::fmt;

use crate::config::{FirewallEntry, IpProtocol};

/// A single ingress permission for one CIDR block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressPermission {
    /// Protocol
    pub protocol: IpProtocol,
    /// First port
    pub from_port: u16,
    /// Last port
    pub to_port: u16,
    /// Source CIDR (e.g. `"203.0.113.7/32"`)
    pub cidr: String,
}

impl IngressPermission {
    /// Permission for the given firewall entry and CIDR
    pub fn for_entry(entry: &FirewallEntry, cidr: impl Into<String>) -> Self {
        Self {
            protocol: entry.ip_protocol,
            from_port: entry.port_range.from_port(),
            to_port: entry.port_range.to_port(),
            cidr: cidr.into(),
        }
    }
}

impl fmt::Display for IngressPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{} from {}",
            self.protocol, self.from_port, self.to_port, self.cidr
        )
    }
}

/// Trait for security group implementations
///
/// A permission that already exists must be reported as an
/// [`Error::Remote`](crate::Error::Remote) with code
/// [`DUPLICATE_PERMISSION_CODE`](crate::error::DUPLICATE_PERMISSION_CODE);
/// the firewall applier treats that as success.
#[async_trait]
pub trait SecurityGroupApi: Send + Sync {
    /// Add an ingress permission to a group
    async fn authorize(
        &self,
        group_id: &str,
        permission: &IngressPermission,
    ) -> Result<(), crate::Error>;

    /// Remove an ingress permission from a group
    async fn revoke(
        &self,
        group_id: &str,
        permission: &IngressPermission,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
