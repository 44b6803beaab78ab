//! Per-run IP state
//!
//! Only IPv4 is supported.

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::{Error, Result};

/// Old and new external IPv4 address of one run
///
/// Addresses are kept exactly as they were observed; they are parsed only to
/// validate them. Equality between old and new is plain string equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpState {
    old_ip: Option<String>,
    new_ip: String,
    force_update: bool,
}

impl IpState {
    /// Build the state for a run
    ///
    /// A blank `old_ip` is treated as absent (first run).
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] if either present address is not an IPv4 literal.
    pub fn new(old_ip: Option<&str>, new_ip: &str, force_update: bool) -> Result<Self> {
        let old_ip = match old_ip.map(str::trim) {
            Some(ip) if !ip.is_empty() => Some(validate_ipv4("old", ip)?),
            _ => None,
        };

        let new_ip = new_ip.trim();
        if new_ip.is_empty() {
            return Err(Error::validation("The new IP address is required"));
        }
        let new_ip = validate_ipv4("new", new_ip)?;

        Ok(Self {
            old_ip,
            new_ip,
            force_update,
        })
    }

    /// Previous IP, absent on the first run
    pub fn old_ip(&self) -> Option<&str> {
        self.old_ip.as_deref()
    }

    /// Current IP
    pub fn new_ip(&self) -> &str {
        &self.new_ip
    }

    /// Whether the update was forced
    pub fn force_update(&self) -> bool {
        self.force_update
    }

    /// Whether the new IP differs from the old one
    pub fn changed(&self) -> bool {
        self.old_ip.as_deref() != Some(self.new_ip.as_str())
    }

    /// Whether there is an old IP
    pub fn has_old_ip(&self) -> bool {
        self.old_ip.is_some()
    }

    /// Old IP as a single-host CIDR (e.g. `"192.168.1.1/32"`)
    pub fn old_ip_range(&self) -> Option<String> {
        self.old_ip.as_ref().map(|ip| format!("{ip}/32"))
    }

    /// New IP as a single-host CIDR (e.g. `"192.168.1.2/32"`)
    pub fn new_ip_range(&self) -> String {
        format!("{}/32", self.new_ip)
    }
}

impl fmt::Display for IpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Old IP: {}, New IP: {}, Changed: {}, Force Update: {}",
            self.old_ip.as_deref().unwrap_or(""),
            self.new_ip,
            self.changed(),
            self.force_update
        )
    }
}

fn validate_ipv4(which: &str, value: &str) -> Result<String> {
    value.parse::<Ipv4Addr>().map_err(|_| {
        Error::validation(format!(
            "The {which} IP input value \"{value}\" is not a valid IPv4 address"
        ))
    })?;
    Ok(value.to_string())
}
