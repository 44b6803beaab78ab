//! Remote appliers
//!
//! Idempotent writes against the external DNS and security group APIs.

pub mod dns;
pub mod firewall;
pub mod poll;

pub use dns::{DnsApplier, DnsOutcome};
pub use firewall::{AuthorizeOutcome, FirewallApplier, FirewallOutcome, RevokeOutcome, SkipReason};
pub use poll::PropagationPoller;
