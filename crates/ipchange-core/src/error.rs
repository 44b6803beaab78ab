//! Error types for the IP change pipeline
//!
//! This module defines all error types used throughout the crate.

use std::fmt;
use thiserror::Error;

/// Result type alias for IP change operations
pub type Result<T> = std::result::Result<T, Error>;

/// Remote error code returned by security group APIs when the permission
/// being authorized already exists.
pub const DUPLICATE_PERMISSION_CODE: &str = "InvalidPermission.Duplicate";

/// Pipeline stage an error escaped from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Discovering the external IP
    Discovery,
    /// Multi-client shared state fetch or save
    SharedState,
    /// DNS record upserts
    Dns,
    /// Security group authorize
    Firewall,
    /// Operator notifications
    Notify,
    /// Reading or writing the IP log
    IpLog,
}

impl Stage {
    /// Short lowercase name used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Discovery => "discovery",
            Stage::SharedState => "shared_state",
            Stage::Dns => "dns",
            Stage::Firewall => "firewall",
            Stage::Notify => "notify",
            Stage::IpLog => "ip_log",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for the IP change pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed IP literal, invalid port range, missing required setting
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// External IP discovery errors
    #[error("IP source error: {0}")]
    IpSource(String),

    /// Error reported by a remote API (DNS, security groups)
    #[error("Remote error ({service}){}: {message}", fmt_code(.code))]
    Remote {
        /// Service name (e.g. "route53", "ec2")
        service: String,
        /// Service-specific error code, if any
        code: Option<String>,
        /// Error message
        message: String,
    },

    /// Shared state document could not be decoded or encoded
    #[error("Shared state error: {0}")]
    SharedState(String),

    /// IP log errors
    #[error("IP log error: {0}")]
    IpLog(String),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notification(String),

    /// A fatal error wrapped with the stage and target it escaped from
    #[error("{stage} failed for {target}: {source}")]
    Stage {
        /// Pipeline stage
        stage: Stage,
        /// Target identifier (host name, group id, address, ...)
        target: String,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an IP source error
    pub fn ip_source(msg: impl Into<String>) -> Self {
        Self::IpSource(msg.into())
    }

    /// Create a remote API error without an error code
    pub fn remote(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            service: service.into(),
            code: None,
            message: message.into(),
        }
    }

    /// Create a remote API error carrying a service error code
    pub fn remote_with_code(
        service: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Remote {
            service: service.into(),
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Create a shared state error
    pub fn shared_state(msg: impl Into<String>) -> Self {
        Self::SharedState(msg.into())
    }

    /// Create an IP log error
    pub fn ip_log(msg: impl Into<String>) -> Self {
        Self::IpLog(msg.into())
    }

    /// Create a notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Wrap this error with the stage and target it escaped from
    pub fn at(self, stage: Stage, target: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            target: target.into(),
            source: Box::new(self),
        }
    }

    /// The stage this error was wrapped with, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether this is a validation error (possibly wrapped)
    pub fn is_validation(&self) -> bool {
        match self {
            Error::Validation(_) => true,
            Error::Stage { source, .. } => source.is_validation(),
            _ => false,
        }
    }

    /// Whether the remote API rejected an authorize because the permission
    /// already exists
    pub fn is_duplicate_permission(&self) -> bool {
        match self {
            Error::Remote { code: Some(code), .. } => {
                code.eq_ignore_ascii_case(DUPLICATE_PERMISSION_CODE)
            }
            Error::Stage { source, .. } => source.is_duplicate_permission(),
            _ => false,
        }
    }
}

fn fmt_code(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default()
}
