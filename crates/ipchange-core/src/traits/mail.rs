// # Mail Sender Trait
//
// Outbound e-mail transport. Connection handling, TLS and authentication are
// the implementation's concern; the notifier only hands over finished
// messages.

use async_trait::async_trait;

/// A finished e-mail message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Sender
    pub from: String,
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub body: String,
}

/// Trait for e-mail transport implementations
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Send one message
    async fn send(&self, message: &MailMessage) -> Result<(), crate::Error>;
}
