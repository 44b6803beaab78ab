// # Notifier
//
// Formats the IP change notifications and hands them to the mail sender.
//
// ## Ordering
//
// Recipients are stably sorted so every `Summary` recipient is attempted
// before any `Full` recipient. The full message embeds the run log as it
// stands when the first full recipient is reached.
//
// ## Delivery Policy
//
// - `BestEffort`: a failed send is logged and the remaining recipients are
//   still notified
// - `FailFast`: the first failed send aborts with a `notify` stage error

use tracing::warn;

use crate::config::{Channel, ContentType, DeliveryPolicy, EmailConfig, NotificationSettings, Recipient};
use crate::error::{Error, Result, Stage};
use crate::ip_state::IpState;
use crate::run_log::RunLog;
use crate::traits::{MailMessage, MailSender};

/// Subject and body of one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent {
    pub subject: String,
    pub body: String,
}

/// A recipient the notifier failed to reach
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDelivery {
    pub address: String,
    pub error: String,
}

/// Result of notifying all recipients
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationReport {
    /// Addresses notified, in send order
    pub sent: Vec<String>,
    /// Recipients that could not be notified (best-effort only)
    pub failed: Vec<FailedDelivery>,
}

/// Sends IP change notifications
pub struct Notifier<'a> {
    mailer: &'a dyn MailSender,
    settings: &'a NotificationSettings,
    host_names: String,
}

impl<'a> Notifier<'a> {
    /// Create a notifier
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when there are e-mail recipients but no e-mail
    /// config.
    pub fn new(
        mailer: &'a dyn MailSender,
        settings: &'a NotificationSettings,
        host_names: impl Into<String>,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            mailer,
            settings,
            host_names: host_names.into(),
        })
    }

    /// Recipients in send order
    pub fn ordered_recipients(&self) -> Vec<&'a Recipient> {
        let mut recipients: Vec<&Recipient> = self.settings.recipients.iter().collect();
        recipients.sort_by_key(|r| r.content());
        recipients
    }

    fn subject(&self, email: &EmailConfig, ip_state: &IpState) -> String {
        let subject = format!("IP Address changed for host(s) {}. {ip_state}", self.host_names);
        match email.subject_prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}: {subject}"),
            _ => subject,
        }
    }

    /// Message for `Summary` recipients
    pub fn summary_message(&self, email: &EmailConfig, ip_state: &IpState) -> MessageContent {
        let mut body = String::from("*** IP CHANGE NOTIFICATION *** \n");
        body.push_str(&format!("{:<25}\t{}\n", "Host Name(s):", self.host_names));
        body.push_str(&format!(
            "{:<25}\t{}\n",
            "OLD IP Address:",
            ip_state.old_ip().unwrap_or_default()
        ));
        body.push_str(&format!("{:<25}\t{}\n", "NEW IP Address:", ip_state.new_ip()));
        body.push('\n');

        if let Some(message) = email.optional_message.as_deref().filter(|m| !m.trim().is_empty()) {
            body.push_str(&format!("\nMESSAGE:\n{message}\n"));
        }

        MessageContent {
            subject: self.subject(email, ip_state),
            body,
        }
    }

    /// Message for `Full` recipients: the summary followed by the run log
    pub fn full_message(&self, email: &EmailConfig, ip_state: &IpState, log: &RunLog) -> MessageContent {
        let summary = self.summary_message(email, ip_state);

        let mut body = summary.body;
        body.push_str("\n\n");
        if !log.is_empty() {
            body.push_str("LOG:\n");
            for line in log.lines() {
                body.push('\t');
                body.push_str(line);
                body.push('\n');
            }
        }

        MessageContent {
            subject: summary.subject,
            body,
        }
    }

    /// Notify every recipient according to the delivery policy
    pub async fn notify_all(&self, ip_state: &IpState, log: &mut RunLog) -> Result<NotificationReport> {
        let mut report = NotificationReport::default();
        let mut full: Option<MessageContent> = None;

        for recipient in self.ordered_recipients() {
            match self.notify(recipient, ip_state, &mut full, log).await {
                Ok(()) => report.sent.push(recipient.address.clone()),
                Err(e) => match self.settings.delivery_policy {
                    DeliveryPolicy::FailFast => {
                        return Err(e.at(Stage::Notify, recipient.address.clone()));
                    }
                    DeliveryPolicy::BestEffort => {
                        warn!("Failed to notify {}: {}", recipient.address, e);
                        log.record(format!(
                            "Notification: Failed to send {} to {}: {e}",
                            recipient.content(),
                            recipient.display_name()
                        ));
                        report.failed.push(FailedDelivery {
                            address: recipient.address.clone(),
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        Ok(report)
    }

    async fn notify(
        &self,
        recipient: &Recipient,
        ip_state: &IpState,
        full: &mut Option<MessageContent>,
        log: &mut RunLog,
    ) -> Result<()> {
        match recipient.channel {
            Channel::Email { content } => {
                let email = self.settings.email.as_ref().ok_or_else(|| {
                    Error::validation("Cannot notify e-mail recipients when there is no e-mail config")
                })?;

                let message = match content {
                    ContentType::Summary => self.summary_message(email, ip_state),
                    ContentType::Full => full
                        .get_or_insert_with(|| self.full_message(email, ip_state, log))
                        .clone(),
                };

                self.mailer
                    .send(&MailMessage {
                        from: email.from.clone(),
                        to: recipient.address.clone(),
                        subject: message.subject,
                        body: message.body,
                    })
                    .await?;

                log.record(format!(
                    "Notification: Sent email {content} to {}.",
                    recipient.display_name()
                ));
                Ok(())
            }
        }
    }
}
