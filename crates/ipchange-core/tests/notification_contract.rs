//! Contract Test: Notifications
//!
//! This test verifies operator notifications sent at the end of a run.
//!
//! Constraints verified:
//! - Summary recipients are attempted before full recipients
//! - Full messages carry the run log
//! - Best-effort delivery keeps going after a failure and still persists
//! - Fail-fast delivery aborts the run before the IP log is written
//!
//! If this test fails, operators are not told about IP changes correctly.

mod common;

use common::*;
use ipchange_core::config::{
    ContentType, DeliveryPolicy, EmailConfig, IpChangeConfig, NotificationSettings, Recipient,
};
use ipchange_core::engine::{IpChangeEngine, RunOutcome};
use ipchange_core::error::Stage;
use ipchange_core::traits::IpLogStore;

fn config_with(recipients: Vec<Recipient>, delivery_policy: DeliveryPolicy) -> IpChangeConfig {
    let mut config = minimal_config();
    config.notifications = Some(NotificationSettings {
        email: Some(EmailConfig::new("smtp.example.com", "ipchange@example.com")),
        recipients,
        delivery_policy,
    });
    config
}

fn recipients() -> Vec<Recipient> {
    vec![
        Recipient::email("admin@example.com", ContentType::Full),
        Recipient::email("ops@example.com", ContentType::Summary),
        Recipient::email("boss@example.com", ContentType::Summary),
    ]
}

#[tokio::test]
async fn summaries_are_sent_before_full_messages() {
    let doubles = Doubles::new(Some("10.0.0.1"), "10.0.0.2");
    let config = config_with(recipients(), DeliveryPolicy::BestEffort);
    let (engine, _events) = IpChangeEngine::new(doubles.collaborators(), config).unwrap();

    let RunOutcome::Updated(report) = engine.run(false).await.unwrap() else {
        panic!("expected an update");
    };

    assert_eq!(
        doubles.mailer.attempts(),
        vec!["ops@example.com", "boss@example.com", "admin@example.com"]
    );
    let notifications = report.notifications.expect("notifications were sent");
    assert_eq!(notifications.sent.len(), 3);
    assert!(notifications.failed.is_empty());
}

#[tokio::test]
async fn full_message_contains_the_run_log() {
    let doubles = Doubles::new(Some("10.0.0.1"), "10.0.0.2");
    let config = config_with(recipients(), DeliveryPolicy::BestEffort);
    let (engine, _events) = IpChangeEngine::new(doubles.collaborators(), config).unwrap();

    engine.run(false).await.unwrap();

    let sent = doubles.mailer.sent();
    let summary = sent.iter().find(|m| m.to == "ops@example.com").unwrap();
    let full = sent.iter().find(|m| m.to == "admin@example.com").unwrap();

    assert_eq!(summary.from, "ipchange@example.com");
    assert!(summary.subject.starts_with("[CLIENT TO AWS WORKER]: IP Address changed for host(s) home.example.com."));
    assert_eq!(full.subject, summary.subject);
    assert!(!summary.body.contains("LOG:"));
    assert!(full.body.contains("LOG:\n\tThe new IP is: 10.0.0.2. Old IP was: 10.0.0.1\n"));
    assert!(full.body.contains("\tNotification: Sent email summary to ops@example.com."));
}

#[tokio::test]
async fn best_effort_continues_after_a_failed_send() {
    let doubles = Doubles {
        mailer: MockMailSender::new().failing_for("ops@example.com"),
        ..Doubles::new(Some("10.0.0.1"), "10.0.0.2")
    };
    let config = config_with(recipients(), DeliveryPolicy::BestEffort);
    let (engine, _events) = IpChangeEngine::new(doubles.collaborators(), config).unwrap();

    let RunOutcome::Updated(report) = engine.run(false).await.unwrap() else {
        panic!("expected an update");
    };

    assert_eq!(doubles.mailer.attempts().len(), 3);
    let notifications = report.notifications.unwrap();
    assert_eq!(notifications.sent, vec!["boss@example.com", "admin@example.com"]);
    assert_eq!(notifications.failed.len(), 1);
    assert_eq!(notifications.failed[0].address, "ops@example.com");
    assert_eq!(doubles.ip_log.current_ip().await.unwrap().as_deref(), Some("10.0.0.2"));
}

#[tokio::test]
async fn fail_fast_aborts_before_persisting() {
    let doubles = Doubles {
        mailer: MockMailSender::new().failing_for("ops@example.com"),
        ..Doubles::new(Some("10.0.0.1"), "10.0.0.2")
    };
    let config = config_with(recipients(), DeliveryPolicy::FailFast);
    let (engine, _events) = IpChangeEngine::new(doubles.collaborators(), config).unwrap();

    let err = engine.run(false).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Notify));
    assert!(err.to_string().contains("ops@example.com"));
    assert_eq!(doubles.mailer.attempts(), vec!["ops@example.com"]);
    assert_eq!(doubles.ip_log.current_ip().await.unwrap().as_deref(), Some("10.0.0.1"));
}

#[tokio::test]
async fn no_recipients_means_no_mail() {
    let doubles = Doubles::new(Some("10.0.0.1"), "10.0.0.2");
    let config = config_with(Vec::new(), DeliveryPolicy::FailFast);
    let (engine, _events) = IpChangeEngine::new(doubles.collaborators(), config).unwrap();

    let RunOutcome::Updated(report) = engine.run(false).await.unwrap() else {
        panic!("expected an update");
    };
    assert!(report.notifications.is_none());
    assert!(doubles.mailer.attempts().is_empty());
}

#[tokio::test]
async fn recipients_without_email_config_are_rejected_up_front() {
    let doubles = Doubles::new(Some("10.0.0.1"), "10.0.0.2");
    let mut config = config_with(recipients(), DeliveryPolicy::BestEffort);
    if let Some(notifications) = config.notifications.as_mut() {
        notifications.email = None;
    }

    let err = IpChangeEngine::new(doubles.collaborators(), config).err().unwrap();
    assert!(err.is_validation());
}
