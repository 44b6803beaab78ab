//! IP change engine
//!
//! The IpChangeEngine is responsible for:
//! - Reading the previous IP from the IP log and discovering the current one
//! - Deciding whether anything needs to happen
//! - Claiming the new IP in the shared state (multi-client setups)
//! - Updating DNS records and firewall permissions
//! - Notifying operators
//! - Recording the new IP in the IP log, last
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────┐
//! │ ExternalIpSource │     │  IpLogStore  │
//! └──────────────────┘     └──────────────┘
//!          │ new IP               │ old IP
//!          └──────────┬───────────┘
//!                     ▼
//!             ┌────────────────┐
//!             │ IpChangeEngine │──── EngineEvent ───▶ observers
//!             └────────────────┘
//!                     │
//!     ┌───────────────┼───────────────┬───────────────┐
//!     ▼               ▼               ▼               ▼
//! ┌──────────┐  ┌───────────┐  ┌─────────────┐  ┌──────────┐
//! │  Shared  │  │    DNS    │  │  Firewall   │  │ Notifier │
//! │  state   │  │  applier  │  │  applier    │  │          │
//! └──────────┘  └───────────┘  └─────────────┘  └──────────┘
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! Idle → Detecting → Skipped
//!                  → Applying → Notifying → Persisting → Done
//! any fatal error  → Aborted   (the IP log is not advanced)
//! ```
//!
//! Every remote call is awaited in turn; nothing is dispatched concurrently.

use std::fmt;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::appliers::{DnsApplier, DnsOutcome, FirewallApplier, FirewallOutcome, PropagationPoller};
use crate::config::IpChangeConfig;
use crate::detector::{self, Decision};
use crate::error::{Result, Stage};
use crate::ip_state::IpState;
use crate::notifier::{NotificationReport, Notifier};
use crate::run_log::RunLog;
use crate::shared_state::SharedStateStore;
use crate::traits::{DnsApi, ExternalIpSource, IpLogStore, MailSender, SecurityGroupApi};

/// Everything the engine talks to
///
/// Constructed once by the caller and owned by the engine; dropped with it.
pub struct Collaborators {
    /// Discovers the current external IP
    pub ip_source: Box<dyn ExternalIpSource>,
    /// Hosted DNS API (A records and the shared state TXT record)
    pub dns: Box<dyn DnsApi>,
    /// Security group API
    pub security_groups: Box<dyn SecurityGroupApi>,
    /// Outbound e-mail
    pub mailer: Box<dyn MailSender>,
    /// Authoritative record of the last propagated IP
    pub ip_log: Box<dyn IpLogStore>,
}

/// Pipeline state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Detecting,
    /// Terminal: nothing changed and the update was not forced
    Skipped,
    Applying,
    Notifying,
    Persisting,
    /// Terminal: the run completed
    Done,
    /// Terminal: a fatal error stopped the run
    Aborted,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Detecting => "detecting",
            PipelineState::Skipped => "skipped",
            PipelineState::Applying => "applying",
            PipelineState::Notifying => "notifying",
            PipelineState::Persisting => "persisting",
            PipelineState::Done => "done",
            PipelineState::Aborted => "aborted",
        }
    }

    /// Whether the run ends in this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Skipped | PipelineState::Done | PipelineState::Aborted
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by the IpChangeEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The pipeline moved to a new state
    StateChanged {
        from: PipelineState,
        to: PipelineState,
    },

    /// A fatal error stopped the run (followed by no further events)
    Aborted {
        /// State the run was in when it failed
        during: PipelineState,
        error: String,
    },
}

/// What a completed run did
#[derive(Debug, Clone)]
pub struct RunReport {
    pub ip_state: IpState,
    pub dns: Vec<DnsOutcome>,
    pub firewall: Vec<FirewallOutcome>,
    /// `None` when no recipients are configured
    pub notifications: Option<NotificationReport>,
    pub log: RunLog,
}

/// Result of [`IpChangeEngine::run`]
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The IP did not change and the update was not forced
    Skipped {
        current_ip: String,
    },
    /// The pipeline ran and the IP log was advanced
    Updated(RunReport),
}

/// Tracks the state of one run and emits transitions
struct Pipeline<'e> {
    event_tx: &'e mpsc::Sender<EngineEvent>,
    state: PipelineState,
}

impl<'e> Pipeline<'e> {
    fn new(event_tx: &'e mpsc::Sender<EngineEvent>) -> Self {
        Self {
            event_tx,
            state: PipelineState::Idle,
        }
    }

    fn advance(&mut self, to: PipelineState) {
        debug!("Pipeline: {} -> {}", self.state, to);
        emit(self.event_tx, EngineEvent::StateChanged { from: self.state, to });
        self.state = to;
    }

    fn abort(&mut self, error: &crate::Error) {
        error!("Run aborted while {}: {}", self.state, error);
        emit(
            self.event_tx,
            EngineEvent::Aborted {
                during: self.state,
                error: error.to_string(),
            },
        );
        self.state = PipelineState::Aborted;
    }
}

/// Send an event without blocking the pipeline
///
/// A full channel drops the event with a warning. A dropped receiver means
/// nobody is observing, which is not worth more than a debug line.
fn emit(event_tx: &mpsc::Sender<EngineEvent>, event: EngineEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Event receiver dropped, discarding event");
        }
    }
}

/// Core IP change engine
///
/// ## Lifecycle
///
/// 1. Create with [`IpChangeEngine::new()`]
/// 2. Call [`IpChangeEngine::run()`] once per scheduled invocation
/// 3. Drop to release the collaborators
///
/// ## Idempotency
///
/// The IP log is written last. An aborted run leaves it unadvanced, so the
/// next invocation sees the same old IP and re-runs the whole pipeline.
/// Every remote write is an upsert or tolerates an existing permission.
pub struct IpChangeEngine {
    collaborators: Collaborators,
    config: IpChangeConfig,
    poller: PropagationPoller,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl IpChangeEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine
    /// events
    pub fn new(
        collaborators: Collaborators,
        config: IpChangeConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);
        let poller = PropagationPoller::from_secs(config.engine.propagation_poll_interval_secs);

        let engine = Self {
            collaborators,
            config,
            poller,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Configuration the engine runs with
    pub fn config(&self) -> &IpChangeConfig {
        &self.config
    }

    /// Detect a change and, if there is one (or `force_update` is set), run
    /// the whole pipeline and record the new IP
    ///
    /// # Returns
    ///
    /// - `Ok(RunOutcome::Skipped)`: Nothing changed, no remote calls were made
    /// - `Ok(RunOutcome::Updated)`: The pipeline completed and the IP log was advanced
    /// - `Err(Error)`: The run aborted; the IP log was not advanced
    pub async fn run(&self, force_update: bool) -> Result<RunOutcome> {
        let mut pipeline = Pipeline::new(&self.event_tx);
        let mut log = RunLog::new();

        match self.run_pipeline(&mut pipeline, &mut log, force_update).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                pipeline.abort(&e);
                Err(e)
            }
        }
    }

    /// Run the apply and notify stages for an externally supplied IP state
    ///
    /// The IP log is neither read nor written.
    pub async fn apply(&self, ip_state: IpState) -> Result<RunReport> {
        let mut pipeline = Pipeline::new(&self.event_tx);
        let mut log = RunLog::new();

        let result = self.apply_and_notify(&mut pipeline, &mut log, &ip_state).await;
        match result {
            Ok((dns, firewall, notifications)) => {
                pipeline.advance(PipelineState::Done);
                Ok(RunReport {
                    ip_state,
                    dns,
                    firewall,
                    notifications,
                    log,
                })
            }
            Err(e) => {
                pipeline.abort(&e);
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        pipeline: &mut Pipeline<'_>,
        log: &mut RunLog,
        force_update: bool,
    ) -> Result<RunOutcome> {
        pipeline.advance(PipelineState::Detecting);

        let old_ip = self
            .collaborators
            .ip_log
            .current_ip()
            .await
            .map_err(|e| e.at(Stage::IpLog, "current IP"))?;

        let source = &self.collaborators.ip_source;
        let new_ip = source
            .current()
            .await
            .map_err(|e| e.at(Stage::Discovery, source.source_name()))?;

        let ip_state = IpState::new(old_ip.as_deref(), &new_ip, force_update)?;

        if detector::detect(ip_state.old_ip(), ip_state.new_ip(), force_update) == Decision::Skip {
            log.record(format!("No change has taken place. IP is still {}", ip_state.new_ip()));
            pipeline.advance(PipelineState::Skipped);
            return Ok(RunOutcome::Skipped {
                current_ip: ip_state.new_ip().to_string(),
            });
        }

        log.record(format!(
            "The new IP is: {}. Old IP was: {}",
            ip_state.new_ip(),
            ip_state.old_ip().unwrap_or_default()
        ));

        let (dns, firewall, notifications) =
            self.apply_and_notify(pipeline, log, &ip_state).await?;

        pipeline.advance(PipelineState::Persisting);
        self.collaborators
            .ip_log
            .record(ip_state.new_ip(), Utc::now())
            .await
            .map_err(|e| e.at(Stage::IpLog, ip_state.new_ip()))?;

        pipeline.advance(PipelineState::Done);
        Ok(RunOutcome::Updated(RunReport {
            ip_state,
            dns,
            firewall,
            notifications,
            log: std::mem::take(log),
        }))
    }

    async fn apply_and_notify(
        &self,
        pipeline: &mut Pipeline<'_>,
        log: &mut RunLog,
        ip_state: &IpState,
    ) -> Result<(Vec<DnsOutcome>, Vec<FirewallOutcome>, Option<NotificationReport>)> {
        pipeline.advance(PipelineState::Applying);
        log.record(format!("IP CHANGE: START: IP State: {ip_state}"));

        let dns_api = self.collaborators.dns.as_ref();

        let mut shared = self.config.multi_client.clone().map(|settings| {
            SharedStateStore::new(dns_api, settings, self.config.engine.shared_state_ttl, self.poller)
        });

        if let Some(store) = shared.as_mut() {
            let record_name = store.settings().record_name.clone();
            store
                .claim(ip_state, log)
                .await
                .map_err(|e| e.at(Stage::SharedState, record_name))?;
        }

        let dns = DnsApplier::new(dns_api, self.poller)
            .apply_all(&self.config.dns_hosts, ip_state, log)
            .await?;

        let firewall = FirewallApplier::new(self.collaborators.security_groups.as_ref())
            .apply_all(&self.config.firewall_entries, ip_state, shared.as_mut(), log)
            .await?;

        log.record(format!("IP CHANGE: COMPLETE: IP State: {ip_state}"));

        pipeline.advance(PipelineState::Notifying);
        let notifications = match &self.config.notifications {
            Some(settings) if !settings.recipients.is_empty() => {
                let notifier = Notifier::new(
                    self.collaborators.mailer.as_ref(),
                    settings,
                    self.config.host_names(),
                )
                .map_err(|e| e.at(Stage::Notify, "settings"))?;
                let report = notifier.notify_all(ip_state, log).await?;
                log.record(format!(
                    "IP CHANGE: Notifications complete. ALL DONE. IP State: {ip_state}"
                ));
                Some(report)
            }
            _ => {
                info!("No notification recipients configured");
                None
            }
        };

        Ok((dns, firewall, notifications))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::Skipped.is_terminal());
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Aborted.is_terminal());
        assert!(!PipelineState::Persisting.is_terminal());
        assert_eq!(PipelineState::Notifying.to_string(), "notifying");
    }

    #[tokio::test]
    async fn test_full_channel_drops_events() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut pipeline = Pipeline::new(&tx);

        pipeline.advance(PipelineState::Detecting);
        pipeline.advance(PipelineState::Skipped);

        assert_eq!(
            rx.recv().await,
            Some(EngineEvent::StateChanged {
                from: PipelineState::Idle,
                to: PipelineState::Detecting
            })
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(pipeline.state, PipelineState::Skipped);
    }

    #[test]
    fn test_dropped_receiver_does_not_stop_the_pipeline() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let mut pipeline = Pipeline::new(&tx);

        pipeline.advance(PipelineState::Detecting);
        pipeline.advance(PipelineState::Applying);

        assert_eq!(pipeline.state, PipelineState::Applying);
        assert!(tx.is_closed());
    }
}
