// # ipchange - run-once IP change propagation
//
// This binary is a THIN integration layer ONLY:
// - DO NOT add detection, DNS, firewall or notification logic here
// - All pipeline logic lives in ipchange-core
// - Process configuration is via environment variables; the pipeline
//   configuration is a JSON file named by IPCHANGE_CONFIG
//
// The binary is responsible for:
// 1. Reading its settings from environment variables
// 2. Initializing tracing and the runtime
// 3. Building the collaborators
// 4. Running the engine once and mapping the outcome to an exit code
//
// It is meant to be started by a scheduler (cron, systemd timer, ...). An
// aborted run leaves the IP log unadvanced, so the next scheduled run
// retries the whole pipeline.
//
// ## Configuration
//
// - `IPCHANGE_CONFIG`: Path to the JSON pipeline configuration (required)
// - `IPCHANGE_IP_LOG`: Path to the IP log file (default `iplog.json`)
// - `IPCHANGE_FORCE`: `true` or `1` forces an update even if the IP is unchanged
// - `IPCHANGE_IP_URL`: IP check endpoint (default `http://checkip.amazonaws.com/`)
// - `IPCHANGE_LOG_LEVEL`: trace, debug, info, warn, error (default `info`)
//
// Remote backends are dry-run stand-ins that log the calls they would make.
// The IP log is still a real file, so a dry run advances it; a warning says
// so at startup.
//
// ## Example
//
// ```bash
// export IPCHANGE_CONFIG=/etc/ipchange/config.json
// export IPCHANGE_IP_LOG=/var/lib/ipchange/iplog.json
//
// ipchange
// ```

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use ipchange_core::dry_run::{DryRunDnsApi, DryRunSecurityGroupApi, LogMailSender};
use ipchange_core::{
    Collaborators, ConfigProvider, EngineEvent, ExternalIpSource, FileIpLog, IpChangeConfig,
    IpChangeEngine, JsonFileConfigProvider, RunOutcome,
};

/// Exit codes for different termination scenarios
///
/// - 0: The run completed or had nothing to do
/// - 1: Configuration or startup error
/// - 2: The run aborted; the IP log was not advanced
#[derive(Debug, Clone, Copy)]
enum IpChangeExitCode {
    /// Done or skipped
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// The pipeline aborted
    Aborted = 2,
}

impl From<IpChangeExitCode> for ExitCode {
    fn from(code: IpChangeExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Process settings
struct Settings {
    config_path: PathBuf,
    ip_log_path: PathBuf,
    force_update: bool,
    ip_url: Option<String>,
    log_level: String,
}

impl Settings {
    /// Load settings from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            config_path: env::var("IPCHANGE_CONFIG")
                .map(PathBuf::from)
                .context("IPCHANGE_CONFIG is required. Set it via: export IPCHANGE_CONFIG=/path/to/config.json")?,
            ip_log_path: env::var("IPCHANGE_IP_LOG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("iplog.json")),
            force_update: env::var("IPCHANGE_FORCE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            ip_url: env::var("IPCHANGE_IP_URL").ok().filter(|u| !u.trim().is_empty()),
            log_level: env::var("IPCHANGE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the settings
    fn validate(&self) -> Result<()> {
        if self.config_path.as_os_str().is_empty() {
            anyhow::bail!("IPCHANGE_CONFIG cannot be empty");
        }

        if self.ip_log_path.as_os_str().is_empty() {
            anyhow::bail!("IPCHANGE_IP_LOG cannot be empty");
        }

        if let Some(ref url) = self.ip_url
            && !url.starts_with("https://")
            && !url.starts_with("http://")
        {
            anyhow::bail!("IPCHANGE_IP_URL must use HTTP or HTTPS scheme. Got: {}", url);
        }

        if parse_level(&self.log_level).is_none() {
            anyhow::bail!(
                "IPCHANGE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1")
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return IpChangeExitCode::ConfigError.into();
        }
    };

    if let Err(e) = settings.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return IpChangeExitCode::ConfigError.into();
    }

    let log_level = parse_level(&settings.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return IpChangeExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IpChangeExitCode::ConfigError.into();
        }
    };

    rt.block_on(async {
        let engine = match build_engine(&settings).await {
            Ok(engine) => engine,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return IpChangeExitCode::ConfigError;
            }
        };

        match run_once(engine, settings.force_update).await {
            Ok(()) => IpChangeExitCode::Success,
            Err(e) => {
                error!("Run aborted: {:#}", e);
                IpChangeExitCode::Aborted
            }
        }
    })
    .into()
}

/// Load the pipeline configuration and wire up the collaborators
async fn build_engine(
    settings: &Settings,
) -> Result<(IpChangeEngine, tokio::sync::mpsc::Receiver<EngineEvent>)> {
    let config: IpChangeConfig = JsonFileConfigProvider::new(&settings.config_path)
        .load()
        .with_context(|| format!("Loading {}", settings.config_path.display()))?;

    info!(
        "Configuration loaded: {} DNS host(s), {} firewall entr(ies)",
        config.dns_hosts.len(),
        config.firewall_entries.len()
    );

    warn!("{}", dry_run_notice(&settings.ip_log_path));

    let collaborators = Collaborators {
        ip_source: ip_source(settings)?,
        dns: Box::new(DryRunDnsApi::new()),
        security_groups: Box::new(DryRunSecurityGroupApi),
        mailer: Box::new(LogMailSender),
        ip_log: Box::new(
            FileIpLog::new(&settings.ip_log_path)
                .await
                .with_context(|| format!("Opening IP log {}", settings.ip_log_path.display()))?,
        ),
    };

    Ok(IpChangeEngine::new(collaborators, config)?)
}

/// Startup warning for the dry-run backends paired with a real IP log
fn dry_run_notice(ip_log_path: &Path) -> String {
    format!(
        "DNS, firewall and mail backends are dry-run stand-ins: no remote changes will be made, \
        but the IP log at {} is still advanced",
        ip_log_path.display()
    )
}

#[cfg(feature = "http")]
fn ip_source(settings: &Settings) -> Result<Box<dyn ExternalIpSource>> {
    let url = settings
        .ip_url
        .as_deref()
        .unwrap_or(ipchange_ip_http::DEFAULT_IP_URL);
    info!("Discovering the external IP via {}", url);
    Ok(Box::new(ipchange_ip_http::HttpIpSource::new(url)?))
}

#[cfg(not(feature = "http"))]
fn ip_source(_settings: &Settings) -> Result<Box<dyn ExternalIpSource>> {
    anyhow::bail!("No external IP source available. Rebuild with the `http` feature.")
}

/// Run the engine once, logging its events as they arrive
async fn run_once(
    (engine, mut events): (IpChangeEngine, tokio::sync::mpsc::Receiver<EngineEvent>),
    force_update: bool,
) -> Result<()> {
    let observer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    let outcome = engine.run(force_update).await;
    drop(engine);
    let _ = observer.await;

    match outcome? {
        RunOutcome::Skipped { current_ip } => {
            info!("Nothing to do, IP is still {}", current_ip);
        }
        RunOutcome::Updated(report) => {
            info!(
                "Propagated {}: {} DNS host(s), {} firewall entr(ies)",
                report.ip_state,
                report.dns.len(),
                report.firewall.len()
            );
            if let Some(notifications) = report.notifications
                && !notifications.failed.is_empty()
            {
                for failed in &notifications.failed {
                    error!("Could not notify {}: {}", failed.address, failed.error);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_flag_accepts_true_and_one() {
        assert!(parse_flag("true"));
        assert!(parse_flag("TRUE "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("yes"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn log_levels() {
        assert_eq!(parse_level("Debug"), Some(Level::DEBUG));
        assert!(parse_level("verbose").is_none());
    }

    #[test]
    fn settings_reject_bad_url_scheme() {
        let settings = Settings {
            config_path: PathBuf::from("config.json"),
            ip_log_path: PathBuf::from("iplog.json"),
            force_update: false,
            ip_url: Some("ftp://example.com".to_string()),
            log_level: "info".to_string(),
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn dry_run_notice_names_the_ip_log() {
        let notice = dry_run_notice(Path::new("/var/lib/ipchange/iplog.json"));
        assert!(notice.contains("dry-run"));
        assert!(notice.contains("no remote changes"));
        assert!(notice.contains("/var/lib/ipchange/iplog.json is still advanced"));
    }
}
