// # File IP Log
//
// File-based implementation of IpLogStore with crash recovery.
//
// ## Purpose
//
// Keeps the last fully propagated IP across runs. Its current IP is the
// "old IP" of the next run; the history is an append-only audit trail.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Automatic backup: Keeps .backup of the previous file
// - Recovery: Falls back to the backup if the main file is corrupted;
//   when both are unreadable loading fails instead of starting over
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "current": { "current_ip": "203.0.113.7", "updated_at": "2025-01-09T12:00:00Z" },
//   "history": [
//     { "ip": "203.0.113.7", "updated_at": "2025-01-09T12:00:00Z" }
//   ]
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::{IpLogEntry, IpLogSnapshot, IpLogStore};

/// IP log file format version
const IP_LOG_FILE_VERSION: &str = "1.0";

/// Serializable IP log file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IpLogFile {
    version: String,
    #[serde(default)]
    current: Option<IpLogSnapshot>,
    #[serde(default)]
    history: Vec<IpLogEntry>,
}

impl IpLogFile {
    fn empty() -> Self {
        Self {
            version: IP_LOG_FILE_VERSION.to_string(),
            ..Self::default()
        }
    }
}

/// File-based IP log with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use ipchange_core::ip_log::FileIpLog;
/// use ipchange_core::traits::IpLogStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let log = FileIpLog::new("/var/lib/ipchange/iplog.json").await?;
///
///     log.record("203.0.113.7", chrono::Utc::now()).await?;
///     assert_eq!(log.current_ip().await?.as_deref(), Some("203.0.113.7"));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileIpLog {
    path: PathBuf,
    state: RwLock<IpLogFile>,
}

impl FileIpLog {
    /// Create or load a file IP log
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Load the existing file
    /// 3. If it is corrupted, load the backup
    /// 4. If both are unreadable, fail with [`Error::IpLog`]
    ///
    /// A missing file is a first run and starts an empty log.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::ip_log(format!(
                    "Failed to create IP log directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let state = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_with_recovery(path: &Path) -> Result<IpLogFile, Error> {
        let Some(content) = Self::read(path).await? else {
            tracing::debug!("IP log does not exist yet: {}", path.display());
            return Ok(IpLogFile::empty());
        };

        match Self::parse(path, &content) {
            Ok(file) => Ok(file),
            Err(e) => {
                tracing::warn!("IP log appears corrupted: {}. Attempting recovery from backup.", e);

                let backup_path = Self::backup_path(path);
                let backup = match Self::read(&backup_path).await? {
                    Some(content) => Self::parse(&backup_path, &content),
                    None => {
                        tracing::error!("IP log is corrupted and no backup exists");
                        return Err(Error::ip_log(format!(
                            "IP log {} is corrupted and has no backup: {}",
                            path.display(),
                            e
                        )));
                    }
                };

                match backup {
                    Ok(file) => {
                        tracing::info!("Recovered IP log from backup: {} history entries", file.history.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!("Failed to restore IP log from backup: {}", restore_err);
                        }
                        Ok(file)
                    }
                    Err(backup_err) => {
                        tracing::error!("IP log backup also corrupted: {}", backup_err);
                        Err(Error::ip_log(format!(
                            "IP log {} and its backup are corrupted: {}",
                            path.display(),
                            e
                        )))
                    }
                }
            }
        }
    }

    async fn read(path: &Path) -> Result<Option<String>, Error> {
        if !path.exists() {
            return Ok(None);
        }

        fs::read_to_string(path)
            .await
            .map(Some)
            .map_err(|e| Error::ip_log(format!("Failed to read IP log {}: {}", path.display(), e)))
    }

    fn parse(path: &Path, content: &str) -> Result<IpLogFile, Error> {
        let file: IpLogFile = serde_json::from_str(content).map_err(|e| {
            Error::ip_log(format!("Failed to parse IP log {}: {}", path.display(), e))
        })?;

        if file.version != IP_LOG_FILE_VERSION {
            tracing::warn!(
                "IP log version mismatch: expected {}, got {}. Attempting to load anyway.",
                IP_LOG_FILE_VERSION,
                file.version
            );
        }

        Ok(file)
    }

    /// Write the log atomically: temp file, backup of the old file, rename
    async fn write(&self, file: &IpLogFile) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(file)
            .map_err(|e| Error::ip_log(format!("Failed to serialize IP log: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::ip_log(format!("Failed to create temp file {}: {}", temp_path.display(), e))
            })?;

            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::ip_log(format!("Failed to write temp file {}: {}", temp_path.display(), e))
            })?;

            temp.sync_all().await.map_err(|e| {
                Error::ip_log(format!("Failed to sync temp file {}: {}", temp_path.display(), e))
            })?;
        }

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("Failed to create IP log backup: {}", e);
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::ip_log(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("IP log written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl IpLogStore for FileIpLog {
    async fn current(&self) -> Result<Option<IpLogSnapshot>, Error> {
        Ok(self.state.read().await.current.clone())
    }

    async fn record(&self, ip: &str, at: DateTime<Utc>) -> Result<(), Error> {
        let mut state = self.state.write().await;

        let mut next = state.clone();
        next.version = IP_LOG_FILE_VERSION.to_string();
        next.current = Some(IpLogSnapshot {
            current_ip: ip.to_string(),
            updated_at: at,
        });
        next.history.push(IpLogEntry {
            ip: ip.to_string(),
            updated_at: at,
        });

        // Only advance in memory once the file is durable.
        self.write(&next).await?;
        *state = next;
        Ok(())
    }

    async fn history(&self) -> Result<Vec<IpLogEntry>, Error> {
        Ok(self.state.read().await.history.clone())
    }
}
