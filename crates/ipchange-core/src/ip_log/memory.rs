// # Memory IP Log
//
// In-memory implementation of IpLogStore.
//
// Nothing survives a restart: the first run after a restart sees no old IP
// and therefore proceeds. Useful for tests and for embedding the engine in a
// process that tracks the IP itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::{IpLogEntry, IpLogSnapshot, IpLogStore};

#[derive(Debug, Default)]
struct Inner {
    current: Option<IpLogSnapshot>,
    history: Vec<IpLogEntry>,
}

/// In-memory IP log
///
/// Clones share the same underlying log.
#[derive(Debug, Clone, Default)]
pub struct MemoryIpLog {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryIpLog {
    /// Create an empty log (first run)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log whose current IP is `ip`, without history
    pub fn with_current(ip: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                current: Some(IpLogSnapshot {
                    current_ip: ip.into(),
                    updated_at: Utc::now(),
                }),
                history: Vec::new(),
            })),
        }
    }
}

#[async_trait]
impl IpLogStore for MemoryIpLog {
    async fn current(&self) -> Result<Option<IpLogSnapshot>, Error> {
        Ok(self.inner.read().await.current.clone())
    }

    async fn record(&self, ip: &str, at: DateTime<Utc>) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.current = Some(IpLogSnapshot {
            current_ip: ip.to_string(),
            updated_at: at,
        });
        inner.history.push(IpLogEntry {
            ip: ip.to_string(),
            updated_at: at,
        });
        Ok(())
    }

    async fn history(&self) -> Result<Vec<IpLogEntry>, Error> {
        Ok(self.inner.read().await.history.clone())
    }
}
