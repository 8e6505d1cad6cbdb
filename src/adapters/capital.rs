//! Capital Directory - Participant Code Resolution
//!
//! Maps a depository-participant code to the portal's internal numeric
//! capital id, backed by a locally cached JSON snapshot of the capital
//! table. On a lookup miss the table is refreshed from the portal at
//! most once per call, and the cache artifact is overwritten atomically
//! (write to tmp file, then rename) so concurrent refreshes from
//! parallel accounts converge instead of corrupting each other.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::ports::portal::{CapitalEntry, PortalApi, PortalError};
use crate::ports::retry::RetryPolicy;

/// Terminal resolution failure for one participant code.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The code is absent even after a refresh: the participant is not
    /// served by the portal. Callers must not retry.
    #[error("participant code {0} is not served by the portal")]
    Unresolvable(String),
    /// The refresh itself failed; the code stays unresolved this run.
    #[error("capital table refresh failed: {0}")]
    Refresh(#[from] PortalError),
}

/// Shared, read-mostly code → capital-id directory.
pub struct CapitalDirectory<P> {
    portal: Arc<P>,
    cache_path: PathBuf,
    tmp_path: PathBuf,
    refresh_retry: RetryPolicy,
    /// Lazily loaded table. The lock also serializes refreshes.
    table: Mutex<Option<HashMap<String, u32>>>,
}

impl<P: PortalApi> CapitalDirectory<P> {
    pub fn new(portal: Arc<P>, cache_path: impl AsRef<Path>, refresh_retry: RetryPolicy) -> Self {
        let cache_path = cache_path.as_ref().to_path_buf();
        let tmp_path = cache_path.with_extension("json.tmp");
        Self {
            portal,
            cache_path,
            tmp_path,
            refresh_retry,
            table: Mutex::new(None),
        }
    }

    /// Resolve a participant code to its capital id.
    ///
    /// Cache hit: no network. Miss: exactly one refresh of the full
    /// table, then one more lookup before declaring the code
    /// unresolvable.
    #[instrument(skip(self))]
    pub async fn resolve(&self, code: &str) -> Result<u32, DirectoryError> {
        let mut table = self.table.lock().await;

        if table.is_none() {
            *table = Some(self.load_cache().await);
        }
        if let Some(id) = table.as_ref().and_then(|t| t.get(code)) {
            return Ok(*id);
        }

        info!(code, "capital id not cached, refreshing capital table");
        let entries = self
            .refresh_retry
            .run(|| self.portal.capital_list())
            .await?;
        self.write_cache(&entries).await;

        let refreshed: HashMap<String, u32> =
            entries.into_iter().map(|e| (e.code, e.id)).collect();
        let id = refreshed.get(code).copied();
        *table = Some(refreshed);

        id.ok_or_else(|| DirectoryError::Unresolvable(code.to_string()))
    }

    /// Read the cache artifact; a missing or unreadable file is just an
    /// empty table (the next miss refreshes it).
    async fn load_cache(&self) -> HashMap<String, u32> {
        match fs::read_to_string(&self.cache_path).await {
            Ok(raw) => match serde_json::from_str::<Vec<CapitalEntry>>(&raw) {
                Ok(entries) => entries.into_iter().map(|e| (e.code, e.id)).collect(),
                Err(e) => {
                    warn!(error = %e, path = %self.cache_path.display(), "capital cache unreadable");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        }
    }

    /// Overwrite the cache artifact atomically (tmp → rename).
    ///
    /// The snapshot is authoritative, so last writer wins is fine; a
    /// write failure only costs the next run a refresh.
    async fn write_cache(&self, entries: &[CapitalEntry]) {
        let json = match serde_json::to_string(entries) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "capital table not serializable");
                return;
            }
        };
        let result = async {
            fs::write(&self.tmp_path, &json).await?;
            fs::rename(&self.tmp_path, &self.cache_path).await
        }
        .await;

        match result {
            Ok(()) => info!(
                path = %self.cache_path.display(),
                entries = entries.len(),
                "capital cache refreshed"
            ),
            Err(e) => warn!(error = %e, "capital cache write failed"),
        }
    }
}
