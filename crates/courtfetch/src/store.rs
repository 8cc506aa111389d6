//! Case store: cache-first acquisition over the append-only query log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::outcome::AcquisitionOutcome;
use crate::portal::PortalLauncher;
use crate::session::SessionController;
use crate::storage::{CaseFilter, CaseLog, LogEntry, SqliteCaseLog, StoreStats};
use crate::types::{CaseKey, CourtResult};

/// Anything that can run one acquisition attempt for a key.
#[async_trait]
pub trait Acquire: Send + Sync {
    async fn acquire(&self, key: &CaseKey) -> AcquisitionOutcome;
}

#[async_trait]
impl<L: PortalLauncher> Acquire for SessionController<L> {
    async fn acquire(&self, key: &CaseKey) -> AcquisitionOutcome {
        self.run(key).await
    }
}

/// Where a fetched outcome came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FetchSource {
    /// Served from a prior complete entry; no session was started.
    Cache {
        entry_id: i64,
        cached_at: DateTime<Utc>,
    },
    /// Freshly acquired. `entry_id` is absent when persisting failed.
    Live { entry_id: Option<i64> },
}

/// Outcome of [`CaseStore::fetch`].
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub outcome: AcquisitionOutcome,
    pub source: FetchSource,
    /// Set when the outcome could not be persisted. The outcome itself is
    /// unaffected.
    pub storage_error: Option<String>,
}

impl FetchResult {
    pub fn from_cache(&self) -> bool {
        matches!(self.source, FetchSource::Cache { .. })
    }
}

/// Keyed cache plus audit log in front of an acquirer.
///
/// Only the store writes to the log.
pub struct CaseStore<A, G = SqliteCaseLog> {
    acquirer: A,
    log: G,
}

impl<A: Acquire, G: CaseLog> CaseStore<A, G> {
    pub fn new(acquirer: A, log: G) -> Self {
        Self { acquirer, log }
    }

    /// Return the latest complete record for `key`, acquiring only on a miss.
    pub async fn fetch(&self, key: &CaseKey) -> FetchResult {
        match self.log.latest_complete(key) {
            Ok(Some(entry)) => {
                tracing::info!(entry_id = entry.id, "cache hit for {key}");
                return FetchResult {
                    source: FetchSource::Cache {
                        entry_id: entry.id,
                        cached_at: entry.outcome.timestamp,
                    },
                    outcome: entry.outcome,
                    storage_error: None,
                };
            }
            Ok(None) => tracing::debug!("cache miss for {key}"),
            Err(e) => tracing::warn!("cache read failed for {key}, acquiring: {e}"),
        }
        self.fetch_fresh(key).await
    }

    /// Acquire unconditionally and log the attempt.
    pub async fn fetch_fresh(&self, key: &CaseKey) -> FetchResult {
        let outcome = self.acquirer.acquire(key).await;
        match self.log.append(&outcome) {
            Ok(id) => FetchResult {
                outcome,
                source: FetchSource::Live { entry_id: Some(id) },
                storage_error: None,
            },
            Err(e) => {
                tracing::error!(attempt_id = %outcome.attempt_id, "failed to log outcome: {e}");
                FetchResult {
                    outcome,
                    source: FetchSource::Live { entry_id: None },
                    storage_error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn lookup(&self, key: &CaseKey) -> CourtResult<Vec<LogEntry>> {
        self.log.lookup(key)
    }

    pub fn search(&self, filter: &CaseFilter) -> CourtResult<Vec<LogEntry>> {
        self.log.search(filter)
    }

    pub fn entry(&self, id: i64) -> CourtResult<Option<LogEntry>> {
        self.log.entry(id)
    }

    pub fn recent(&self, limit: usize) -> CourtResult<Vec<LogEntry>> {
        self.log.recent(limit)
    }

    pub fn stats(&self) -> CourtResult<StoreStats> {
        self.log.stats()
    }

    pub fn log(&self) -> &G {
        &self.log
    }
}
