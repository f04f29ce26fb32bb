use crate::connection::SyncMode;
use crate::core::{Result, SyncError};
use crate::remote::TableId;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// What a `load()` call did. Loading never fails past the store boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Local mode: the cache now holds the baseline
    Baseline(usize),
    /// Remote mode: the cache now holds the fetched rows
    Fetched(usize),
    /// Remote mode: the fetch failed and the cache kept its previous value
    Failed(SyncError),
    /// Nothing was loaded (no session, or the store was reset mid-fetch)
    Skipped(SyncMode),
}

impl LoadOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, LoadOutcome::Failed(_))
    }
}

/// Result of a successful mutation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationReport {
    /// Rows written to the remote store
    pub upserted: usize,
    /// Ids deleted from the remote store
    pub deleted: usize,
    /// False when the mutation stayed in memory (Local mode)
    pub reconciled: bool,
}

impl MutationReport {
    pub fn local() -> Self {
        Self::default()
    }

    pub fn remote(upserted: usize, deleted: usize) -> Self {
        Self {
            upserted,
            deleted,
            reconciled: true,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.upserted == 0 && self.deleted == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub table: TableId,
    pub item_count: usize,
    pub loading: bool,
    pub version: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub fetch_failures: u64,
}

#[derive(Default)]
pub(crate) struct StoreCounters {
    pub(crate) committed: AtomicU64,
    pub(crate) rolled_back: AtomicU64,
    pub(crate) fetch_failures: AtomicU64,
}

impl StoreCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Lifecycle shared by every store held in a registry
#[async_trait]
pub trait ManagedStore: Send + Sync {
    fn table(&self) -> TableId;

    async fn load(&self) -> LoadOutcome;

    /// Restores the baseline; in-flight reconciliations no longer roll back
    fn reset(&self) -> Result<()>;

    fn stats(&self) -> StoreStats;
}
