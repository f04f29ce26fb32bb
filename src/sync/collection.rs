// ============================================================================
// Collection Store
// ============================================================================
//
// In-memory cache of one collection, kept consistent with the remote store.
//
// mutate():
//   1. capture the current snapshot (rollback target)
//   2. apply the update and install the result immediately
//   3. Local mode stops here
//   4. diff old/new by content fingerprint, upsert then delete remotely
//   5. on failure reinstall the captured snapshot
//
// load() and mutate() take the writer gate, a FIFO async mutex, so calls on
// one store are processed strictly in order and a reconciliation never races
// another mutation or a fetch on the same store.
//
// ============================================================================

use super::activity::ActivityLogger;
use super::snapshot::{ChangeSet, Snapshot, diff};
use super::store::{LoadOutcome, ManagedStore, MutationReport, StoreCounters, StoreStats};
use crate::connection::{ModeGate, SyncMode};
use crate::core::{Record, Result, SyncError, from_row, to_row};
use crate::remote::{RemoteStore, TableId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

struct CacheState<T> {
    snapshot: Arc<Snapshot<T>>,
    loading: bool,
}

pub struct CollectionStore<T: Record> {
    table: TableId,
    baseline: Arc<Snapshot<T>>,
    cache: RwLock<CacheState<T>>,
    writer: Mutex<()>,
    epoch: AtomicU64,
    version: watch::Sender<u64>,
    gate: Arc<ModeGate>,
    activity: Option<Arc<ActivityLogger>>,
    counters: StoreCounters,
}

impl<T: Record> CollectionStore<T> {
    /// Creates a loading store; call `load()` to populate it.
    ///
    /// A Local store starts from its baseline, a remote one starts empty.
    pub fn new(
        table: TableId,
        baseline: Vec<T>,
        gate: Arc<ModeGate>,
        activity: Option<Arc<ActivityLogger>>,
    ) -> Result<Self> {
        if table.is_document() {
            return Err(SyncError::Config(format!(
                "'{}' is a document table, use a DocumentStore",
                table
            )));
        }
        let baseline = Arc::new(Snapshot::build(table, baseline)?);
        let initial = match gate.mode() {
            SyncMode::Local => Arc::clone(&baseline),
            _ => Arc::new(Snapshot::empty()),
        };
        let (version, _) = watch::channel(0);

        Ok(Self {
            table,
            baseline,
            cache: RwLock::new(CacheState {
                snapshot: initial,
                loading: true,
            }),
            writer: Mutex::new(()),
            epoch: AtomicU64::new(0),
            version,
            gate,
            activity,
            counters: StoreCounters::default(),
        })
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    /// Current cache contents
    pub fn snapshot(&self) -> Result<Arc<Snapshot<T>>> {
        Ok(Arc::clone(&self.cache.read()?.snapshot))
    }

    pub fn items(&self) -> Result<Vec<T>> {
        Ok(self.snapshot()?.items().to_vec())
    }

    pub fn get(&self, id: &str) -> Result<Option<T>> {
        Ok(self.snapshot()?.get(id).cloned())
    }

    pub fn len(&self) -> usize {
        self.snapshot().map(|snapshot| snapshot.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_loading(&self) -> bool {
        self.cache.read().map(|cache| cache.loading).unwrap_or(false)
    }

    /// Number of cache replacements so far
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Receiver notified on every cache replacement, rollbacks included
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub async fn load(&self) -> LoadOutcome {
        let _writer = self.writer.lock().await;
        let mode = self.gate.mode();

        let outcome = match mode {
            SyncMode::Local => match self.install(Arc::clone(&self.baseline)) {
                Ok(()) => LoadOutcome::Baseline(self.baseline.len()),
                Err(err) => LoadOutcome::Failed(err),
            },
            SyncMode::AuthenticatedRemote => {
                let epoch = self.epoch.load(Ordering::SeqCst);
                self.set_loading(true);

                match self.fetch().await {
                    Ok(snapshot) if self.epoch.load(Ordering::SeqCst) == epoch => {
                        let count = snapshot.len();
                        match self.install(Arc::new(snapshot)) {
                            Ok(()) => LoadOutcome::Fetched(count),
                            Err(err) => LoadOutcome::Failed(err),
                        }
                    }
                    Ok(_) => {
                        debug!("'{}' was reset during fetch, discarding rows", self.table);
                        LoadOutcome::Skipped(self.gate.mode())
                    }
                    Err(err) => {
                        StoreCounters::bump(&self.counters.fetch_failures);
                        let failure = SyncError::FetchFailure {
                            table: self.table.to_string(),
                            message: err.to_string(),
                        };
                        warn!("{}; keeping previous cache", failure);
                        LoadOutcome::Failed(failure)
                    }
                }
            }
            SyncMode::Unauthenticated | SyncMode::Authenticating => LoadOutcome::Skipped(mode),
        };

        self.set_loading(false);
        outcome
    }

    /// Replaces the collection with `update(current)`.
    ///
    /// The new value is visible to readers before any remote call. In Remote
    /// mode the difference is then written remotely; if that fails the cache
    /// returns to the value it had before this call and
    /// [`SyncError::ReconciliationFailure`] is returned.
    pub async fn mutate<F>(&self, update: F) -> Result<MutationReport>
    where
        F: FnOnce(&[T]) -> Vec<T> + Send,
    {
        let _writer = self.writer.lock().await;
        let mode = self.gate.mode();
        if !(mode.is_local() || mode.is_remote()) {
            return Err(SyncError::RemoteUnavailable(mode));
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let old = self.snapshot()?;
        let next = Arc::new(Snapshot::build(self.table, update(old.items()))?);
        self.install(Arc::clone(&next))?;

        if mode.is_local() {
            return Ok(MutationReport::local());
        }

        let changes = diff(&old, &next);
        if changes.is_empty() {
            return Ok(MutationReport::remote(0, 0));
        }

        match self.reconcile(&changes, epoch).await {
            Ok(()) => {
                StoreCounters::bump(&self.counters.committed);
                self.record_activity(&old, &changes);
                Ok(MutationReport::remote(
                    changes.to_upsert.len(),
                    changes.to_delete.len(),
                ))
            }
            Err(err) => {
                let failure = SyncError::ReconciliationFailure {
                    table: self.table.to_string(),
                    message: err.to_string(),
                };
                if self.epoch.load(Ordering::SeqCst) == epoch {
                    self.install(old)?;
                    StoreCounters::bump(&self.counters.rolled_back);
                    warn!("{}; cache rolled back", failure);
                } else {
                    debug!("'{}' was reset during reconciliation, skipping rollback", self.table);
                }
                Err(failure)
            }
        }
    }

    /// Appends a new record; fails on an existing id
    pub async fn insert(&self, item: T) -> Result<MutationReport> {
        self.mutate(move |items| {
            let mut next = items.to_vec();
            next.push(item);
            next
        })
        .await
    }

    /// Replaces the record with the same id, or appends it
    pub async fn upsert(&self, item: T) -> Result<MutationReport> {
        self.mutate(move |items| {
            let mut next = items.to_vec();
            match next.iter_mut().find(|existing| existing.record_id() == item.record_id()) {
                Some(existing) => *existing = item,
                None => next.push(item),
            }
            next
        })
        .await
    }

    /// Edits one record in place; an unknown id changes nothing
    pub async fn update<F>(&self, id: &str, edit: F) -> Result<MutationReport>
    where
        F: FnOnce(&mut T) + Send,
    {
        self.mutate(move |items| {
            let mut next = items.to_vec();
            if let Some(target) = next.iter_mut().find(|item| item.record_id() == id) {
                edit(target);
            }
            next
        })
        .await
    }

    pub async fn remove(&self, id: &str) -> Result<MutationReport> {
        self.mutate(move |items| {
            items
                .iter()
                .filter(|item| item.record_id() != id)
                .cloned()
                .collect()
        })
        .await
    }

    /// Restores the baseline and detaches in-flight reconciliations
    pub fn reset(&self) -> Result<()> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.install(Arc::clone(&self.baseline))?;
        self.set_loading(false);
        Ok(())
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            table: self.table,
            item_count: self.len(),
            loading: self.is_loading(),
            version: self.version(),
            committed: StoreCounters::read(&self.counters.committed),
            rolled_back: StoreCounters::read(&self.counters.rolled_back),
            fetch_failures: StoreCounters::read(&self.counters.fetch_failures),
        }
    }

    async fn fetch(&self) -> Result<Snapshot<T>> {
        let remote = self.gate.remote()?;
        let rows = remote.fetch_all(self.table).await?;
        let items = rows
            .into_iter()
            .map(from_row::<T>)
            .collect::<Result<Vec<_>>>()?;
        Snapshot::build(self.table, items)
    }

    async fn reconcile(&self, changes: &ChangeSet<T>, epoch: u64) -> Result<()> {
        if !changes.to_upsert.is_empty() {
            let rows = changes
                .to_upsert
                .iter()
                .map(to_row::<T>)
                .collect::<Result<Vec<_>>>()?;
            self.remote_since(epoch)?
                .upsert_many(self.table, rows)
                .await?;
        }

        if !changes.to_delete.is_empty() {
            self.remote_since(epoch)?
                .delete_by_ids(self.table, changes.to_delete.clone())
                .await?;
        }

        Ok(())
    }

    /// The remote store, checked again before every call: the session may
    /// have ended or the store may have been reset at the previous await.
    fn remote_since(&self, epoch: u64) -> Result<Arc<dyn RemoteStore>> {
        let remote = self.gate.remote()?;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return Err(SyncError::StoreReset(self.table.to_string()));
        }
        Ok(remote)
    }

    fn install(&self, snapshot: Arc<Snapshot<T>>) -> Result<()> {
        self.cache.write()?.snapshot = snapshot;
        self.version.send_modify(|version| *version += 1);
        Ok(())
    }

    fn set_loading(&self, loading: bool) {
        if let Ok(mut cache) = self.cache.write() {
            cache.loading = loading;
        }
    }

    fn record_activity(&self, old: &Snapshot<T>, changes: &ChangeSet<T>) {
        let Some(activity) = &self.activity else {
            return;
        };

        let action = if changes.to_upsert.is_empty() {
            "delete"
        } else if changes.to_delete.is_empty()
            && changes
                .to_upsert
                .iter()
                .all(|item| !old.contains(item.record_id()))
        {
            "create"
        } else {
            "update"
        };

        let upserted: Vec<&str> = changes.to_upsert.iter().map(Record::record_id).collect();
        let detail = format!(
            "{}: upserted [{}], deleted [{}]",
            self.table,
            upserted.join(", "),
            changes.to_delete.join(", ")
        );
        activity.record(&self.gate.actor(), action, &detail);
    }
}

#[async_trait]
impl<T: Record> ManagedStore for CollectionStore<T> {
    fn table(&self) -> TableId {
        self.table
    }

    async fn load(&self) -> LoadOutcome {
        CollectionStore::load(self).await
    }

    fn reset(&self) -> Result<()> {
        CollectionStore::reset(self)
    }

    fn stats(&self) -> StoreStats {
        CollectionStore::stats(self)
    }
}
