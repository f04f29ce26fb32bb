use super::activity::ActivityLogger;
use super::store::{LoadOutcome, ManagedStore, MutationReport, StoreCounters, StoreStats};
use crate::connection::{ModeGate, SyncMode};
use crate::core::{ID_FIELD, Result, Row, SyncError, from_row, to_row};
use crate::remote::TableId;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

/// Fixed identifier every document is stored under
pub const DOCUMENT_KEY: &str = "config";

struct DocumentState<D> {
    value: Arc<D>,
    loading: bool,
}

/// Single fixed-key record, replaced as a whole and never deleted.
///
/// Shares the collection store's lifecycle: optimistic replacement, one
/// remote upsert per mutation, full rollback when the upsert fails.
pub struct DocumentStore<D> {
    table: TableId,
    baseline: Arc<D>,
    state: RwLock<DocumentState<D>>,
    writer: Mutex<()>,
    epoch: AtomicU64,
    version: watch::Sender<u64>,
    gate: Arc<ModeGate>,
    activity: Option<Arc<ActivityLogger>>,
    counters: StoreCounters,
}

impl<D> DocumentStore<D>
where
    D: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Creates a loading store holding the baseline until `load()` runs.
    pub fn new(
        table: TableId,
        baseline: D,
        gate: Arc<ModeGate>,
        activity: Option<Arc<ActivityLogger>>,
    ) -> Result<Self> {
        if !table.is_document() {
            return Err(SyncError::Config(format!(
                "'{}' is a collection table, use a CollectionStore",
                table
            )));
        }
        let baseline = Arc::new(baseline);
        let (version, _) = watch::channel(0);

        Ok(Self {
            table,
            state: RwLock::new(DocumentState {
                value: Arc::clone(&baseline),
                loading: true,
            }),
            baseline,
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

    pub fn key(&self) -> &'static str {
        DOCUMENT_KEY
    }

    pub fn value(&self) -> Result<Arc<D>> {
        Ok(Arc::clone(&self.state.read()?.value))
    }

    pub fn get(&self) -> Result<D> {
        Ok(self.value()?.as_ref().clone())
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().map(|state| state.loading).unwrap_or(false)
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub async fn load(&self) -> LoadOutcome {
        let _writer = self.writer.lock().await;
        let mode = self.gate.mode();

        let outcome = match mode {
            SyncMode::Local => match self.install(Arc::clone(&self.baseline)) {
                Ok(()) => LoadOutcome::Baseline(1),
                Err(err) => LoadOutcome::Failed(err),
            },
            SyncMode::AuthenticatedRemote => {
                let epoch = self.epoch.load(Ordering::SeqCst);
                self.set_loading(true);

                match self.fetch().await {
                    Ok(_) if self.epoch.load(Ordering::SeqCst) != epoch => {
                        debug!("'{}' was reset during fetch, discarding document", self.table);
                        LoadOutcome::Skipped(self.gate.mode())
                    }
                    Ok(Some(value)) => match self.install(Arc::new(value)) {
                        Ok(()) => LoadOutcome::Fetched(1),
                        Err(err) => LoadOutcome::Failed(err),
                    },
                    Ok(None) => {
                        debug!("no remote '{}' document, keeping current value", self.table);
                        LoadOutcome::Fetched(0)
                    }
                    Err(err) => {
                        StoreCounters::bump(&self.counters.fetch_failures);
                        let failure = SyncError::FetchFailure {
                            table: self.table.to_string(),
                            message: err.to_string(),
                        };
                        warn!("{}; keeping previous document", failure);
                        LoadOutcome::Failed(failure)
                    }
                }
            }
            SyncMode::Unauthenticated | SyncMode::Authenticating => LoadOutcome::Skipped(mode),
        };

        self.set_loading(false);
        outcome
    }

    /// Replaces the document with `update(current)`; see
    /// [`CollectionStore::mutate`](super::CollectionStore::mutate).
    pub async fn mutate<F>(&self, update: F) -> Result<MutationReport>
    where
        F: FnOnce(&D) -> D + Send,
    {
        let _writer = self.writer.lock().await;
        let mode = self.gate.mode();
        if !(mode.is_local() || mode.is_remote()) {
            return Err(SyncError::RemoteUnavailable(mode));
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let old = self.value()?;
        let next = update(old.as_ref());
        let row = if mode.is_remote() {
            Some(document_row(&next)?)
        } else {
            None
        };
        self.install(Arc::new(next))?;

        let Some(row) = row else {
            return Ok(MutationReport::local());
        };

        let written = match self.gate.remote() {
            Ok(remote) => remote.upsert_many(self.table, vec![row]).await,
            Err(err) => Err(err),
        };

        match written {
            Ok(()) => {
                StoreCounters::bump(&self.counters.committed);
                if let Some(activity) = &self.activity {
                    let detail = format!("{}: replaced document '{}'", self.table, DOCUMENT_KEY);
                    activity.record(&self.gate.actor(), "update", &detail);
                }
                Ok(MutationReport::remote(1, 0))
            }
            Err(err) => {
                let failure = SyncError::ReconciliationFailure {
                    table: self.table.to_string(),
                    message: err.to_string(),
                };
                if self.epoch.load(Ordering::SeqCst) == epoch {
                    self.install(old)?;
                    StoreCounters::bump(&self.counters.rolled_back);
                    warn!("{}; document rolled back", failure);
                } else {
                    debug!("'{}' was reset during reconciliation, skipping rollback", self.table);
                }
                Err(failure)
            }
        }
    }

    pub fn reset(&self) -> Result<()> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.install(Arc::clone(&self.baseline))?;
        self.set_loading(false);
        Ok(())
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            table: self.table,
            item_count: 1,
            loading: self.is_loading(),
            version: self.version(),
            committed: StoreCounters::read(&self.counters.committed),
            rolled_back: StoreCounters::read(&self.counters.rolled_back),
            fetch_failures: StoreCounters::read(&self.counters.fetch_failures),
        }
    }

    async fn fetch(&self) -> Result<Option<D>> {
        let remote = self.gate.remote()?;
        match remote.fetch_one(self.table, DOCUMENT_KEY).await? {
            Some(mut row) => {
                row.remove(ID_FIELD);
                Ok(Some(from_row(row)?))
            }
            None => Ok(None),
        }
    }

    fn install(&self, value: Arc<D>) -> Result<()> {
        self.state.write()?.value = value;
        self.version.send_modify(|version| *version += 1);
        Ok(())
    }

    fn set_loading(&self, loading: bool) {
        if let Ok(mut state) = self.state.write() {
            state.loading = loading;
        }
    }
}

/// Remote row for a document: its fields plus the fixed key as `id`
pub fn document_row<D: Serialize>(value: &D) -> Result<Row> {
    let mut row = to_row(value)?;
    row.insert(ID_FIELD.to_string(), Value::String(DOCUMENT_KEY.to_string()));
    Ok(row)
}

#[async_trait]
impl<D> ManagedStore for DocumentStore<D>
where
    D: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn table(&self) -> TableId {
        self.table
    }

    async fn load(&self) -> LoadOutcome {
        DocumentStore::load(self).await
    }

    fn reset(&self) -> Result<()> {
        DocumentStore::reset(self)
    }

    fn stats(&self) -> StoreStats {
        DocumentStore::stats(self)
    }
}
