use super::activity::ActivityLogger;
use super::collection::CollectionStore;
use super::document::DocumentStore;
use super::store::{LoadOutcome, ManagedStore, StoreStats};
use crate::baseline::BaselineDataset;
use crate::connection::ModeGate;
use crate::core::{Entity, Fields, Result, SyncError};
use crate::remote::{TableId, TableKind};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Every store of the process, built once at startup and shared by reference.
pub struct StoreRegistry {
    collections: BTreeMap<TableId, Arc<CollectionStore<Entity>>>,
    documents: BTreeMap<TableId, Arc<DocumentStore<Fields>>>,
}

impl StoreRegistry {
    /// One store per table, each seeded with its baseline
    pub fn from_baseline(
        baseline: &BaselineDataset,
        gate: Arc<ModeGate>,
        activity: Option<Arc<ActivityLogger>>,
    ) -> Result<Self> {
        let mut collections = BTreeMap::new();
        let mut documents = BTreeMap::new();

        for table in TableId::ALL {
            // The audit trail must not audit its own writes.
            let activity = match table {
                TableId::ActivityLog => None,
                _ => activity.clone(),
            };

            match table.kind() {
                TableKind::Collection => {
                    let store = CollectionStore::new(
                        table,
                        baseline.collection(table).to_vec(),
                        Arc::clone(&gate),
                        activity,
                    )?;
                    collections.insert(table, Arc::new(store));
                }
                TableKind::Document => {
                    let store = DocumentStore::new(
                        table,
                        baseline.document(table).cloned().unwrap_or_default(),
                        Arc::clone(&gate),
                        activity,
                    )?;
                    documents.insert(table, Arc::new(store));
                }
            }
        }

        Ok(Self {
            collections,
            documents,
        })
    }

    pub fn collection(&self, table: TableId) -> Result<Arc<CollectionStore<Entity>>> {
        self.collections
            .get(&table)
            .cloned()
            .ok_or_else(|| SyncError::Config(format!("'{}' is not a collection table", table)))
    }

    pub fn document(&self, table: TableId) -> Result<Arc<DocumentStore<Fields>>> {
        self.documents
            .get(&table)
            .cloned()
            .ok_or_else(|| SyncError::Config(format!("'{}' is not a document table", table)))
    }

    /// All stores, collections first, in table order
    pub fn stores(&self) -> Vec<Arc<dyn ManagedStore>> {
        let collections = self
            .collections
            .values()
            .map(|store| Arc::clone(store) as Arc<dyn ManagedStore>);
        let documents = self
            .documents
            .values()
            .map(|store| Arc::clone(store) as Arc<dyn ManagedStore>);
        collections.chain(documents).collect()
    }

    /// Loads every store concurrently
    pub async fn load_all(&self) -> BTreeMap<TableId, LoadOutcome> {
        let stores = self.stores();
        let outcomes = join_all(stores.iter().map(|store| store.load())).await;

        let report: BTreeMap<TableId, LoadOutcome> = stores
            .iter()
            .map(|store| store.table())
            .zip(outcomes)
            .collect();

        let failed = report.values().filter(|outcome| outcome.is_failed()).count();
        info!("loaded {} store(s), {} failed", report.len(), failed);
        report
    }

    /// Returns every store to its baseline
    pub fn reset(&self) -> Result<()> {
        for store in self.stores() {
            store.reset()?;
        }
        Ok(())
    }

    pub fn stats(&self) -> Vec<StoreStats> {
        self.stores().iter().map(|store| store.stats()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> StoreRegistry {
        let baseline = BaselineDataset::embedded().unwrap();
        StoreRegistry::from_baseline(&baseline, Arc::new(ModeGate::local()), None).unwrap()
    }

    #[test]
    fn test_one_store_per_table() {
        let registry = registry();

        assert_eq!(registry.stores().len(), TableId::ALL.len());
        assert!(registry.collection(TableId::Settings).is_err());
        assert!(registry.document(TableId::Products).is_err());
    }

    #[tokio::test]
    async fn test_reset_returns_to_baseline() {
        let registry = registry();
        registry.load_all().await;

        let clients = registry.collection(TableId::Clients).unwrap();
        clients.remove("cli-001").await.unwrap();
        assert_eq!(clients.len(), 2);

        registry.reset().unwrap();
        assert_eq!(clients.len(), 3);
        assert!(registry.stats().iter().all(|stats| !stats.loading));
    }
}
