use super::table::TableId;
use crate::core::{Result, Row};
use async_trait::async_trait;

/// Table-scoped capabilities of a persistent backend.
///
/// Any backend that can list, fetch by id, insert-or-replace by id, and
/// delete by id satisfies the synchronization core.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_all(&self, table: TableId) -> Result<Vec<Row>>;

    /// Returns `Ok(None)` when no row has the given id.
    async fn fetch_one(&self, table: TableId, id: &str) -> Result<Option<Row>>;

    /// Insert-or-replace by id
    async fn upsert_many(&self, table: TableId, rows: Vec<Row>) -> Result<()>;

    async fn delete_by_ids(&self, table: TableId, ids: Vec<String>) -> Result<()>;

    /// Existence check used by seeding. Backends that can answer it without
    /// listing every row should override it.
    async fn has_rows(&self, table: TableId) -> Result<bool> {
        Ok(!self.fetch_all(table).await?.is_empty())
    }
}

/// Operation kinds, used for call logs and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    FetchAll,
    FetchOne,
    UpsertMany,
    DeleteByIds,
    HasRows,
}
