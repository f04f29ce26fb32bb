use super::store::{RemoteOp, RemoteStore};
use super::table::TableId;
use crate::core::{Result, Row, SyncError, row_id};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, RwLock};

/// A call observed by [`InMemoryRemoteStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    FetchAll { table: TableId },
    FetchOne { table: TableId, id: String },
    UpsertMany { table: TableId, rows: Vec<Row> },
    DeleteByIds { table: TableId, ids: Vec<String> },
    HasRows { table: TableId },
}

impl RemoteCall {
    pub fn op(&self) -> RemoteOp {
        match self {
            RemoteCall::FetchAll { .. } => RemoteOp::FetchAll,
            RemoteCall::FetchOne { .. } => RemoteOp::FetchOne,
            RemoteCall::UpsertMany { .. } => RemoteOp::UpsertMany,
            RemoteCall::DeleteByIds { .. } => RemoteOp::DeleteByIds,
            RemoteCall::HasRows { .. } => RemoteOp::HasRows,
        }
    }

    pub fn table(&self) -> TableId {
        match self {
            RemoteCall::FetchAll { table }
            | RemoteCall::FetchOne { table, .. }
            | RemoteCall::UpsertMany { table, .. }
            | RemoteCall::DeleteByIds { table, .. }
            | RemoteCall::HasRows { table } => *table,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, RemoteCall::UpsertMany { .. } | RemoteCall::DeleteByIds { .. })
    }
}

/// Process-local remote store.
///
/// Tables are keyed by their remote identifier and rows by id. Every call is
/// recorded, and failures can be injected per operation, optionally scoped to
/// a single table.
#[derive(Default)]
pub struct InMemoryRemoteStore {
    tables: RwLock<HashMap<&'static str, BTreeMap<String, Row>>>,
    calls: Mutex<Vec<RemoteCall>>,
    failures: Mutex<HashSet<(RemoteOp, Option<TableId>)>>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes rows directly, bypassing the call log and injected failures
    pub fn seed_table(&self, table: TableId, rows: Vec<Row>) -> Result<()> {
        let mut tables = self.tables.write()?;
        let target = tables.entry(table.remote_name()).or_default();
        for row in rows {
            let id = Self::required_id(table, &row)?;
            target.insert(id, row);
        }
        Ok(())
    }

    /// Current rows of a table, ordered by id
    pub fn rows(&self, table: TableId) -> Result<Vec<Row>> {
        let tables = self.tables.read()?;
        Ok(tables
            .get(table.remote_name())
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    pub fn row_count(&self, table: TableId) -> Result<usize> {
        let tables = self.tables.read()?;
        Ok(tables.get(table.remote_name()).map_or(0, BTreeMap::len))
    }

    pub fn calls(&self) -> Result<Vec<RemoteCall>> {
        Ok(self.calls.lock()?.clone())
    }

    /// Recorded upsert and delete calls
    pub fn writes(&self) -> Result<Vec<RemoteCall>> {
        Ok(self
            .calls
            .lock()?
            .iter()
            .filter(|call| call.is_write())
            .cloned()
            .collect())
    }

    pub fn clear_calls(&self) -> Result<()> {
        self.calls.lock()?.clear();
        Ok(())
    }

    /// Makes every subsequent `op` fail, on `table` only or on every table
    pub fn fail_on(&self, op: RemoteOp, table: Option<TableId>) -> Result<()> {
        self.failures.lock()?.insert((op, table));
        Ok(())
    }

    pub fn clear_failures(&self) -> Result<()> {
        self.failures.lock()?.clear();
        Ok(())
    }

    fn record(&self, call: RemoteCall) -> Result<()> {
        let op = call.op();
        let table = call.table();
        self.calls.lock()?.push(call);

        let failures = self.failures.lock()?;
        if failures.contains(&(op, None)) || failures.contains(&(op, Some(table))) {
            return Err(SyncError::Remote(format!(
                "injected {:?} failure on '{}'",
                op,
                table.remote_name()
            )));
        }
        Ok(())
    }

    fn required_id(table: TableId, row: &Row) -> Result<String> {
        row_id(row).map(str::to_string).ok_or_else(|| {
            SyncError::Remote(format!(
                "row without id rejected by '{}'",
                table.remote_name()
            ))
        })
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn fetch_all(&self, table: TableId) -> Result<Vec<Row>> {
        self.record(RemoteCall::FetchAll { table })?;
        self.rows(table)
    }

    async fn fetch_one(&self, table: TableId, id: &str) -> Result<Option<Row>> {
        self.record(RemoteCall::FetchOne {
            table,
            id: id.to_string(),
        })?;
        let tables = self.tables.read()?;
        Ok(tables
            .get(table.remote_name())
            .and_then(|rows| rows.get(id))
            .cloned())
    }

    async fn upsert_many(&self, table: TableId, rows: Vec<Row>) -> Result<()> {
        self.record(RemoteCall::UpsertMany {
            table,
            rows: rows.clone(),
        })?;

        // Validate the whole batch before touching the table.
        let keyed = rows
            .into_iter()
            .map(|row| Self::required_id(table, &row).map(|id| (id, row)))
            .collect::<Result<Vec<_>>>()?;

        let mut tables = self.tables.write()?;
        tables.entry(table.remote_name()).or_default().extend(keyed);
        Ok(())
    }

    async fn delete_by_ids(&self, table: TableId, ids: Vec<String>) -> Result<()> {
        self.record(RemoteCall::DeleteByIds {
            table,
            ids: ids.clone(),
        })?;

        let mut tables = self.tables.write()?;
        if let Some(rows) = tables.get_mut(table.remote_name()) {
            for id in &ids {
                rows.remove(id);
            }
        }
        Ok(())
    }

    async fn has_rows(&self, table: TableId) -> Result<bool> {
        self.record(RemoteCall::HasRows { table })?;
        Ok(self.row_count(table)? > 0)
    }
}
