#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use syncdeck::{
    Entity, InMemoryRemoteStore, ModeGate, PasswordAuthenticator, RemoteStore, Result, Row,
    Session, SyncConfig, SyncError, SyncMode, TableId,
};
use tokio::sync::Notify;

pub const TEST_URL: &str = "https://backend.test";
pub const TEST_KEY: &str = "k3y-for-tests";

pub fn remote_config() -> SyncConfig {
    SyncConfig::new(TEST_URL, TEST_KEY)
}

pub fn authenticator() -> Arc<PasswordAuthenticator> {
    Arc::new(
        PasswordAuthenticator::with_cost(4)
            .user("alice", "wonderland")
            .unwrap(),
    )
}

/// Gate still waiting for a credential check
pub fn pending_gate(remote: Arc<dyn RemoteStore>) -> Arc<ModeGate> {
    let gate = ModeGate::new(&remote_config(), remote, authenticator());
    assert_eq!(gate.mode(), SyncMode::Authenticating);
    Arc::new(gate)
}

/// Gate in `AuthenticatedRemote` with a session for "alice"
pub fn remote_gate(remote: Arc<dyn RemoteStore>) -> Arc<ModeGate> {
    let gate = pending_gate(remote);
    gate.restore_session(Some(Session::new("alice"))).unwrap();
    assert_eq!(gate.mode(), SyncMode::AuthenticatedRemote);
    gate
}

/// Gate that has a remote at hand but no usable configuration
pub fn local_gate(remote: Arc<dyn RemoteStore>) -> Arc<ModeGate> {
    let gate = ModeGate::new(&SyncConfig::local(), remote, authenticator());
    assert_eq!(gate.mode(), SyncMode::Local);
    Arc::new(gate)
}

pub fn stocked(id: &str, stock: i64) -> Entity {
    Entity::new(id).with("stock", stock)
}

pub fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap()
}

pub fn stock_of(entity: &Entity) -> Option<i64> {
    entity.get("stock").and_then(Value::as_i64)
}

pub fn product_rows(items: &[(&str, i64)]) -> Vec<Row> {
    items
        .iter()
        .map(|(id, stock)| row(json!({ "id": id, "stock": stock })))
        .collect()
}

/// Remote whose writes (and optionally reads) park until released, so a
/// test can act on the store while a remote call is in flight.
#[derive(Default)]
pub struct GatedRemote {
    pub inner: InMemoryRemoteStore,
    pub entered: Notify,
    pub release: Notify,
    pub reject_writes: AtomicBool,
    pub park_reads: AtomicBool,
}

impl GatedRemote {
    pub fn rejecting() -> Self {
        let remote = Self::default();
        remote.reject_writes.store(true, Ordering::SeqCst);
        remote
    }

    pub fn parking_reads() -> Self {
        let remote = Self::default();
        remote.park_reads.store(true, Ordering::SeqCst);
        remote
    }

    async fn park(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }

    async fn read_gate(&self) {
        if self.park_reads.load(Ordering::SeqCst) {
            self.park().await;
        }
    }

    async fn hold(&self) -> Result<()> {
        if self.park_reads.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.park().await;
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Remote("write rejected by backend".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for GatedRemote {
    async fn fetch_all(&self, table: TableId) -> Result<Vec<Row>> {
        self.read_gate().await;
        self.inner.fetch_all(table).await
    }

    async fn fetch_one(&self, table: TableId, id: &str) -> Result<Option<Row>> {
        self.read_gate().await;
        self.inner.fetch_one(table, id).await
    }

    async fn upsert_many(&self, table: TableId, rows: Vec<Row>) -> Result<()> {
        self.hold().await?;
        self.inner.upsert_many(table, rows).await
    }

    async fn delete_by_ids(&self, table: TableId, ids: Vec<String>) -> Result<()> {
        self.hold().await?;
        self.inner.delete_by_ids(table, ids).await
    }
}
