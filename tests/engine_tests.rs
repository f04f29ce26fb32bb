mod sync_utils;

use serde_json::{Value, json};
use std::sync::Arc;
use sync_utils::*;
use syncdeck::{
    BaselineDataset, Credentials, InMemoryRemoteStore, LoadOutcome, RemoteOp, Session, SyncEngine,
    SyncError, SyncMode, TableId,
};

fn remote_engine(remote: Arc<InMemoryRemoteStore>) -> SyncEngine {
    SyncEngine::open(
        &remote_config(),
        remote,
        authenticator(),
        BaselineDataset::embedded().unwrap(),
    )
    .unwrap()
}

fn chair_stock(engine: &SyncEngine) -> Option<i64> {
    engine
        .registry()
        .collection(TableId::Products)
        .unwrap()
        .get("prd-chair")
        .unwrap()
        .as_ref()
        .and_then(stock_of)
}

fn alice() -> Credentials {
    Credentials::new("alice", "wonderland")
}

#[tokio::test]
async fn test_local_engine_serves_baseline() {
    let engine = SyncEngine::local(BaselineDataset::embedded().unwrap()).unwrap();

    let loads = engine.start().await;

    assert_eq!(engine.mode(), SyncMode::Local);
    assert_eq!(loads.len(), TableId::ALL.len());
    assert_eq!(loads[&TableId::Products], LoadOutcome::Baseline(3));
    assert_eq!(loads[&TableId::Settings], LoadOutcome::Baseline(1));
    assert_eq!(chair_stock(&engine), Some(40));

    let settings = engine.registry().document(TableId::Settings).unwrap();
    assert_eq!(settings.get().unwrap()["currency"], json!("XOF"));
}

#[tokio::test]
async fn test_local_engine_never_reaches_remote() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let engine = SyncEngine::open(
        &syncdeck::SyncConfig::local(),
        remote.clone(),
        authenticator(),
        BaselineDataset::embedded().unwrap(),
    )
    .unwrap();
    engine.start().await;

    let products = engine.registry().collection(TableId::Products).unwrap();
    products
        .update("prd-chair", |chair| chair.set("stock", 35))
        .await
        .unwrap();
    engine.activity().flush().await;

    assert_eq!(chair_stock(&engine), Some(35));
    assert!(remote.calls().unwrap().is_empty());
    assert_eq!(engine.activity().stats().written, 0);
}

#[tokio::test]
async fn test_sign_in_seeds_then_loads() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let engine = remote_engine(remote.clone());

    assert!(engine.start().await.is_empty());
    assert_eq!(engine.mode(), SyncMode::Authenticating);

    let report = engine.sign_in(&alice()).await.unwrap();

    assert_eq!(report.session.user(), "alice");
    let seed = report.seed.unwrap();
    assert!(!seed.skipped);
    assert!(seed.is_complete());
    assert_eq!(seed.seeded.last(), Some(&TableId::Users));
    assert!(report.loads.values().all(|outcome| !outcome.is_failed()));
    assert_eq!(report.loads[&TableId::Products], LoadOutcome::Fetched(3));
    assert_eq!(report.loads[&TableId::Settings], LoadOutcome::Fetched(1));
    assert_eq!(remote.row_count(TableId::Users).unwrap(), 2);
}

#[tokio::test]
async fn test_remote_mutation_reaches_backend_and_audit_trail() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let engine = remote_engine(remote.clone());
    engine.sign_in(&alice()).await.unwrap();

    let products = engine.registry().collection(TableId::Products).unwrap();
    products
        .update("prd-chair", |chair| chair.set("stock", 37))
        .await
        .unwrap();
    engine.activity().flush().await;

    let chair = remote
        .rows(TableId::Products)
        .unwrap()
        .into_iter()
        .find(|row| row["id"] == json!("prd-chair"))
        .unwrap();
    assert_eq!(chair["stock"].as_i64(), Some(37));

    let audit = remote.rows(TableId::ActivityLog).unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0]["actor"], Value::from("alice"));
    assert_eq!(engine.activity().stats().written, 1);
}

#[tokio::test]
async fn test_sign_out_resets_caches_and_blocks_remote() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    remote
        .seed_table(TableId::Users, vec![row(json!({ "id": "usr-remote" }))])
        .unwrap();
    remote
        .seed_table(
            TableId::Products,
            vec![row(json!({ "id": "prd-chair", "stock": 5 }))],
        )
        .unwrap();
    let engine = remote_engine(remote.clone());

    engine.sign_in(&alice()).await.unwrap();
    assert_eq!(chair_stock(&engine), Some(5));

    engine.sign_out().unwrap();
    remote.clear_calls().unwrap();

    assert_eq!(engine.mode(), SyncMode::Unauthenticated);
    assert_eq!(chair_stock(&engine), Some(40));
    let products = engine.registry().collection(TableId::Products).unwrap();
    assert_eq!(
        products.update("prd-chair", |chair| chair.set("stock", 1)).await,
        Err(SyncError::RemoteUnavailable(SyncMode::Unauthenticated))
    );
    assert!(engine
        .registry()
        .load_all()
        .await
        .values()
        .all(|outcome| *outcome == LoadOutcome::Skipped(SyncMode::Unauthenticated)));
    assert!(remote.calls().unwrap().is_empty());
}

#[tokio::test]
async fn test_second_session_skips_seeding() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let engine = remote_engine(remote.clone());

    engine.sign_in(&alice()).await.unwrap();
    engine.session_expired().unwrap();
    remote.clear_calls().unwrap();

    let report = engine.sign_in(&alice()).await.unwrap();

    assert!(report.seed.unwrap().skipped);
    assert!(remote.writes().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_seed_does_not_block_loading() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    remote.fail_on(RemoteOp::HasRows, None).unwrap();
    let engine = remote_engine(remote.clone());

    let report = engine.sign_in(&alice()).await.unwrap();

    assert!(matches!(report.seed, Err(SyncError::SeedFailure { .. })));
    assert_eq!(report.loads[&TableId::Products], LoadOutcome::Fetched(0));
    assert_eq!(engine.mode(), SyncMode::AuthenticatedRemote);
}

#[tokio::test]
async fn test_restored_session_synchronizes() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let engine = remote_engine(remote.clone());

    let report = engine
        .restore_session(Some(Session::new("alice")))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.session.user(), "alice");
    assert_eq!(engine.mode(), SyncMode::AuthenticatedRemote);
    assert!(remote.row_count(TableId::Products).unwrap() > 0);
}

#[tokio::test]
async fn test_rejected_sign_in_leaves_stores_alone() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let engine = remote_engine(remote.clone());

    let result = engine
        .sign_in(&Credentials::new("alice", "wrong"))
        .await;

    assert!(matches!(result, Err(SyncError::AuthenticationFailed(_))));
    assert_eq!(engine.mode(), SyncMode::Unauthenticated);
    assert!(remote.calls().unwrap().is_empty());
    assert!(engine
        .registry()
        .stats()
        .iter()
        .all(|stats| stats.loading));
}
