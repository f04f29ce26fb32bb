mod sync_utils;

use serde_json::json;
use std::sync::Arc;
use sync_utils::*;
use syncdeck::remote::RemoteCall;
use syncdeck::{
    BaselineDataset, Entity, Fields, InMemoryRemoteStore, RemoteOp, SeedCoordinator, SyncError,
    SyncMode, TableId,
};
use tokio_test::assert_ok;

fn dataset() -> BaselineDataset {
    let mut settings = Fields::new();
    settings.insert("currency".into(), json!("XOF"));

    BaselineDataset::empty()
        .with_collection(
            TableId::Users,
            vec![Entity::new("usr-1").with("name", "Admin")],
        )
        .unwrap()
        .with_collection(TableId::Products, vec![stocked("A", 10), stocked("B", 1)])
        .unwrap()
        .with_collection(TableId::Courses, Vec::new())
        .unwrap()
        .with_document(TableId::Settings, settings)
        .unwrap()
}

fn coordinator(remote: Arc<InMemoryRemoteStore>) -> SeedCoordinator {
    SeedCoordinator::new(remote_gate(remote), Arc::new(dataset()), TableId::Users)
}

fn written_tables(remote: &InMemoryRemoteStore) -> Vec<TableId> {
    remote
        .writes()
        .unwrap()
        .iter()
        .map(RemoteCall::table)
        .collect()
}

#[tokio::test]
async fn test_empty_remote_receives_baseline_once() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let seeder = coordinator(remote.clone());

    let report = assert_ok!(seeder.seed_if_empty().await);

    assert!(!report.skipped);
    assert!(report.is_complete());
    // Empty collections are skipped and the marker table goes last.
    assert_eq!(
        written_tables(&remote),
        vec![TableId::Products, TableId::Settings, TableId::Users]
    );
    assert_eq!(remote.row_count(TableId::Products).unwrap(), 2);
    assert_eq!(
        remote.rows(TableId::Settings).unwrap(),
        vec![row(json!({ "id": "config", "currency": "XOF" }))]
    );

    remote.clear_calls().unwrap();
    let again = seeder.seed_if_empty().await.unwrap();
    assert!(again.skipped);
    assert!(remote.writes().unwrap().is_empty());
}

#[tokio::test]
async fn test_populated_marker_skips_every_write() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    remote
        .seed_table(TableId::Users, vec![row(json!({ "id": "existing" }))])
        .unwrap();
    let seeder = coordinator(remote.clone());

    for _ in 0..2 {
        assert!(seeder.seed_if_empty().await.unwrap().skipped);
    }

    assert!(remote.writes().unwrap().is_empty());
    assert_eq!(remote.row_count(TableId::Products).unwrap(), 0);
}

#[tokio::test]
async fn test_failing_table_does_not_stop_the_others() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    remote
        .fail_on(RemoteOp::UpsertMany, Some(TableId::Products))
        .unwrap();
    let seeder = coordinator(remote.clone());

    let report = seeder.seed_if_empty().await.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, TableId::Products);
    assert_eq!(report.seeded, vec![TableId::Settings, TableId::Users]);
    assert_eq!(remote.row_count(TableId::Users).unwrap(), 1);
}

#[tokio::test]
async fn test_failed_marker_write_leaves_seed_retryable() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    remote
        .fail_on(RemoteOp::UpsertMany, Some(TableId::Users))
        .unwrap();
    let seeder = coordinator(remote.clone());

    let first = seeder.seed_if_empty().await.unwrap();
    assert_eq!(first.failed.len(), 1);

    remote.clear_failures().unwrap();
    let second = seeder.seed_if_empty().await.unwrap();
    assert!(!second.skipped);
    assert!(second.is_complete());
    assert_eq!(remote.row_count(TableId::Users).unwrap(), 1);
    assert_eq!(remote.row_count(TableId::Products).unwrap(), 2);
}

#[tokio::test]
async fn test_marker_check_failure_is_reported() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    remote.fail_on(RemoteOp::HasRows, None).unwrap();
    let seeder = coordinator(remote.clone());

    let result = seeder.seed_if_empty().await;

    assert!(matches!(result, Err(SyncError::SeedFailure { .. })));
    assert!(remote.writes().unwrap().is_empty());
}

#[tokio::test]
async fn test_seeding_requires_authenticated_remote() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let seeder = SeedCoordinator::new(
        pending_gate(remote.clone()),
        Arc::new(dataset()),
        TableId::Users,
    );

    assert_eq!(
        seeder.seed_if_empty().await,
        Err(SyncError::RemoteUnavailable(SyncMode::Authenticating))
    );
    assert!(remote.calls().unwrap().is_empty());
}

#[tokio::test]
async fn test_sign_out_mid_seed_writes_nothing_further() {
    let remote = Arc::new(GatedRemote::default());
    let gate = remote_gate(remote.clone());
    let seeder = SeedCoordinator::new(gate.clone(), Arc::new(dataset()), TableId::Users);

    // Products is written first; the session ends while it is in flight.
    let (report, ()) = tokio::join!(seeder.seed_if_empty(), async {
        remote.entered.notified().await;
        gate.sign_out().unwrap();
        remote.release.notify_one();
    });

    let report = report.unwrap();
    assert_eq!(report.seeded, vec![TableId::Products]);
    let failed: Vec<TableId> = report.failed.iter().map(|(table, _)| *table).collect();
    assert_eq!(failed, vec![TableId::Settings, TableId::Users]);
    let reason = SyncError::RemoteUnavailable(SyncMode::Unauthenticated).to_string();
    assert!(report.failed.iter().all(|(_, message)| *message == reason));
    assert_eq!(written_tables(&remote.inner), vec![TableId::Products]);
    assert_eq!(remote.inner.row_count(TableId::Users).unwrap(), 0);
}
