//! History store tests

use chrono::{TimeZone, Utc};
use tokio_test::{assert_err, assert_ok};

use crate::common::*;
use fleetctl::errors::FleetError;
use fleetctl::filesys::FileObjectStore;
use fleetctl::history::HistoryStore;
use fleetctl::models::{DeploymentRecord, DeploymentStatus, Environment, RecordKind};

#[tokio::test]
async fn test_recent_on_empty_store() {
    let objects = MemoryObjectStore::new();
    let history = history(&objects);

    let records = assert_ok!(history.recent(20).await);
    assert!(records.is_empty());
    assert!(assert_ok!(history.find_latest_successful(20).await).is_none());
}

#[tokio::test]
async fn test_recent_is_newest_first_and_limited() {
    let objects = MemoryObjectStore::new();
    for (minute, version) in [(1, "1.0"), (5, "1.4"), (3, "1.2"), (4, "1.3"), (2, "1.1")] {
        objects.insert_record(BUCKET, &deployed(minute, version, DeploymentStatus::Success));
    }
    let history = history(&objects);

    let records = assert_ok!(history.recent(3).await);
    let versions: Vec<_> = records.iter().map(|r| r.version.as_str()).collect();
    assert_eq!(versions, ["1.4", "1.3", "1.2"]);
}

#[tokio::test]
async fn test_find_latest_successful_skips_failures() {
    let objects = MemoryObjectStore::new();
    objects.insert_record(BUCKET, &deployed(1, "1.0", DeploymentStatus::Success));
    objects.insert_record(BUCKET, &deployed(2, "1.1", DeploymentStatus::Success));
    objects.insert_record(BUCKET, &deployed(3, "1.2", DeploymentStatus::Failed));
    objects.insert_record(BUCKET, &deployed(4, "1.3", DeploymentStatus::Error));
    let history = history(&objects);

    let found = assert_ok!(history.find_latest_successful(20).await).unwrap();
    assert_eq!(found.version, "1.1");
    assert_eq!(found.image, "registry.local/app:1.1");
}

#[tokio::test]
async fn test_find_latest_successful_respects_window() {
    let objects = MemoryObjectStore::new();
    objects.insert_record(BUCKET, &deployed(1, "1.0", DeploymentStatus::Success));
    objects.insert_record(BUCKET, &deployed(2, "1.1", DeploymentStatus::Failed));
    objects.insert_record(BUCKET, &deployed(3, "1.2", DeploymentStatus::Failed));
    let history = history(&objects);

    assert!(assert_ok!(history.find_latest_successful(2).await).is_none());
    assert!(assert_ok!(history.find_latest_successful(3).await).is_some());
}

#[tokio::test]
async fn test_rollback_records_are_kept_apart() {
    let objects = MemoryObjectStore::new();
    objects.insert_record(BUCKET, &deployed(1, "1.0", DeploymentStatus::Success));
    objects.insert_record(
        BUCKET,
        &record(2, RecordKind::Rollback, "0.9", "registry.local/app:0.9", DeploymentStatus::Success),
    );
    let history = history(&objects);

    let deployments = assert_ok!(history.recent(20).await);
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].version, "1.0");

    let rollbacks = assert_ok!(history.recent_of(RecordKind::Rollback, 20).await);
    assert_eq!(rollbacks.len(), 1);
    assert_eq!(rollbacks[0].kind, RecordKind::Rollback);
}

#[tokio::test]
async fn test_listing_follows_pages() {
    let objects = MemoryObjectStore::with_page_size(2);
    for minute in 1..=7 {
        objects.insert_record(
            BUCKET,
            &deployed(minute, &format!("1.{}", minute), DeploymentStatus::Success),
        );
    }
    let history = history(&objects);

    let records = assert_ok!(history.recent(20).await);
    assert_eq!(records.len(), 7);
    assert_eq!(records[0].version, "1.7");
    assert_eq!(records[6].version, "1.1");
}

#[tokio::test]
async fn test_append_writes_under_timestamp_key() {
    let objects = MemoryObjectStore::new();
    let history = history(&objects);
    let record = DeploymentRecord::new(
        RecordKind::Deploy,
        Environment::Production,
        "2.0",
        "registry.local/app:2.0",
        DeploymentStatus::Success,
    );

    let key = assert_ok!(history.append(&record).await);
    assert!(key.starts_with("deployments/"));
    assert!(key.ends_with("Z.json"));
    assert_eq!(objects.keys(BUCKET), vec![key]);
    assert_eq!(objects.records(BUCKET), vec![record]);
}

#[tokio::test]
async fn test_append_same_record_twice_is_deduplicated() {
    let objects = MemoryObjectStore::new();
    let history = history(&objects);
    let record = deployed(1, "1.0", DeploymentStatus::Success);

    let first = assert_ok!(history.append(&record).await);
    let second = assert_ok!(history.append(&record).await);
    assert_eq!(first, second);
    assert_eq!(objects.keys(BUCKET).len(), 1);
}

#[tokio::test]
async fn test_append_never_overwrites_a_different_record() {
    let objects = MemoryObjectStore::new();
    let history = history(&objects);
    let original = deployed(1, "1.0", DeploymentStatus::Success);
    let mut conflicting = original.clone();
    conflicting.status = DeploymentStatus::Failed;

    assert_ok!(history.append(&original).await);
    let err = assert_err!(history.append(&conflicting).await);
    assert!(matches!(err, FleetError::DuplicateRecord(_)));
    assert_eq!(objects.records(BUCKET), vec![original]);
}

#[tokio::test]
async fn test_append_failure_is_a_storage_error() {
    let objects = MemoryObjectStore::new();
    objects.fail_writes();
    let history = history(&objects);

    let err = assert_err!(
        history
            .append(&deployed(1, "1.0", DeploymentStatus::Success))
            .await
    );
    assert!(matches!(err, FleetError::StorageError(_)));
}

#[tokio::test]
async fn test_legacy_and_unreadable_objects() {
    let objects = MemoryObjectStore::new();
    let modified = |minute| Utc.with_ymd_and_hms(2026, 10, 1, 12, minute, 0).unwrap();

    // Written before records carried a kind, with a naive timestamp
    objects.insert_raw(
        BUCKET,
        "deployments/2026-10-01T12:01:00.000000.json",
        br#"{
            "timestamp": "2026-10-01T12:01:00.000000",
            "environment": "production",
            "version": "0.8",
            "image": "registry.local/app:0.8",
            "status": "success"
        }"#,
        modified(1),
    );
    objects.insert_raw(BUCKET, "deployments/garbage.json", b"{not json", modified(2));

    let history = history(&objects);
    let records = assert_ok!(history.recent(20).await);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, RecordKind::Deploy);
    assert_eq!(records[0].version, "0.8");
    assert_eq!(records[0].timestamp, modified(1));
}

#[tokio::test]
async fn test_file_backed_history() {
    let tmp = tempfile::tempdir().unwrap();
    let store = assert_ok!(FileObjectStore::new(tmp.path()).await);
    let history = HistoryStore::new(std::sync::Arc::new(store), "dev-devops-artifacts");

    let older = record(1, RecordKind::Deploy, "1.0", "app:1.0", DeploymentStatus::Success);
    let newer = record(2, RecordKind::Deploy, "1.1", "app:1.1", DeploymentStatus::Failed);
    assert_ok!(history.append(&older).await);
    assert_ok!(history.append(&newer).await);
    assert_ok!(history.append(&newer).await);

    let records = assert_ok!(history.recent(20).await);
    assert_eq!(records, vec![newer, older.clone()]);
    assert_eq!(
        assert_ok!(history.find_latest_successful(20).await),
        Some(older)
    );
    assert!(tmp
        .path()
        .join("dev-devops-artifacts/deployments")
        .is_dir());
}
