//! Orchestrator tests, on paused time

use std::time::Duration;

use crate::common::*;
use fleetctl::deploy::userdata::{decode, embedded_image};
use fleetctl::deploy::{DeployRequest, RefreshOptions, RollbackRequest};
use fleetctl::models::{DeploymentStatus, Environment, RecordKind, RefreshStatus, TargetState};

fn deploy_request() -> DeployRequest {
    DeployRequest {
        version: "2.0.0".to_string(),
        image: "app:2.0".to_string(),
    }
}

fn successful_refresh() -> Vec<Poll> {
    vec![
        Poll::Status(RefreshStatus::InProgress, 50),
        Poll::Status(RefreshStatus::Successful, 100),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_deploy_success() {
    let fleet = FakeFleet::with_polls(successful_refresh());
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh_options());

    let report = orchestrator.deploy(&deploy_request()).await;

    assert!(report.succeeded());
    assert!(report.reason.is_none());
    assert!(report.history_error.is_none());

    let records = objects.records(BUCKET);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record, &report.record);
    assert_eq!(record.kind, RecordKind::Deploy);
    assert_eq!(record.environment, Environment::Production);
    assert_eq!(record.version, "2.0.0");
    assert_eq!(record.image, "app:2.0");
    assert_eq!(record.status, DeploymentStatus::Success);
    assert_eq!(report.record_key.as_deref(), Some(record.key().as_str()));

    // The new version is published, then pointed at, then rolled out
    let specs = fleet.specs();
    assert_eq!(specs.len(), 1);
    let script = decode(&specs[0].user_data).unwrap();
    assert_eq!(embedded_image(&script), Some("app:2.0"));
    assert_eq!(fleet.pointed_at(), vec![specs[0].version]);
    assert_eq!(fleet.refreshes_started(), 1);
    assert_eq!(targets.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deploy_with_failed_refresh_skips_health_gate() {
    let fleet = FakeFleet::with_polls(vec![
        Poll::Status(RefreshStatus::InProgress, 20),
        Poll::Status(RefreshStatus::Failed, 20),
    ]);
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh_options());

    let report = orchestrator.deploy(&deploy_request()).await;

    assert!(!report.succeeded());
    assert_eq!(report.reason.as_deref(), Some("Instance refresh Failed"));
    assert_eq!(targets.calls(), 0);

    let records = objects.records(BUCKET);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, DeploymentStatus::Failed);
    assert_eq!(records[0].image, "app:2.0");
}

#[tokio::test(start_paused = true)]
async fn test_deploy_with_unhealthy_fleet_fails() {
    let fleet = FakeFleet::with_polls(successful_refresh());
    let targets = FakeTargets::with_polls(vec![Some(vec![
        TargetState::Healthy,
        TargetState::Unhealthy,
        TargetState::Healthy,
    ])]);
    let objects = MemoryObjectStore::new();
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh_options());

    let report = orchestrator.deploy(&deploy_request()).await;

    assert!(!report.succeeded());
    assert_eq!(report.record.status, DeploymentStatus::Failed);
    assert_eq!(targets.calls(), 3);
    assert!(report.reason.unwrap().contains("2/3"));
    assert_eq!(objects.records(BUCKET).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deploy_to_missing_fleet_fails() {
    let fleet = FakeFleet::new();
    fleet.remove_fleet();
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh_options());

    let report = orchestrator.deploy(&deploy_request()).await;

    assert_eq!(report.record.status, DeploymentStatus::Failed);
    assert!(fleet.specs().is_empty());
    assert_eq!(objects.records(BUCKET).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deploy_refresh_timeout_fails() {
    let fleet = FakeFleet::with_polls(vec![Poll::Status(RefreshStatus::InProgress, 10)]);
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    let refresh = RefreshOptions {
        deadline: Some(Duration::from_secs(600)),
        ..refresh_options()
    };
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh);

    let report = orchestrator.deploy(&deploy_request()).await;

    assert_eq!(report.record.status, DeploymentStatus::Failed);
    assert_eq!(targets.calls(), 0);
    assert_eq!(objects.records(BUCKET).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unexpected_fault_is_an_error() {
    let fleet = FakeFleet::with_polls(successful_refresh());
    fleet.fail_publish();
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh_options());

    let report = orchestrator.deploy(&deploy_request()).await;

    assert_eq!(report.record.status, DeploymentStatus::Error);
    assert!(report.reason.unwrap().contains("500"));
    assert!(fleet.pointed_at().is_empty());
    assert_eq!(objects.records(BUCKET).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_image_is_an_error() {
    let fleet = FakeFleet::with_polls(successful_refresh());
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh_options());

    let report = orchestrator
        .deploy(&DeployRequest {
            version: "2.0.0".to_string(),
            image: "app:2.0 && reboot".to_string(),
        })
        .await;

    assert_eq!(report.record.status, DeploymentStatus::Error);
    assert!(fleet.specs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_panic_is_recorded_as_error() {
    let fleet = FakeFleet::with_polls(successful_refresh());
    fleet.panic_on_refresh();
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh_options());

    let report = orchestrator.deploy(&deploy_request()).await;

    assert_eq!(report.record.status, DeploymentStatus::Error);
    assert!(report.reason.unwrap().contains("refresh service exploded"));
    let records = objects.records(BUCKET);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, DeploymentStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn test_history_failure_does_not_mask_outcome() {
    let fleet = FakeFleet::with_polls(successful_refresh());
    let targets = FakeTargets::healthy(2);
    let objects = MemoryObjectStore::new();
    objects.fail_writes();
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh_options());

    let report = orchestrator.deploy(&deploy_request()).await;

    assert!(report.succeeded());
    assert!(report.record_key.is_none());
    assert!(report.history_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_rollback_to_latest_successful() {
    let fleet = FakeFleet::with_polls(successful_refresh());
    fleet.add_spec("registry.local/app:v1");
    let v2 = fleet.add_spec("registry.local/app:v2");
    fleet.add_spec("registry.local/app:v3");
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    objects.insert_record(BUCKET, &deployed(1, "v1", DeploymentStatus::Success));
    objects.insert_record(BUCKET, &deployed(2, "v2", DeploymentStatus::Success));
    objects.insert_record(BUCKET, &deployed(3, "v3", DeploymentStatus::Failed));
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh_options());

    let report = orchestrator.rollback(&RollbackRequest::default()).await;

    assert!(report.succeeded());
    assert_eq!(report.record.kind, RecordKind::Rollback);
    assert_eq!(report.record.version, "v2");
    assert_eq!(report.record.image, "registry.local/app:v2");
    assert!(report
        .record_key
        .as_deref()
        .unwrap()
        .starts_with("rollbacks/"));

    // Existing version reused, nothing published
    assert_eq!(fleet.specs().len(), 3);
    assert_eq!(fleet.pointed_at(), vec![v2]);
    assert_eq!(fleet.refreshes_started(), 1);
    assert_eq!(targets.calls(), 1);
    assert_eq!(objects.records(BUCKET).len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_rollback_to_explicit_image_publishes() {
    let fleet = FakeFleet::with_polls(successful_refresh());
    fleet.add_spec("registry.local/app:v3");
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh_options());

    let report = orchestrator
        .rollback(&RollbackRequest {
            version: Some("v1".to_string()),
            image: Some("registry.local/app:v1".to_string()),
        })
        .await;

    assert!(report.succeeded());
    assert_eq!(report.record.version, "v1");
    assert_eq!(fleet.specs().len(), 2);
    assert_eq!(fleet.pointed_at(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn test_rollback_without_target_is_recorded() {
    let fleet = FakeFleet::with_polls(successful_refresh());
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    objects.insert_record(BUCKET, &deployed(1, "v1", DeploymentStatus::Failed));
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh_options());

    let report = orchestrator.rollback(&RollbackRequest::default()).await;

    assert!(!report.succeeded());
    assert_eq!(report.record.kind, RecordKind::Rollback);
    assert_eq!(report.record.status, DeploymentStatus::Failed);
    assert_eq!(report.record.version, "");
    assert_eq!(fleet.refreshes_started(), 0);
    assert!(fleet.pointed_at().is_empty());
    assert_eq!(objects.records(BUCKET).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rollback_with_failed_refresh() {
    let fleet = FakeFleet::with_polls(vec![Poll::Status(RefreshStatus::Cancelled, 0)]);
    fleet.add_spec("registry.local/app:v1");
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    objects.insert_record(BUCKET, &deployed(1, "v1", DeploymentStatus::Success));
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh_options());

    let report = orchestrator.rollback(&RollbackRequest::default()).await;

    assert_eq!(report.record.status, DeploymentStatus::Failed);
    assert_eq!(report.record.version, "v1");
    assert_eq!(report.reason.as_deref(), Some("Instance refresh Cancelled"));
    assert_eq!(targets.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_poll_budget_exhaustion_fails() {
    let fleet = FakeFleet::with_polls(vec![
        Poll::Status(RefreshStatus::InProgress, 10),
        Poll::Transient,
    ]);
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    let refresh = RefreshOptions {
        max_poll_errors: 2,
        ..refresh_options()
    };
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh);

    let report = orchestrator.deploy(&deploy_request()).await;

    assert_eq!(report.record.status, DeploymentStatus::Failed);
    assert!(report.reason.unwrap().contains("Gave up on instance refresh"));
    assert_eq!(targets.calls(), 0);
    assert_eq!(objects.records(BUCKET).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_interrupted_deploy_is_recorded_once() {
    let fleet = FakeFleet::with_polls(vec![Poll::Status(RefreshStatus::InProgress, 10)]);
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    let (trigger, shutdown) = fleetctl::shutdown::channel();
    let orchestrator =
        orchestrator(&fleet, &targets, &objects, refresh_options()).with_shutdown(shutdown);

    let request = deploy_request();
    let (report, _) = tokio::join!(orchestrator.deploy(&request), async {
        tokio::time::sleep(Duration::from_secs(45)).await;
        trigger.trigger();
    });

    assert_eq!(report.record.status, DeploymentStatus::Error);
    assert!(report.reason.unwrap().contains("Cancelled"));
    assert_eq!(fleet.refreshes_started(), 1);
    assert_eq!(targets.calls(), 0);

    let records = objects.records(BUCKET);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, DeploymentStatus::Error);
    assert_eq!(records[0].image, "app:2.0");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_refresh_starts_nothing() {
    let fleet = FakeFleet::with_polls(successful_refresh());
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    let (trigger, shutdown) = fleetctl::shutdown::channel();
    trigger.trigger();
    let orchestrator =
        orchestrator(&fleet, &targets, &objects, refresh_options()).with_shutdown(shutdown);

    let report = orchestrator.deploy(&deploy_request()).await;

    assert_eq!(report.record.status, DeploymentStatus::Error);
    assert!(fleet.specs().is_empty());
    assert_eq!(fleet.refreshes_started(), 0);
    assert_eq!(objects.records(BUCKET).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rollback_records_resolved_target_when_spec_lookup_fails() {
    let fleet = FakeFleet::with_polls(successful_refresh());
    fleet.fail_publish();
    let targets = FakeTargets::healthy(3);
    let objects = MemoryObjectStore::new();
    objects.insert_record(BUCKET, &deployed(1, "v1", DeploymentStatus::Success));
    let orchestrator = orchestrator(&fleet, &targets, &objects, refresh_options());

    let report = orchestrator.rollback(&RollbackRequest::default()).await;

    assert_eq!(report.record.status, DeploymentStatus::Error);
    assert_eq!(report.record.version, "v1");
    assert_eq!(report.record.image, "registry.local/app:v1");
    assert!(fleet.pointed_at().is_empty());
}
