//! Health gate tests, on paused time

use std::time::Duration;

use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

use crate::common::*;
use fleetctl::errors::FleetError;
use fleetctl::health::{FleetHealthGate, HealthGate};
use fleetctl::models::TargetState;

const URL: &str = "http://10.0.0.5:3000/health";
const METRICS_URL: &str = "http://10.0.0.5:3000/metrics";

#[tokio::test(start_paused = true)]
async fn test_poll_until_healthy_succeeds_before_timeout() {
    let endpoint = ScriptedEndpoint::new().script(
        URL,
        vec![
            Probe::Unreachable,
            Probe::Respond(503, "starting"),
            Probe::Respond(200, HEALTHY_BODY),
        ],
    );
    let gate = HealthGate::new(endpoint.clone());
    let timeout = Duration::from_secs(60);
    let interval = Duration::from_secs(10);

    let start = Instant::now();
    let snapshot = assert_ok!(gate.poll_until_healthy(URL, timeout, interval).await);

    assert!(snapshot.healthy);
    assert_eq!(snapshot.status_code, Some(200));
    let payload = snapshot.payload.unwrap();
    assert_eq!(payload.version.as_deref(), Some("2.0.0"));
    assert_eq!(payload.uptime, Some(12.5));
    assert_eq!(endpoint.calls(), 3);
    assert!(start.elapsed() <= timeout + interval);
}

#[tokio::test(start_paused = true)]
async fn test_poll_until_healthy_times_out() {
    let endpoint = ScriptedEndpoint::new().script(URL, vec![Probe::Respond(500, "down")]);
    let gate = HealthGate::new(endpoint.clone());
    let timeout = Duration::from_secs(30);
    let interval = Duration::from_secs(10);

    let start = Instant::now();
    let err = assert_err!(gate.poll_until_healthy(URL, timeout, interval).await);
    let waited = start.elapsed();

    assert!(err.is_failure());
    match err {
        FleetError::HealthTimeout { elapsed, attempts } => {
            assert!(elapsed > timeout);
            assert_eq!(attempts, 4);
            assert_eq!(attempts as usize, endpoint.calls());
        }
        other => panic!("expected HealthTimeout, got {:?}", other),
    }
    assert!(waited <= timeout + interval);
}

#[tokio::test(start_paused = true)]
async fn test_unparseable_success_is_not_healthy() {
    let endpoint = ScriptedEndpoint::new().script(URL, vec![Probe::Respond(200, "OK")]);
    let gate = HealthGate::new(endpoint);

    let snapshot = gate.check(URL).await;
    assert!(!snapshot.healthy);
    assert_eq!(snapshot.status_code, Some(200));
    assert!(snapshot.payload.is_none());

    let err = assert_err!(
        gate.poll_until_healthy(URL, Duration::from_secs(5), Duration::from_secs(2))
            .await
    );
    assert!(matches!(err, FleetError::HealthTimeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_continuous_monitor_passes_at_threshold() {
    // 1 failure in 20 checks is exactly 95%
    let endpoint = ScriptedEndpoint::new().script(
        URL,
        vec![Probe::Unreachable, Probe::Respond(200, HEALTHY_BODY)],
    );
    let gate = HealthGate::new(endpoint.clone());

    let report = gate
        .continuous_monitor(URL, Duration::from_secs(200), Duration::from_secs(10))
        .await;

    assert_eq!(report.total_checks, 20);
    assert_eq!(report.failed_checks, 1);
    assert_eq!(report.success_rate(), 95.0);
    assert!(report.passed());
}

#[tokio::test(start_paused = true)]
async fn test_continuous_monitor_never_stops_early() {
    let endpoint = ScriptedEndpoint::new().script(
        URL,
        vec![
            Probe::Respond(200, HEALTHY_BODY),
            Probe::Unreachable,
            Probe::Respond(502, "bad gateway"),
            Probe::Respond(200, HEALTHY_BODY),
        ],
    );
    let gate = HealthGate::new(endpoint.clone());

    let report = gate
        .continuous_monitor(URL, Duration::from_secs(100), Duration::from_secs(10))
        .await;

    assert_eq!(report.total_checks, 10);
    assert_eq!(report.failed_checks, 2);
    assert_eq!(endpoint.calls(), 10);
    assert!(!report.passed());
}

#[tokio::test(start_paused = true)]
async fn test_check_metrics() {
    let endpoint = ScriptedEndpoint::new()
        .script(URL, vec![Probe::Respond(200, HEALTHY_BODY)])
        .script(
            METRICS_URL,
            vec![Probe::Respond(200, "# TYPE up gauge\nup 1\n")],
        );
    let gate = HealthGate::new(endpoint);

    assert!(gate.check_metrics(URL).await);
}

#[tokio::test(start_paused = true)]
async fn test_check_metrics_unavailable() {
    let endpoint = ScriptedEndpoint::new().script(METRICS_URL, vec![Probe::Respond(404, "")]);
    let gate = HealthGate::new(endpoint.clone());

    assert!(!gate.check_metrics(URL).await);
    assert!(!gate.check_metrics("not a url").await);
    assert_eq!(endpoint.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fleet_healthy_when_all_targets_healthy() {
    let targets = FakeTargets::with_polls(vec![
        Some(vec![TargetState::Healthy, TargetState::Initial, TargetState::Healthy]),
        Some(vec![TargetState::Healthy; 3]),
    ]);
    let gate = FleetHealthGate::new(targets.clone());

    let health = assert_ok!(
        gate.poll_until_fleet_healthy(TARGET_GROUP, 5, Duration::from_secs(15))
            .await
    );
    assert_eq!((health.healthy, health.total), (3, 3));
    assert_eq!(targets.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_target_group_never_healthy() {
    let targets = FakeTargets::with_polls(vec![Some(vec![])]);
    let gate = FleetHealthGate::new(targets.clone());

    let start = Instant::now();
    let err = assert_err!(
        gate.poll_until_fleet_healthy(TARGET_GROUP, 3, Duration::from_secs(15))
            .await
    );

    match err {
        FleetError::FleetUnhealthy {
            attempts,
            healthy,
            total,
        } => assert_eq!((attempts, healthy, total), (3, 0, 0)),
        other => panic!("expected FleetUnhealthy, got {:?}", other),
    }
    assert_eq!(targets.calls(), 3);
    // No sleep after the last attempt
    assert_eq!(start.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_failed_target_polls_use_up_attempts() {
    let targets = FakeTargets::with_polls(vec![
        None,
        None,
        Some(vec![TargetState::Healthy, TargetState::Healthy]),
    ]);
    let gate = FleetHealthGate::new(targets.clone());

    assert_ok!(
        gate.poll_until_fleet_healthy(TARGET_GROUP, 3, Duration::from_secs(15))
            .await
    );

    let targets = FakeTargets::with_polls(vec![None, None, None]);
    let gate = FleetHealthGate::new(targets.clone());
    let err = assert_err!(
        gate.poll_until_fleet_healthy(TARGET_GROUP, 2, Duration::from_secs(15))
            .await
    );
    assert!(matches!(err, FleetError::FleetUnhealthy { attempts: 2, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_missing_target_group_aborts() {
    let targets = FakeTargets::missing();
    let gate = FleetHealthGate::new(targets.clone());

    let err = assert_err!(
        gate.poll_until_fleet_healthy(TARGET_GROUP, 20, Duration::from_secs(15))
            .await
    );
    assert!(matches!(err, FleetError::TargetGroupNotFound(_)));
    assert_eq!(targets.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_fleet_polling() {
    let targets = FakeTargets::with_polls(vec![Some(vec![
        TargetState::Healthy,
        TargetState::Unhealthy,
    ])]);
    let (trigger, shutdown) = fleetctl::shutdown::channel();
    trigger.trigger();
    let gate = FleetHealthGate::new(targets.clone()).with_shutdown(shutdown);

    let err = assert_err!(
        gate.poll_until_fleet_healthy(TARGET_GROUP, 20, Duration::from_secs(15))
            .await
    );
    assert!(matches!(err, FleetError::Cancelled(_)));
    assert_eq!(targets.calls(), 1);
}
