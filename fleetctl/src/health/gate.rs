//! Health endpoint gate
//!
//! Polls a fleet member's health endpoint until it reports healthy or a
//! deadline passes, or samples it for a fixed duration to check
//! availability.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, warn};
use url::Url;

use crate::cloud::HealthEndpoint;
use crate::errors::FleetError;
use crate::models::{HealthPayload, HealthSnapshot, MonitorReport};

/// Gate on a single health endpoint
pub struct HealthGate {
    endpoint: Arc<dyn HealthEndpoint>,
}

impl HealthGate {
    pub fn new(endpoint: Arc<dyn HealthEndpoint>) -> Self {
        Self { endpoint }
    }

    /// Query the endpoint once. Transport failures, non-2xx statuses and
    /// unparseable bodies all yield an unhealthy snapshot.
    pub async fn check(&self, url: &str) -> HealthSnapshot {
        match self.endpoint.get(url).await {
            Ok(response) => {
                let snapshot = HealthSnapshot::from_response(&response);
                if !snapshot.healthy {
                    warn!("Health check returned {}", response.status_code);
                }
                snapshot
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                HealthSnapshot::unreachable()
            }
        }
    }

    /// Poll `url` every `interval` until it is healthy.
    ///
    /// The deadline is checked before each attempt, so the call returns at
    /// most one interval after `timeout` (plus the duration of one probe).
    /// Fails with `HealthTimeout` carrying the elapsed time and the number
    /// of probes made.
    pub async fn poll_until_healthy(
        &self,
        url: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<HealthSnapshot, FleetError> {
        info!("Waiting for application to be healthy at {}", url);
        info!("Timeout: {:?}, Check interval: {:?}", timeout, interval);

        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            let elapsed = start.elapsed();
            if elapsed > timeout {
                error!("Timeout after {:.1?} ({} attempts)", elapsed, attempts);
                return Err(FleetError::HealthTimeout { elapsed, attempts });
            }

            attempts += 1;
            info!("Attempt {} (elapsed: {:.1?})", attempts, elapsed);

            let snapshot = self.check(url).await;
            if snapshot.healthy {
                info!(
                    "Application is healthy after {:.1?} ({} attempts)",
                    start.elapsed(),
                    attempts
                );
                if let Some(payload) = &snapshot.payload {
                    log_health_details(payload);
                }
                return Ok(snapshot);
            }

            info!("Waiting {:?} before next check...", interval);
            tokio::time::sleep(interval).await;
        }
    }

    /// Sample `url` every `interval` for `duration` and report the success
    /// rate. Failed checks never end the run early.
    pub async fn continuous_monitor(
        &self,
        url: &str,
        duration: Duration,
        interval: Duration,
    ) -> MonitorReport {
        info!("Starting continuous health monitoring for {:?}", duration);

        let start = Instant::now();
        let mut report = MonitorReport {
            total_checks: 0,
            failed_checks: 0,
        };

        while start.elapsed() < duration {
            report.total_checks += 1;
            let snapshot = self.check(url).await;

            if snapshot.healthy {
                info!("Check {} passed", report.total_checks);
            } else {
                report.failed_checks += 1;
                warn!(
                    "Failed check {}/{}",
                    report.failed_checks, report.total_checks
                );
            }

            tokio::time::sleep(interval).await;
        }

        info!(
            total_checks = report.total_checks,
            failed_checks = report.failed_checks,
            success_rate = format!("{:.2}%", report.success_rate()),
            passed = report.passed(),
            "Monitoring summary"
        );
        report
    }

    /// Check that the metrics endpoint next to `health_url` responds.
    ///
    /// Informational only: problems are logged and reported as `false`.
    pub async fn check_metrics(&self, health_url: &str) -> bool {
        let metrics_url = match metrics_url(health_url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot derive metrics endpoint: {}", e);
                return false;
            }
        };
        info!("Checking metrics endpoint: {}", metrics_url);

        match self.endpoint.get(&metrics_url).await {
            Ok(response) if (200..300).contains(&response.status_code) => {
                let lines = response.body.lines().count();
                info!("Metrics endpoint available ({} lines)", lines);
                true
            }
            Ok(response) => {
                warn!("Metrics endpoint returned {}", response.status_code);
                false
            }
            Err(e) => {
                warn!("Metrics check failed: {}", e);
                false
            }
        }
    }
}

/// Metrics URL for a health URL: `/health` in the path becomes `/metrics`
pub fn metrics_url(health_url: &str) -> Result<String, FleetError> {
    let mut url = Url::parse(health_url)
        .map_err(|e| FleetError::ValidationError(format!("Invalid URL {}: {}", health_url, e)))?;
    let path = url.path().replace("/health", "/metrics");
    url.set_path(&path);
    Ok(url.to_string())
}

fn log_health_details(payload: &HealthPayload) {
    info!(
        status = payload.status.as_deref().unwrap_or("unknown"),
        timestamp = payload.timestamp.as_deref().unwrap_or("unknown"),
        uptime = format!("{:.2}s", payload.uptime.unwrap_or(0.0)),
        environment = payload.environment.as_deref().unwrap_or("unknown"),
        version = payload.version.as_deref().unwrap_or("unknown"),
        "Health check details"
    );
}
