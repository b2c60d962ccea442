//! Command runners
//!
//! Build the adapters a command needs from the settings, then run it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::options::{DeployOptions, HealthCheckOptions, RollbackOptions};
use crate::app::settings::{HistoryBackend, Settings};
use crate::cloud::ObjectStore;
use crate::deploy::{
    DeployRequest, OrchestrationReport, Orchestrator, OrchestratorOptions, RefreshDriver,
    RefreshOptions, RollbackRequest,
};
use crate::errors::FleetError;
use crate::filesys::FileObjectStore;
use crate::health::{FleetHealthGate, HealthGate};
use crate::history::HistoryStore;
use crate::http::{HttpClient, HttpProbe};
use crate::models::{Environment, HealthSnapshot, MonitorReport, RefreshPreferences};
use crate::shutdown::Shutdown;

/// Result of a `health-check` run
#[derive(Debug, Clone)]
pub enum HealthCheckOutcome {
    /// The endpoint became healthy
    Healthy {
        snapshot: HealthSnapshot,
        /// Whether the metrics endpoint responded, when it was checked
        metrics_available: Option<bool>,
    },

    /// Continuous monitoring finished
    Monitored(MonitorReport),
}

impl HealthCheckOutcome {
    pub fn passed(&self) -> bool {
        match self {
            HealthCheckOutcome::Healthy { .. } => true,
            HealthCheckOutcome::Monitored(report) => report.passed(),
        }
    }
}

/// Roll an image out to an environment
pub async fn run_deploy(
    settings: Settings,
    options: DeployOptions,
    shutdown: Shutdown,
) -> Result<OrchestrationReport, FleetError> {
    let orchestrator = build_orchestrator(settings, options.environment, &options.region)
        .await?
        .with_shutdown(shutdown);
    let request = DeployRequest {
        version: options.version,
        image: options.image,
    };
    Ok(orchestrator.deploy(&request).await)
}

/// Return an environment to a previous image
pub async fn run_rollback(
    settings: Settings,
    options: RollbackOptions,
    shutdown: Shutdown,
) -> Result<OrchestrationReport, FleetError> {
    let orchestrator = build_orchestrator(settings, options.environment, &options.region)
        .await?
        .with_shutdown(shutdown);
    let request = RollbackRequest {
        version: options.previous_version,
        image: options.image,
    };
    Ok(orchestrator.rollback(&request).await)
}

/// Wait for a health endpoint, or monitor it for a fixed duration
pub async fn run_health_check(options: HealthCheckOptions) -> Result<HealthCheckOutcome, FleetError> {
    let gate = HealthGate::new(Arc::new(HttpProbe::new()?));

    if let Some(duration) = options.monitor_duration() {
        let report = gate
            .continuous_monitor(&options.url, duration, options.interval)
            .await;
        return Ok(HealthCheckOutcome::Monitored(report));
    }

    let snapshot = gate
        .poll_until_healthy(&options.url, options.timeout, options.interval)
        .await?;
    let metrics_available = if options.check_metrics {
        Some(gate.check_metrics(&options.url).await)
    } else {
        None
    };

    Ok(HealthCheckOutcome::Healthy {
        snapshot,
        metrics_available,
    })
}

/// Wire an orchestrator for one environment from the settings
pub async fn build_orchestrator(
    settings: Settings,
    environment: Environment,
    region: &str,
) -> Result<Orchestrator, FleetError> {
    let Settings {
        control_plane,
        history,
        refresh,
        fleet_health,
        naming,
        ..
    } = settings;

    info!(
        "Using control plane {} in {}",
        control_plane.base_url, region
    );
    let mut client = HttpClient::new(&control_plane.base_url, region, control_plane.request_timeout())?;
    if let Some(token) = control_plane.api_token {
        client = client.with_api_token(token);
    }
    let client = Arc::new(client);

    let objects: Arc<dyn ObjectStore> = match history.backend {
        HistoryBackend::File => {
            info!("Storing history under {}", history.root_dir.display());
            Arc::new(FileObjectStore::new(&history.root_dir).await?)
        }
        HistoryBackend::Http => client.clone(),
    };
    let bucket = format!("{}{}", environment, history.bucket_suffix);
    let history_store = HistoryStore::new(objects, bucket);

    let refresh_options = RefreshOptions {
        preferences: RefreshPreferences {
            min_healthy_percent: refresh.min_healthy_percent,
            warmup: Duration::from_secs(refresh.warmup_secs),
        },
        poll_interval: Duration::from_secs(refresh.poll_interval_secs),
        deadline: refresh.deadline_secs.map(Duration::from_secs),
        max_poll_errors: refresh.max_poll_errors,
    };
    if refresh_options.preferences.min_healthy_percent > 100 {
        return Err(FleetError::ConfigError(format!(
            "refresh.min_healthy_percent must be at most 100, got {}",
            refresh_options.preferences.min_healthy_percent
        )));
    }
    if refresh_options.deadline.is_none() {
        warn!("No refresh deadline configured, waiting for the refresh indefinitely");
    }

    let orchestrator_options = OrchestratorOptions {
        fleet_name: naming.fleet_name(environment),
        target_group: naming.target_group(environment),
        history_search_limit: history.search_limit,
        fleet_health_attempts: fleet_health.max_attempts,
        fleet_health_interval: Duration::from_secs(fleet_health.interval_secs),
    };

    Ok(Orchestrator::new(
        environment,
        RefreshDriver::new(client.clone(), refresh_options),
        FleetHealthGate::new(client),
        history_store,
        orchestrator_options,
    ))
}
