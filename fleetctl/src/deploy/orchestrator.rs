//! Deployment orchestrator
//!
//! Composes the refresh driver, the fleet health gate, the rollback selector
//! and the history store into `deploy` and `rollback` runs. Every run writes
//! exactly one record, whatever happens inside it.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::deploy::fsm::{OrchestrationEvent, OrchestrationFsm};
use crate::deploy::refresh::{RefreshDriver, RefreshOutcome};
use crate::deploy::selector::RollbackSelector;
use crate::errors::FleetError;
use crate::health::FleetHealthGate;
use crate::history::store::DEFAULT_SEARCH_LIMIT;
use crate::history::HistoryStore;
use crate::models::{DeploymentRecord, Environment, RecordKind};
use crate::shutdown::Shutdown;

/// Orchestrator options
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Fleet serving the environment
    pub fleet_name: String,

    /// Target group checked after a refresh
    pub target_group: String,

    /// Records scanned when looking for a rollback target
    pub history_search_limit: usize,

    /// Target health polls before giving up
    pub fleet_health_attempts: u32,

    /// Interval between target health polls
    pub fleet_health_interval: Duration,
}

impl OrchestratorOptions {
    /// Default options with the conventional `<env>-asg` and `<env>-tg` names
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            fleet_name: format!("{}-asg", environment),
            target_group: format!("{}-tg", environment),
            history_search_limit: DEFAULT_SEARCH_LIMIT,
            fleet_health_attempts: 20,
            fleet_health_interval: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub version: String,
    pub image: String,
}

/// Rollback target given on the command line; both empty means "latest
/// successful deployment"
#[derive(Debug, Clone, Default)]
pub struct RollbackRequest {
    pub version: Option<String>,
    pub image: Option<String>,
}

/// What a run did and where it was recorded
#[derive(Debug, Clone)]
pub struct OrchestrationReport {
    pub run_id: Uuid,
    pub record: DeploymentRecord,

    /// History key of the record, if the write succeeded
    pub record_key: Option<String>,

    /// Why the record could not be written
    pub history_error: Option<String>,

    /// Why the run failed or errored
    pub reason: Option<String>,
}

impl OrchestrationReport {
    pub fn succeeded(&self) -> bool {
        self.record.is_success()
    }
}

/// Mutable state of one run, readable after the run panics
struct RunState {
    fsm: OrchestrationFsm,
    version: String,
    image: String,
}

impl RunState {
    fn new(version: impl Into<String>, image: impl Into<String>) -> RwLock<Self> {
        RwLock::new(Self {
            fsm: OrchestrationFsm::new(),
            version: version.into(),
            image: image.into(),
        })
    }
}

/// Deployment orchestrator for one environment
pub struct Orchestrator {
    environment: Environment,
    driver: RefreshDriver,
    fleet_gate: FleetHealthGate,
    history: HistoryStore,
    options: OrchestratorOptions,
    shutdown: Shutdown,
}

impl Orchestrator {
    pub fn new(
        environment: Environment,
        driver: RefreshDriver,
        fleet_gate: FleetHealthGate,
        history: HistoryStore,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            environment,
            driver,
            fleet_gate,
            history,
            options,
            shutdown: Shutdown::never(),
        }
    }

    /// End runs early, between polls, once `shutdown` fires.
    ///
    /// An interrupted run is recorded as `error`; a refresh already started
    /// keeps running server-side.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.driver = self.driver.with_shutdown(shutdown.clone());
        self.fleet_gate = self.fleet_gate.with_shutdown(shutdown.clone());
        self.shutdown = shutdown;
        self
    }

    /// Roll `image` out to the fleet and verify target health
    pub async fn deploy(&self, request: &DeployRequest) -> OrchestrationReport {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "orchestration",
            run_id = %run_id,
            kind = RecordKind::Deploy.as_str(),
            environment = %self.environment
        );

        async {
            info!(
                "Deploying {} (version {}) to {}",
                request.image, request.version, self.environment
            );
            let run = RunState::new(&request.version, &request.image);
            let result = AssertUnwindSafe(self.run_deploy(&run, &request.image))
                .catch_unwind()
                .await;
            self.finish(run_id, RecordKind::Deploy, run, result).await
        }
        .instrument(span)
        .await
    }

    /// Return the fleet to a previous image and verify target health
    pub async fn rollback(&self, request: &RollbackRequest) -> OrchestrationReport {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "orchestration",
            run_id = %run_id,
            kind = RecordKind::Rollback.as_str(),
            environment = %self.environment
        );

        async {
            warn!("Rolling back {}", self.environment);
            let run = RunState::new(
                request.version.clone().unwrap_or_default(),
                request.image.clone().unwrap_or_default(),
            );
            let result = AssertUnwindSafe(self.run_rollback(&run, request))
                .catch_unwind()
                .await;
            self.finish(run_id, RecordKind::Rollback, run, result).await
        }
        .instrument(span)
        .await
    }

    async fn run_deploy(&self, run: &RwLock<RunState>, image: &str) -> Result<(), FleetError> {
        let fleet = self.driver.describe_fleet(&self.options.fleet_name).await?;

        self.transition(run, OrchestrationEvent::Prepare).await?;
        self.shutdown.check("launch spec update")?;
        let spec = self
            .driver
            .publish_fleet_spec(&fleet.launch_template_id, image, self.environment)
            .await?;
        self.driver
            .point_fleet_at(&fleet.name, &fleet.launch_template_id, spec.version)
            .await?;

        self.refresh_and_verify(run, &fleet.name).await
    }

    async fn run_rollback(
        &self,
        run: &RwLock<RunState>,
        request: &RollbackRequest,
    ) -> Result<(), FleetError> {
        let fleet = self.driver.describe_fleet(&self.options.fleet_name).await?;
        let selector = RollbackSelector::new(
            &self.history,
            &self.driver,
            self.options.history_search_limit,
        );

        self.transition(run, OrchestrationEvent::Resolve).await?;
        let (version, image) = selector
            .resolve_version(request.version.as_deref(), request.image.as_deref())
            .await?;
        {
            let mut state = run.write().await;
            state.version = version;
            state.image = image.clone();
        }

        self.transition(run, OrchestrationEvent::Prepare).await?;
        self.shutdown.check("launch spec update")?;
        let (spec, reused) = selector
            .launch_spec_for(&fleet.launch_template_id, self.environment, &image)
            .await?;
        debug!(version = spec.version, reused, "Rollback launch spec selected");
        self.driver
            .point_fleet_at(&fleet.name, &fleet.launch_template_id, spec.version)
            .await?;

        self.refresh_and_verify(run, &fleet.name).await
    }

    async fn refresh_and_verify(
        &self,
        run: &RwLock<RunState>,
        fleet_name: &str,
    ) -> Result<(), FleetError> {
        self.shutdown.check("instance refresh start")?;
        let mut handle = self.driver.start_rolling_refresh(fleet_name).await?;
        self.transition(run, OrchestrationEvent::RefreshStarted).await?;

        match self.driver.await_completion_within(&mut handle).await? {
            RefreshOutcome::Successful => {
                self.transition(run, OrchestrationEvent::RefreshSucceeded)
                    .await?
            }
            RefreshOutcome::Unsuccessful(status) => {
                return self
                    .transition(run, OrchestrationEvent::RefreshFailed(status.to_string()))
                    .await;
            }
        }

        self.fleet_gate
            .poll_until_fleet_healthy(
                &self.options.target_group,
                self.options.fleet_health_attempts,
                self.options.fleet_health_interval,
            )
            .await?;
        self.transition(run, OrchestrationEvent::Verified).await
    }

    async fn transition(
        &self,
        run: &RwLock<RunState>,
        event: OrchestrationEvent,
    ) -> Result<(), FleetError> {
        let mut state = run.write().await;
        let from = state.fsm.state();
        state.fsm.process(event)?;
        debug!("Orchestration state {:?} -> {:?}", from, state.fsm.state());
        Ok(())
    }

    /// Classify the run's result, then write its record
    async fn finish(
        &self,
        run_id: Uuid,
        kind: RecordKind,
        run: RwLock<RunState>,
        result: Result<Result<(), FleetError>, Box<dyn Any + Send>>,
    ) -> OrchestrationReport {
        let mut state = run.into_inner();

        let fault = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) if e.is_failure() => Some(OrchestrationEvent::Fail(e.to_string())),
            Ok(Err(e)) => Some(OrchestrationEvent::Fault(e.to_string())),
            Err(panic) => Some(OrchestrationEvent::Fault(format!(
                "panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };
        if let Some(event) = fault {
            if state.fsm.is_terminal() {
                warn!("Ignoring {:?} after the run finished", event);
            } else if let Err(e) = state.fsm.process(event) {
                warn!("{}", e);
            }
        }

        let status = state.fsm.status();
        let reason = state.fsm.reason().map(str::to_string);
        match &reason {
            None => info!("{} {} succeeded", self.environment, kind.as_str()),
            Some(reason) => error!(
                "{} {} {}: {}",
                self.environment,
                kind.as_str(),
                status,
                reason
            ),
        }

        let record =
            DeploymentRecord::new(kind, self.environment, state.version, state.image, status);
        let (record_key, history_error) = match self.history.append(&record).await {
            Ok(key) => (Some(key), None),
            Err(e) => {
                error!("Failed to save deployment record: {}", e);
                (None, Some(e.to_string()))
            }
        };

        OrchestrationReport {
            run_id,
            record,
            record_key,
            history_error,
            reason,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
