//! Rolling refresh driver
//!
//! Publishes launch spec versions, points a fleet at one, starts a rolling
//! instance refresh and polls it to a terminal status.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::cloud::FleetService;
use crate::deploy::userdata::BootScript;
use crate::errors::FleetError;
use crate::models::{
    Environment, FleetDescription, FleetSpec, RefreshHandle, RefreshPreferences, RefreshStatus,
};
use crate::shutdown::Shutdown;

/// Refresh driver options
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// Rolling replacement preferences
    pub preferences: RefreshPreferences,

    /// Interval between refresh status polls
    pub poll_interval: Duration,

    /// Overall limit on waiting for a refresh; unbounded when `None`
    pub deadline: Option<Duration>,

    /// Consecutive failed status polls tolerated before giving up
    pub max_poll_errors: u32,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            preferences: RefreshPreferences::default(),
            poll_interval: Duration::from_secs(30),
            deadline: None,
            max_poll_errors: 5,
        }
    }
}

/// Terminal outcome of a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Successful,
    /// `Failed` or `Cancelled`
    Unsuccessful(RefreshStatus),
}

/// Drives rolling refreshes through the fleet-scaling service
pub struct RefreshDriver {
    fleet: Arc<dyn FleetService>,
    options: RefreshOptions,
    shutdown: Shutdown,
}

impl RefreshDriver {
    pub fn new(fleet: Arc<dyn FleetService>, options: RefreshOptions) -> Self {
        Self {
            fleet,
            options,
            shutdown: Shutdown::never(),
        }
    }

    /// Stop waiting on a refresh once `shutdown` fires
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Read the fleet's current launch template
    pub async fn describe_fleet(&self, fleet_name: &str) -> Result<FleetDescription, FleetError> {
        let fleet = self.fleet.describe_fleet(fleet_name).await?;
        info!(
            fleet = %fleet.name,
            launch_template = %fleet.launch_template_id,
            version = ?fleet.launch_template_version,
            "Using fleet"
        );
        Ok(fleet)
    }

    /// Create a new launch spec version running `image`
    pub async fn publish_fleet_spec(
        &self,
        launch_template_id: &str,
        image: &str,
        environment: Environment,
    ) -> Result<FleetSpec, FleetError> {
        info!("Updating launch template with image: {}", image);

        let script = BootScript::new(image, environment)?;
        let spec = self
            .fleet
            .create_launch_spec_version(launch_template_id, &script.encode())
            .await?;

        info!("Created launch template version: {}", spec.version);
        Ok(spec)
    }

    /// Existing versions of a launch template
    pub async fn list_fleet_specs(
        &self,
        launch_template_id: &str,
    ) -> Result<Vec<FleetSpec>, FleetError> {
        self.fleet.list_launch_spec_versions(launch_template_id).await
    }

    /// Make `version` the launch spec for new fleet members.
    ///
    /// Running members are untouched until a refresh replaces them.
    pub async fn point_fleet_at(
        &self,
        fleet_name: &str,
        launch_template_id: &str,
        version: u64,
    ) -> Result<(), FleetError> {
        info!(
            "Updating fleet {} to use launch template version {}",
            fleet_name, version
        );
        self.fleet
            .set_fleet_launch_spec(fleet_name, launch_template_id, version)
            .await
    }

    /// Start a rolling replacement of the fleet's members
    pub async fn start_rolling_refresh(&self, fleet_name: &str) -> Result<RefreshHandle, FleetError> {
        let preferences = &self.options.preferences;
        info!(
            min_healthy_percent = preferences.min_healthy_percent,
            warmup_secs = preferences.warmup.as_secs(),
            "Starting instance refresh for {}",
            fleet_name
        );

        let refresh_id = self
            .fleet
            .start_instance_refresh(fleet_name, preferences)
            .await?;
        info!("Instance refresh started: {}", refresh_id);

        Ok(RefreshHandle::new(fleet_name, refresh_id))
    }

    /// Poll a refresh until it reaches a terminal status.
    ///
    /// `Failed` and `Cancelled` are returned as an unsuccessful outcome, not
    /// an error. A refresh id the service no longer knows fails with
    /// `RefreshNotFound`. Failed polls are retried up to `max_poll_errors`
    /// times in a row, then it fails with `RefreshPollBudgetExhausted`. A
    /// shutdown request ends the wait with `Cancelled`. The loop itself is
    /// unbounded; see [`RefreshDriver::await_completion_within`].
    pub async fn await_completion(
        &self,
        handle: &mut RefreshHandle,
    ) -> Result<RefreshOutcome, FleetError> {
        info!("Monitoring instance refresh {}...", handle.refresh_id);
        let mut poll_errors = 0;

        loop {
            let polled = self
                .fleet
                .describe_instance_refresh(&handle.fleet_name, &handle.refresh_id)
                .await;

            match polled {
                Ok(Some(progress)) => {
                    poll_errors = 0;
                    if let Err(e) = handle.advance(progress) {
                        warn!("Ignoring stale refresh status: {}", e);
                    }
                }
                Ok(None) => {
                    error!("Instance refresh {} not found", handle.refresh_id);
                    return Err(FleetError::RefreshNotFound(handle.refresh_id.clone()));
                }
                Err(e) if e.is_not_found() => return Err(e),
                Err(e) => {
                    poll_errors += 1;
                    if poll_errors > self.options.max_poll_errors {
                        error!(
                            "Giving up on instance refresh {} after {} failed polls",
                            handle.refresh_id, poll_errors
                        );
                        return Err(FleetError::RefreshPollBudgetExhausted {
                            refresh_id: handle.refresh_id.clone(),
                            attempts: poll_errors,
                            last_error: e.to_string(),
                        });
                    }
                    warn!(
                        "Failed to poll instance refresh ({}/{}): {}",
                        poll_errors, self.options.max_poll_errors, e
                    );
                }
            }

            match handle.status {
                RefreshStatus::Successful => {
                    info!("Instance refresh completed successfully");
                    return Ok(RefreshOutcome::Successful);
                }
                RefreshStatus::Failed | RefreshStatus::Cancelled => {
                    error!("Instance refresh {}", handle.status);
                    return Ok(RefreshOutcome::Unsuccessful(handle.status));
                }
                RefreshStatus::Pending | RefreshStatus::InProgress => {
                    info!(
                        "Instance refresh in progress: {}%",
                        handle.percent_complete
                    );
                    self.shutdown
                        .sleep(self.options.poll_interval, "instance refresh")
                        .await?;
                }
            }
        }
    }

    /// [`RefreshDriver::await_completion`] bounded by the configured
    /// deadline, if any. Fails with `RefreshTimeout` when it passes; the
    /// refresh itself keeps running server-side.
    pub async fn await_completion_within(
        &self,
        handle: &mut RefreshHandle,
    ) -> Result<RefreshOutcome, FleetError> {
        let Some(deadline) = self.options.deadline else {
            return self.await_completion(handle).await;
        };

        debug!("Waiting at most {:?} for the refresh", deadline);
        let bounded = tokio::time::timeout(deadline, self.await_completion(handle)).await;
        match bounded {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(
                    "Instance refresh {} still {} after {:?}",
                    handle.refresh_id, handle.status, deadline
                );
                Err(FleetError::RefreshTimeout(deadline))
            }
        }
    }
}
