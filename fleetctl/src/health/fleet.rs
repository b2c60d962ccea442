//! Fleet-wide health gate on a load balancer target group

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cloud::TargetHealthService;
use crate::errors::FleetError;
use crate::models::FleetHealth;
use crate::shutdown::Shutdown;

pub struct FleetHealthGate {
    targets: Arc<dyn TargetHealthService>,
    shutdown: Shutdown,
}

impl FleetHealthGate {
    pub fn new(targets: Arc<dyn TargetHealthService>) -> Self {
        Self {
            targets,
            shutdown: Shutdown::never(),
        }
    }

    /// Stop polling once `shutdown` fires
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Poll a target group until every registered target is healthy.
    ///
    /// An empty target group never counts as healthy. Failed polls use up an
    /// attempt; a missing target group fails immediately. Fails with
    /// `FleetUnhealthy` after `max_attempts` polls, or `Cancelled` on
    /// shutdown.
    pub async fn poll_until_fleet_healthy(
        &self,
        target_group: &str,
        max_attempts: u32,
        interval: Duration,
    ) -> Result<FleetHealth, FleetError> {
        info!("Verifying deployment health for {}...", target_group);

        let mut last = FleetHealth::default();
        for attempt in 1..=max_attempts {
            match self.targets.describe_target_health(target_group).await {
                Ok(targets) => {
                    last = FleetHealth::from_targets(&targets);
                    info!(
                        "Healthy targets: {}/{} (attempt {}/{})",
                        last.healthy, last.total, attempt, max_attempts
                    );
                    if last.is_fully_healthy() {
                        info!("All targets are healthy");
                        return Ok(last);
                    }
                }
                Err(e) if e.is_not_found() => return Err(e),
                Err(e) => warn!(
                    "Failed to describe target health (attempt {}/{}): {}",
                    attempt, max_attempts, e
                ),
            }

            if attempt < max_attempts {
                self.shutdown.sleep(interval, "fleet health check").await?;
            }
        }

        warn!(
            "Not all targets healthy after {} attempts ({}/{})",
            max_attempts, last.healthy, last.total
        );
        Err(FleetError::FleetUnhealthy {
            attempts: max_attempts,
            healthy: last.healthy,
            total: last.total,
        })
    }
}
