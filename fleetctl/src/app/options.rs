//! Command options

use std::time::Duration;

use crate::models::Environment;

/// Control plane region used when none is given
pub const DEFAULT_REGION: &str = "us-east-1";

/// Options of a `deploy` run
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub environment: Environment,

    /// Application version label recorded in history
    pub version: String,

    /// Container image reference to roll out
    pub image: String,

    pub region: String,
}

/// Options of a `rollback` run
#[derive(Debug, Clone)]
pub struct RollbackOptions {
    pub environment: Environment,

    /// Version to return to; latest successful deployment when absent
    pub previous_version: Option<String>,

    /// Image to return to
    pub image: Option<String>,

    pub region: String,
}

/// Options of a `health-check` run
#[derive(Debug, Clone)]
pub struct HealthCheckOptions {
    /// Health endpoint URL
    pub url: String,

    /// Give up waiting for the endpoint after this long
    pub timeout: Duration,

    /// Interval between checks
    pub interval: Duration,

    /// Monitor for this long instead of waiting for healthy; zero means
    /// wait for healthy
    pub continuous: Option<Duration>,

    /// Also check the metrics endpoint once healthy
    pub check_metrics: bool,
}

impl Default for HealthCheckOptions {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000/health".to_string(),
            timeout: Duration::from_secs(300),
            interval: Duration::from_secs(10),
            continuous: None,
            check_metrics: false,
        }
    }
}

impl HealthCheckOptions {
    /// Continuous monitoring duration, if monitoring was asked for
    pub fn monitor_duration(&self) -> Option<Duration> {
        self.continuous.filter(|duration| !duration.is_zero())
    }
}
