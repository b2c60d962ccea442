//! Health endpoint models

use serde::{Deserialize, Serialize};

/// Body reported by a fleet member's health endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthPayload {
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub timestamp: Option<String>,

    /// Seconds since the service started
    #[serde(default)]
    pub uptime: Option<f64>,

    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub version: Option<String>,
}

/// Raw response of one GET against a health or metrics endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status_code: u16,
    pub body: String,
}

/// Result of one health poll
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSnapshot {
    /// None when the request never got a response
    pub status_code: Option<u16>,
    pub healthy: bool,
    pub payload: Option<HealthPayload>,
}

impl HealthSnapshot {
    /// Classify a response: healthy only on a 2xx status with a body that
    /// parses as a health payload
    pub fn from_response(response: &ProbeResponse) -> Self {
        let success = (200..300).contains(&response.status_code);
        let payload = if success {
            serde_json::from_str::<HealthPayload>(&response.body).ok()
        } else {
            None
        };

        Self {
            status_code: Some(response.status_code),
            healthy: payload.is_some(),
            payload,
        }
    }

    /// Snapshot for a request that failed at the transport level
    pub fn unreachable() -> Self {
        Self {
            status_code: None,
            healthy: false,
            payload: None,
        }
    }
}

/// Summary of a continuous monitoring run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorReport {
    pub total_checks: u32,
    pub failed_checks: u32,
}

impl MonitorReport {
    /// Minimum success rate, in percent, for a monitoring run to pass
    pub const PASS_THRESHOLD: f64 = 95.0;

    /// Percentage of passed checks; 0 when no check ran
    pub fn success_rate(&self) -> f64 {
        if self.total_checks == 0 {
            return 0.0;
        }
        f64::from(self.total_checks - self.failed_checks) * 100.0 / f64::from(self.total_checks)
    }

    pub fn passed(&self) -> bool {
        self.total_checks > 0 && self.success_rate() >= Self::PASS_THRESHOLD
    }
}
