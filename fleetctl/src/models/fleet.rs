//! Fleet, launch spec and refresh models

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::FleetError;

/// Current state of a fleet as reported by the scaling service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetDescription {
    pub name: String,
    pub launch_template_id: String,
    /// Launch template version the fleet currently uses, if pinned
    pub launch_template_version: Option<u64>,
}

/// Immutable, versioned definition of what new fleet members run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSpec {
    pub launch_template_id: String,
    pub version: u64,
    /// Base64-encoded boot script
    pub user_data: String,
}

/// Preferences of a rolling refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPreferences {
    /// Share of the fleet that must stay in service during the refresh
    pub min_healthy_percent: u8,
    /// Time a new member gets before it counts as serving
    pub warmup: Duration,
}

impl Default for RefreshPreferences {
    fn default() -> Self {
        Self {
            min_healthy_percent: 50,
            warmup: Duration::from_secs(300),
        }
    }
}

/// Status of an instance refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshStatus {
    Pending,
    InProgress,
    Successful,
    Failed,
    Cancelled,
}

impl RefreshStatus {
    /// Map a status reported by the scaling service.
    ///
    /// Intermediate service states (`Cancelling`, `Baking`, `RollbackInProgress`)
    /// count as in progress; service-side rollbacks count as failed.
    pub fn parse(raw: &str) -> Result<Self, FleetError> {
        match raw {
            "Pending" => Ok(RefreshStatus::Pending),
            "InProgress" | "Cancelling" | "Baking" | "RollbackInProgress" => {
                Ok(RefreshStatus::InProgress)
            }
            "Successful" => Ok(RefreshStatus::Successful),
            "Failed" | "RollbackFailed" | "RollbackSuccessful" => Ok(RefreshStatus::Failed),
            "Cancelled" => Ok(RefreshStatus::Cancelled),
            other => Err(FleetError::ValidationError(format!(
                "Unknown refresh status: {}",
                other
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefreshStatus::Successful | RefreshStatus::Failed | RefreshStatus::Cancelled
        )
    }

    fn stage(&self) -> u8 {
        match self {
            RefreshStatus::Pending => 0,
            RefreshStatus::InProgress => 1,
            _ => 2,
        }
    }
}

impl std::fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RefreshStatus::Pending => "Pending",
            RefreshStatus::InProgress => "InProgress",
            RefreshStatus::Successful => "Successful",
            RefreshStatus::Failed => "Failed",
            RefreshStatus::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

/// One observation of a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshProgress {
    pub status: RefreshStatus,
    pub percent_complete: u8,
}

/// A running refresh, tracked for the duration of one orchestration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshHandle {
    pub fleet_name: String,
    pub refresh_id: String,
    pub status: RefreshStatus,
    pub percent_complete: u8,
}

impl RefreshHandle {
    /// Create a handle for a refresh that was just started
    pub fn new(fleet_name: impl Into<String>, refresh_id: impl Into<String>) -> Self {
        Self {
            fleet_name: fleet_name.into(),
            refresh_id: refresh_id.into(),
            status: RefreshStatus::Pending,
            percent_complete: 0,
        }
    }

    /// Apply an observation.
    ///
    /// Status only moves forward (Pending, InProgress, terminal); once
    /// terminal it never changes. Progress never decreases.
    pub fn advance(&mut self, progress: RefreshProgress) -> Result<(), FleetError> {
        if self.status.is_terminal() && progress.status != self.status {
            return Err(FleetError::InvalidTransition(format!(
                "refresh {} already {}, reported {}",
                self.refresh_id, self.status, progress.status
            )));
        }
        if progress.status.stage() < self.status.stage() {
            return Err(FleetError::InvalidTransition(format!(
                "refresh {} moved back from {} to {}",
                self.refresh_id, self.status, progress.status
            )));
        }

        self.status = progress.status;
        self.percent_complete = self.percent_complete.max(progress.percent_complete.min(100));
        Ok(())
    }
}

/// Load balancer view of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    Initial,
    Healthy,
    Unhealthy,
    Unused,
    Draining,
    Unavailable,
    #[serde(other)]
    Unknown,
}

impl TargetState {
    pub fn parse(raw: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(raw.to_lowercase()))
            .unwrap_or(TargetState::Unknown)
    }
}

/// Health of a registered target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetHealth {
    pub target_id: String,
    pub state: TargetState,
}

/// Aggregate health of a target group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FleetHealth {
    pub healthy: usize,
    pub total: usize,
}

impl FleetHealth {
    pub fn from_targets(targets: &[TargetHealth]) -> Self {
        Self {
            healthy: targets
                .iter()
                .filter(|t| t.state == TargetState::Healthy)
                .count(),
            total: targets.len(),
        }
    }

    /// Every target healthy, and at least one target registered
    pub fn is_fully_healthy(&self) -> bool {
        self.total > 0 && self.healthy == self.total
    }
}
