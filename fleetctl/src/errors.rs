//! Error types for fleetctl

use std::time::Duration;

use thiserror::Error;

/// Main error type for fleet orchestration
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Control plane returned {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Fleet not found: {0}")]
    FleetNotFound(String),

    #[error("Launch template not found: {0}")]
    TemplateNotFound(String),

    #[error("Instance refresh not found: {0}")]
    RefreshNotFound(String),

    #[error("Target group not found: {0}")]
    TargetGroupNotFound(String),

    #[error("Endpoint not healthy after {elapsed:.1?} ({attempts} attempts)")]
    HealthTimeout { elapsed: Duration, attempts: u32 },

    #[error("Fleet not healthy after {attempts} attempts ({healthy}/{total} targets healthy)")]
    FleetUnhealthy {
        attempts: u32,
        healthy: usize,
        total: usize,
    },

    #[error("Instance refresh did not finish within {0:?}")]
    RefreshTimeout(Duration),

    #[error("Gave up on instance refresh {refresh_id} after {attempts} failed polls: {last_error}")]
    RefreshPollBudgetExhausted {
        refresh_id: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Cancelled during {0}")]
    Cancelled(String),

    #[error("No rollback target: {0}")]
    NoRollbackTarget(String),

    #[error("A different record already exists at {0}")]
    DuplicateRecord(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl FleetError {
    /// Whether a fleet, template, refresh or target group is missing
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FleetError::FleetNotFound(_)
                | FleetError::TemplateNotFound(_)
                | FleetError::RefreshNotFound(_)
                | FleetError::TargetGroupNotFound(_)
        )
    }

    /// Whether this error is an expected failure outcome of a well-formed
    /// run rather than an unexpected fault.
    ///
    /// Failures are recorded with status `failed`; everything else is
    /// recorded with status `error`.
    pub fn is_failure(&self) -> bool {
        self.is_not_found()
            || matches!(
                self,
                FleetError::HealthTimeout { .. }
                    | FleetError::FleetUnhealthy { .. }
                    | FleetError::RefreshTimeout(_)
                    | FleetError::RefreshPollBudgetExhausted { .. }
                    | FleetError::NoRollbackTarget(_)
            )
    }

    /// HTTP status carried by a control plane error, if any
    pub fn api_status(&self) -> Option<u16> {
        match self {
            FleetError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}
