//! Finite State Machine for one orchestration run

use serde::{Deserialize, Serialize};

use crate::errors::FleetError;
use crate::models::DeploymentStatus;

/// Orchestration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestrationState {
    /// Nothing done yet
    Pending,

    /// Choosing the rollback target
    Resolving,

    /// Publishing or locating the launch spec and pointing the fleet at it
    Preparing,

    /// Rolling refresh running
    Refreshing,

    /// Waiting for the target group to become healthy
    Verifying,

    /// Refresh and verification succeeded
    Succeeded,

    /// The run ended with an expected failure
    Failed,

    /// The run hit an unexpected fault
    Errored,
}

impl OrchestrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestrationState::Succeeded | OrchestrationState::Failed | OrchestrationState::Errored
        )
    }
}

/// Orchestration event
#[derive(Debug, Clone)]
pub enum OrchestrationEvent {
    /// Start resolving a rollback target
    Resolve,

    /// Start preparing the launch spec
    Prepare,

    /// Rolling refresh started
    RefreshStarted,

    /// Refresh reached `Successful`
    RefreshSucceeded,

    /// Refresh reached `Failed` or `Cancelled`
    RefreshFailed(String),

    /// Every target healthy
    Verified,

    /// Expected failure at any step
    Fail(String),

    /// Unexpected fault at any step
    Fault(String),
}

/// Orchestration FSM
#[derive(Debug, Clone)]
pub struct OrchestrationFsm {
    state: OrchestrationState,
    reason: Option<String>,
}

impl OrchestrationFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self {
            state: OrchestrationState::Pending,
            reason: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> OrchestrationState {
        self.state
    }

    /// Why the run failed or errored, if it did
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: OrchestrationEvent) -> Result<(), FleetError> {
        use OrchestrationEvent as E;
        use OrchestrationState as S;

        let new_state = match (self.state, &event) {
            // Terminal states accept nothing
            (state, event) if state.is_terminal() => {
                return Err(FleetError::InvalidTransition(format!(
                    "{:?} -> {:?}",
                    state, event
                )));
            }

            (_, E::Fail(reason)) => {
                self.reason = Some(reason.clone());
                S::Failed
            }
            (_, E::Fault(reason)) => {
                self.reason = Some(reason.clone());
                S::Errored
            }

            (S::Pending, E::Resolve) => S::Resolving,
            (S::Pending, E::Prepare) => S::Preparing,
            (S::Resolving, E::Prepare) => S::Preparing,

            (S::Preparing, E::RefreshStarted) => S::Refreshing,

            (S::Refreshing, E::RefreshSucceeded) => S::Verifying,
            (S::Refreshing, E::RefreshFailed(status)) => {
                self.reason = Some(format!("Instance refresh {}", status));
                S::Failed
            }

            (S::Verifying, E::Verified) => S::Succeeded,

            // Invalid transitions
            (state, event) => {
                return Err(FleetError::InvalidTransition(format!(
                    "{:?} -> {:?}",
                    state, event
                )));
            }
        };

        self.state = new_state;
        Ok(())
    }

    /// Record status for the current state; a run that never reached a
    /// terminal state is an error
    pub fn status(&self) -> DeploymentStatus {
        match self.state {
            OrchestrationState::Succeeded => DeploymentStatus::Success,
            OrchestrationState::Failed => DeploymentStatus::Failed,
            _ => DeploymentStatus::Error,
        }
    }
}

impl Default for OrchestrationFsm {
    fn default() -> Self {
        Self::new()
    }
}
