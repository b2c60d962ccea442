//! Deployment orchestration

pub mod fsm;
pub mod orchestrator;
pub mod refresh;
pub mod selector;
pub mod userdata;

pub use orchestrator::{
    DeployRequest, OrchestrationReport, Orchestrator, OrchestratorOptions, RollbackRequest,
};
pub use refresh::{RefreshDriver, RefreshOptions, RefreshOutcome};
pub use selector::{find_matching_version, RollbackSelector, RollbackTarget};
