//! Domain models

pub mod environment;
pub mod fleet;
pub mod health;
pub mod record;

pub use environment::Environment;
pub use fleet::{
    FleetDescription, FleetHealth, FleetSpec, RefreshHandle, RefreshPreferences, RefreshProgress,
    RefreshStatus, TargetHealth, TargetState,
};
pub use health::{HealthPayload, HealthSnapshot, MonitorReport, ProbeResponse};
pub use record::{DeploymentRecord, DeploymentStatus, RecordKind};
