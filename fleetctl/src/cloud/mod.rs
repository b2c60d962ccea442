//! External collaborators
//!
//! The scaling service, the load balancer, the object store and the health
//! endpoints on fleet members are consumed through these traits. HTTP
//! implementations live in [`crate::http`], a local-directory object store in
//! [`crate::filesys::objects`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::FleetError;
use crate::models::{
    FleetDescription, FleetSpec, ProbeResponse, RefreshPreferences, RefreshProgress, TargetHealth,
};

/// Fleet-scaling service
#[async_trait]
pub trait FleetService: Send + Sync {
    /// Describe a fleet by name. Fails with `FleetNotFound`.
    async fn describe_fleet(&self, fleet_name: &str) -> Result<FleetDescription, FleetError>;

    /// Create a new immutable launch template version from a boot script.
    /// Fails with `TemplateNotFound`.
    async fn create_launch_spec_version(
        &self,
        launch_template_id: &str,
        user_data: &str,
    ) -> Result<FleetSpec, FleetError>;

    /// List existing versions of a launch template. Fails with `TemplateNotFound`.
    async fn list_launch_spec_versions(
        &self,
        launch_template_id: &str,
    ) -> Result<Vec<FleetSpec>, FleetError>;

    /// Point a fleet at a launch template version for new members
    async fn set_fleet_launch_spec(
        &self,
        fleet_name: &str,
        launch_template_id: &str,
        version: u64,
    ) -> Result<(), FleetError>;

    /// Start a rolling instance refresh, returning its id
    async fn start_instance_refresh(
        &self,
        fleet_name: &str,
        preferences: &RefreshPreferences,
    ) -> Result<String, FleetError>;

    /// Describe a refresh; `None` when the service no longer knows the id
    async fn describe_instance_refresh(
        &self,
        fleet_name: &str,
        refresh_id: &str,
    ) -> Result<Option<RefreshProgress>, FleetError>;
}

/// Load-balancer health service
#[async_trait]
pub trait TargetHealthService: Send + Sync {
    /// Health of every target registered in a target group.
    /// Fails with `TargetGroupNotFound`.
    async fn describe_target_health(
        &self,
        target_group: &str,
    ) -> Result<Vec<TargetHealth>, FleetError>;
}

/// Metadata of a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// One page of an object listing
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectMeta>,
    /// Token for the next page, if any
    pub next_token: Option<String>,
}

/// Durable object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object unless the key already exists.
    ///
    /// Returns `false`, without writing, when the key is taken.
    async fn put_if_absent(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<bool, FleetError>;

    /// List one page of objects under a prefix
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage, FleetError>;

    /// Read an object's bytes
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FleetError>;
}

/// HTTP GET against a fleet member's health (or metrics) endpoint
#[async_trait]
pub trait HealthEndpoint: Send + Sync {
    /// Errors are transport failures; any HTTP status is a response
    async fn get(&self, url: &str) -> Result<ProbeResponse, FleetError>;
}
