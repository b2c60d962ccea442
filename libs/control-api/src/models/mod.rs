//! API models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fleet (scaling group) description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetResponse {
    pub fleet_name: String,
    pub launch_template: LaunchTemplateRef,
    #[serde(default)]
    pub desired_capacity: Option<u32>,
}

/// Reference to a launch template version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchTemplateRef {
    pub launch_template_id: String,
    /// Version number as a string; may also be `$Latest` or `$Default`
    pub version: String,
}

/// Update the launch template a fleet uses for new members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFleetRequest {
    pub launch_template: LaunchTemplateRef,
}

/// Create a new launch template version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLaunchTemplateVersionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_version: Option<String>,
    pub launch_template_data: LaunchTemplateData,
}

/// Launch template payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaunchTemplateData {
    /// Base64-encoded boot script
    #[serde(default)]
    pub user_data: String,
}

/// A single launch template version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchTemplateVersion {
    pub launch_template_id: String,
    pub version_number: u64,
    #[serde(default)]
    pub launch_template_data: LaunchTemplateData,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
}

/// Launch template version listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchTemplateVersionList {
    pub launch_template_versions: Vec<LaunchTemplateVersion>,
}

/// Start a rolling instance refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartInstanceRefreshRequest {
    pub strategy: String,
    pub preferences: RefreshPreferences,
}

/// Rolling refresh preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshPreferences {
    pub min_healthy_percentage: u8,
    /// Seconds
    pub instance_warmup: u64,
}

/// Response to a refresh start request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartInstanceRefreshResponse {
    pub instance_refresh_id: String,
}

/// Instance refresh progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRefresh {
    pub instance_refresh_id: String,
    pub status: String,
    #[serde(default)]
    pub percentage_complete: Option<u8>,
    #[serde(default)]
    pub status_reason: Option<String>,
}

/// Target group health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetHealthResponse {
    pub target_health_descriptions: Vec<TargetHealthDescription>,
}

/// Health of a single registered target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetHealthDescription {
    pub target_id: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub state: String,
}

/// Object listing page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectListResponse {
    #[serde(default)]
    pub contents: Vec<ObjectSummary>,
    #[serde(default)]
    pub next_continuation_token: Option<String>,
}

/// A stored object's metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub size: u64,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}
