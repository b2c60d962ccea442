//! Deployment history records

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::environment::Environment;

/// Kind of orchestration run a record describes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    Deploy,
    Rollback,
}

impl RecordKind {
    /// Object key prefix records of this kind are stored under
    pub fn prefix(&self) -> &'static str {
        match self {
            RecordKind::Deploy => "deployments/",
            RecordKind::Rollback => "rollbacks/",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Deploy => "deploy",
            RecordKind::Rollback => "rollback",
        }
    }
}

/// Final status of an orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Success,
    Failed,
    Error,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable audit entry for one deploy or rollback attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    pub environment: Environment,

    /// Records written before `kind` existed are deployments
    #[serde(default)]
    pub kind: RecordKind,

    /// Application version label
    pub version: String,

    /// Container image reference
    pub image: String,

    pub status: DeploymentStatus,
}

impl DeploymentRecord {
    /// Create a record stamped with the current time, truncated to the
    /// microsecond precision of its key
    pub fn new(
        kind: RecordKind,
        environment: Environment,
        version: impl Into<String>,
        image: impl Into<String>,
        status: DeploymentStatus,
    ) -> Self {
        Self {
            timestamp: Utc::now().trunc_subsecs(6),
            environment,
            kind,
            version: version.into(),
            image: image.into(),
            status,
        }
    }

    /// Object key of this record, e.g. `deployments/2026-01-02T03:04:05.000006Z.json`
    pub fn key(&self) -> String {
        format!(
            "{}{}.json",
            self.kind.prefix(),
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
        )
    }

    pub fn is_success(&self) -> bool {
        self.status == DeploymentStatus::Success
    }
}

/// Accepts RFC 3339 timestamps and offset-less ISO 8601 ones (read as UTC)
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}
