//! Rollback target selection

use tracing::{info, warn};

use crate::deploy::refresh::RefreshDriver;
use crate::deploy::userdata::references_image;
use crate::errors::FleetError;
use crate::history::HistoryStore;
use crate::models::{Environment, FleetSpec};

/// Version left in the record when an explicit image has no known version
pub const UNKNOWN_VERSION: &str = "unknown";

/// Where a rollback goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackTarget {
    /// Application version recorded for the rollback
    pub version: String,
    pub image: String,
    /// Launch spec the fleet will be pointed at
    pub spec: FleetSpec,
    /// Whether `spec` already existed
    pub reused: bool,
}

/// Chooses the state a rollback returns to
pub struct RollbackSelector<'a> {
    history: &'a HistoryStore,
    driver: &'a RefreshDriver,
    search_limit: usize,
}

impl<'a> RollbackSelector<'a> {
    pub fn new(history: &'a HistoryStore, driver: &'a RefreshDriver, search_limit: usize) -> Self {
        Self {
            history,
            driver,
            search_limit,
        }
    }

    /// Resolve the (version, image) to roll back to.
    ///
    /// - explicit image: used as is; the version is the explicit one, or the
    ///   one recorded with that image, or `unknown`
    /// - explicit version only: the image of the newest successful
    ///   deployment of that version
    /// - nothing: the newest successful deployment
    ///
    /// Fails with `NoRollbackTarget` when history has no match.
    pub async fn resolve_version(
        &self,
        explicit_version: Option<&str>,
        explicit_image: Option<&str>,
    ) -> Result<(String, String), FleetError> {
        match (explicit_version, explicit_image) {
            (version, Some(image)) => {
                let version = match version {
                    Some(version) => version.to_string(),
                    None => self
                        .history
                        .find_latest(self.search_limit, |r| r.is_success() && r.image == image)
                        .await?
                        .map(|record| record.version)
                        .unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
                };
                info!("Rolling back to explicit image {} ({})", image, version);
                Ok((version, image.to_string()))
            }
            (Some(version), None) => {
                let record = self
                    .history
                    .find_latest(self.search_limit, |r| r.is_success() && r.version == version)
                    .await?
                    .ok_or_else(|| {
                        FleetError::NoRollbackTarget(format!(
                            "no successful deployment of version {} in the last {} records",
                            version, self.search_limit
                        ))
                    })?;
                info!(
                    "Rolling back to version {} (image {})",
                    record.version, record.image
                );
                Ok((record.version, record.image))
            }
            (None, None) => {
                let record = self
                    .history
                    .find_latest_successful(self.search_limit)
                    .await?
                    .ok_or_else(|| {
                        FleetError::NoRollbackTarget(format!(
                            "no successful deployment in the last {} records",
                            self.search_limit
                        ))
                    })?;
                Ok((record.version, record.image))
            }
        }
    }

    /// Resolve the rollback target and the launch spec that runs it.
    ///
    /// [`RollbackSelector::resolve_version`] followed by
    /// [`RollbackSelector::launch_spec_for`]. The orchestrator calls the two
    /// halves itself so a failed spec lookup is still recorded against the
    /// resolved version and image.
    pub async fn resolve_target(
        &self,
        launch_template_id: &str,
        environment: Environment,
        explicit_version: Option<&str>,
        explicit_image: Option<&str>,
    ) -> Result<RollbackTarget, FleetError> {
        let (version, image) = self
            .resolve_version(explicit_version, explicit_image)
            .await?;
        let (spec, reused) = self
            .launch_spec_for(launch_template_id, environment, &image)
            .await?;

        Ok(RollbackTarget {
            version,
            image,
            spec,
            reused,
        })
    }

    /// Launch spec running `image`, and whether it already existed.
    ///
    /// The newest existing version running the image is reused; otherwise a
    /// new version is published.
    pub async fn launch_spec_for(
        &self,
        launch_template_id: &str,
        environment: Environment,
        image: &str,
    ) -> Result<(FleetSpec, bool), FleetError> {
        let mut specs = self.driver.list_fleet_specs(launch_template_id).await?;
        specs.sort_by(|a, b| b.version.cmp(&a.version));

        if let Some(spec) = find_matching_version(&specs, image) {
            info!("Found existing launch template version: {}", spec.version);
            return Ok((spec.clone(), true));
        }

        warn!(
            "No launch template version runs {}, creating a new one",
            image
        );
        let spec = self
            .driver
            .publish_fleet_spec(launch_template_id, image, environment)
            .await?;
        Ok((spec, false))
    }
}

/// First launch spec in `versions` whose boot script runs `image`
pub fn find_matching_version<'s>(versions: &'s [FleetSpec], image: &str) -> Option<&'s FleetSpec> {
    versions.iter().find(|spec| references_image(spec, image))
}
