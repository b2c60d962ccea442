//! Fleet-scaling API client

use async_trait::async_trait;
use control_api::models::{
    CreateLaunchTemplateVersionRequest, FleetResponse, InstanceRefresh, LaunchTemplateData,
    LaunchTemplateRef, LaunchTemplateVersion, LaunchTemplateVersionList,
    RefreshPreferences as RefreshPreferencesBody, StartInstanceRefreshRequest,
    StartInstanceRefreshResponse, UpdateFleetRequest,
};

use crate::cloud::FleetService;
use crate::errors::FleetError;
use crate::http::client::{not_found_as, HttpClient};
use crate::models::{
    FleetDescription, FleetSpec, RefreshPreferences, RefreshProgress, RefreshStatus,
};

/// Page size used when listing launch template versions
const MAX_VERSION_RESULTS: &str = "100";

#[async_trait]
impl FleetService for HttpClient {
    async fn describe_fleet(&self, fleet_name: &str) -> Result<FleetDescription, FleetError> {
        let url = self.url(&["fleets", fleet_name]);
        let fleet: FleetResponse = self
            .get(url)
            .await
            .map_err(|e| not_found_as(e, || FleetError::FleetNotFound(fleet_name.to_string())))?;

        Ok(FleetDescription {
            name: fleet.fleet_name,
            launch_template_id: fleet.launch_template.launch_template_id,
            launch_template_version: fleet.launch_template.version.parse().ok(),
        })
    }

    async fn create_launch_spec_version(
        &self,
        launch_template_id: &str,
        user_data: &str,
    ) -> Result<FleetSpec, FleetError> {
        let url = self.url(&["launch-templates", launch_template_id, "versions"]);
        let request = CreateLaunchTemplateVersionRequest {
            source_version: Some("$Latest".to_string()),
            launch_template_data: LaunchTemplateData {
                user_data: user_data.to_string(),
            },
        };

        let version: LaunchTemplateVersion = self.post(url, &request).await.map_err(|e| {
            not_found_as(e, || {
                FleetError::TemplateNotFound(launch_template_id.to_string())
            })
        })?;
        Ok(to_fleet_spec(version))
    }

    async fn list_launch_spec_versions(
        &self,
        launch_template_id: &str,
    ) -> Result<Vec<FleetSpec>, FleetError> {
        let mut url = self.url(&["launch-templates", launch_template_id, "versions"]);
        url.query_pairs_mut()
            .append_pair("max_results", MAX_VERSION_RESULTS);

        let list: LaunchTemplateVersionList = self.get(url).await.map_err(|e| {
            not_found_as(e, || {
                FleetError::TemplateNotFound(launch_template_id.to_string())
            })
        })?;
        Ok(list
            .launch_template_versions
            .into_iter()
            .map(to_fleet_spec)
            .collect())
    }

    async fn set_fleet_launch_spec(
        &self,
        fleet_name: &str,
        launch_template_id: &str,
        version: u64,
    ) -> Result<(), FleetError> {
        let url = self.url(&["fleets", fleet_name, "launch-template"]);
        let request = UpdateFleetRequest {
            launch_template: LaunchTemplateRef {
                launch_template_id: launch_template_id.to_string(),
                version: version.to_string(),
            },
        };

        self.put(url, &request)
            .await
            .map_err(|e| not_found_as(e, || FleetError::FleetNotFound(fleet_name.to_string())))
    }

    async fn start_instance_refresh(
        &self,
        fleet_name: &str,
        preferences: &RefreshPreferences,
    ) -> Result<String, FleetError> {
        let url = self.url(&["fleets", fleet_name, "instance-refreshes"]);
        let request = StartInstanceRefreshRequest {
            strategy: "Rolling".to_string(),
            preferences: RefreshPreferencesBody {
                min_healthy_percentage: preferences.min_healthy_percent,
                instance_warmup: preferences.warmup.as_secs(),
            },
        };

        let response: StartInstanceRefreshResponse = self
            .post(url, &request)
            .await
            .map_err(|e| not_found_as(e, || FleetError::FleetNotFound(fleet_name.to_string())))?;
        Ok(response.instance_refresh_id)
    }

    async fn describe_instance_refresh(
        &self,
        fleet_name: &str,
        refresh_id: &str,
    ) -> Result<Option<RefreshProgress>, FleetError> {
        let url = self.url(&["fleets", fleet_name, "instance-refreshes", refresh_id]);
        let refresh: InstanceRefresh = match self.get(url).await {
            Ok(refresh) => refresh,
            Err(e) if e.api_status() == Some(404) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(Some(RefreshProgress {
            status: RefreshStatus::parse(&refresh.status)?,
            percent_complete: refresh.percentage_complete.unwrap_or(0),
        }))
    }
}

fn to_fleet_spec(version: LaunchTemplateVersion) -> FleetSpec {
    FleetSpec {
        launch_template_id: version.launch_template_id,
        version: version.version_number,
        user_data: version.launch_template_data.user_data,
    }
}
