//! Load balancer target health API client

use async_trait::async_trait;
use control_api::models::TargetHealthResponse;

use crate::cloud::TargetHealthService;
use crate::errors::FleetError;
use crate::http::client::{not_found_as, HttpClient};
use crate::models::{TargetHealth, TargetState};

#[async_trait]
impl TargetHealthService for HttpClient {
    async fn describe_target_health(
        &self,
        target_group: &str,
    ) -> Result<Vec<TargetHealth>, FleetError> {
        let url = self.url(&["target-groups", target_group, "health"]);
        let response: TargetHealthResponse = self.get(url).await.map_err(|e| {
            not_found_as(e, || {
                FleetError::TargetGroupNotFound(target_group.to_string())
            })
        })?;

        Ok(response
            .target_health_descriptions
            .into_iter()
            .map(|t| TargetHealth {
                target_id: t.target_id,
                state: TargetState::parse(&t.state),
            })
            .collect())
    }
}
