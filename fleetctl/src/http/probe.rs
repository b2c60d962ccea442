//! Health endpoint probe

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::cloud::HealthEndpoint;
use crate::errors::FleetError;
use crate::models::ProbeResponse;

/// Per-request timeout of a health probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Plain HTTP GET probe against fleet member endpoints
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self, FleetError> {
        Self::with_timeout(PROBE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FleetError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HealthEndpoint for HttpProbe {
    async fn get(&self, url: &str) -> Result<ProbeResponse, FleetError> {
        let response = self.client.get(url).send().await?;
        let status_code = response.status().as_u16();
        let body = response.text().await?;
        Ok(ProbeResponse { status_code, body })
    }
}
