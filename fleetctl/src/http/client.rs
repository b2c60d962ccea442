//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use url::Url;

use control_api::models::ErrorResponse;

use crate::errors::FleetError;

/// Header carrying the region every control plane request targets
pub const REGION_HEADER: &str = "X-Fleet-Region";

/// HTTP client for the fleet control plane
pub struct HttpClient {
    client: Client,
    base_url: Url,
    region: String,
    api_token: Option<SecretString>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, region: &str, timeout: Duration) -> Result<Self, FleetError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(base_url).map_err(|e| {
            FleetError::ConfigError(format!("Invalid control plane URL {}: {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(FleetError::ConfigError(format!(
                "Control plane URL cannot be a base: {}",
                base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            region: region.to_string(),
            api_token: None,
        })
    }

    /// Authenticate every request with a bearer token
    pub fn with_api_token(mut self, token: SecretString) -> Self {
        self.api_token = Some(token);
        self
    }

    /// Build a URL below the base URL; each segment is percent-encoded,
    /// so object keys containing `/` stay a single segment
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Start a request with the region and auth headers set
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .header(REGION_HEADER, &self.region);
        if let Some(token) = &self.api_token {
            request = request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            );
        }
        request
    }

    /// Send a request, turning non-success statuses into `ApiError`
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, FleetError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body = error_message(&text);
        if status == StatusCode::NOT_FOUND || status == StatusCode::PRECONDITION_FAILED {
            debug!("Control plane returned {} - {}", status, body);
        } else {
            warn!("Control plane request failed: {} - {}", status, body);
        }
        Err(FleetError::ApiError {
            status: status.as_u16(),
            body,
        })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, FleetError> {
        let response = self.send(self.request(Method::GET, url)).await?;
        let body = response.json().await?;
        Ok(body)
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, FleetError> {
        let response = self
            .send(self.request(Method::POST, url).json(body))
            .await?;
        let body = response.json().await?;
        Ok(body)
    }

    /// Make a PUT request, ignoring the response body
    pub async fn put<B: Serialize>(&self, url: Url, body: &B) -> Result<(), FleetError> {
        self.send(self.request(Method::PUT, url).json(body)).await?;
        Ok(())
    }
}

/// Prefer the control plane's structured error message over the raw body
fn error_message(text: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(text) {
        Ok(err) => format!("{}: {}", err.error, err.message),
        Err(_) => text.to_string(),
    }
}

/// Replace a 404 `ApiError` with a domain-specific error
pub(crate) fn not_found_as(err: FleetError, replacement: impl FnOnce() -> FleetError) -> FleetError {
    match err.api_status() {
        Some(404) => replacement(),
        _ => err,
    }
}
