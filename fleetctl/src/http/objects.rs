//! Object storage API client

use async_trait::async_trait;
use control_api::models::ObjectListResponse;
use reqwest::{header, Method};

use crate::cloud::{ObjectMeta, ObjectPage, ObjectStore};
use crate::errors::FleetError;
use crate::http::client::HttpClient;

#[async_trait]
impl ObjectStore for HttpClient {
    async fn put_if_absent(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<bool, FleetError> {
        let url = self.url(&["buckets", bucket, "objects", key]);
        let request = self
            .request(Method::PUT, url)
            .header(header::IF_NONE_MATCH, "*")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);

        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(e) if e.api_status() == Some(412) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage, FleetError> {
        let mut url = self.url(&["buckets", bucket, "objects"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("prefix", prefix);
            if let Some(token) = &continuation_token {
                query.append_pair("continuation_token", token);
            }
        }

        let listing: ObjectListResponse = self.get(url).await?;
        Ok(ObjectPage {
            objects: listing
                .contents
                .into_iter()
                .map(|o| ObjectMeta {
                    key: o.key,
                    last_modified: o.last_modified,
                })
                .collect(),
            next_token: listing.next_continuation_token,
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FleetError> {
        let url = self.url(&["buckets", bucket, "objects", key]);
        let response = self.send(self.request(Method::GET, url)).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
