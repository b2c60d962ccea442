//! Append-only deployment history on an object store
//!
//! Each record is one JSON object keyed by its kind and timestamp
//! (`deployments/<ISO 8601>.json`, `rollbacks/<ISO 8601>.json`). Records are
//! never overwritten.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cloud::{ObjectMeta, ObjectStore};
use crate::errors::FleetError;
use crate::models::{DeploymentRecord, RecordKind};

/// Default number of records scanned when looking for a rollback target
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// History of deployment and rollback outcomes for one environment
pub struct HistoryStore {
    objects: Arc<dyn ObjectStore>,
    bucket: String,
}

impl HistoryStore {
    pub fn new(objects: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            objects,
            bucket: bucket.into(),
        }
    }

    /// Write a record under its timestamp key.
    ///
    /// Appending the same record twice is deduplicated; a different record
    /// under an existing key is rejected with `DuplicateRecord`.
    pub async fn append(&self, record: &DeploymentRecord) -> Result<String, FleetError> {
        let key = record.key();
        let body = serde_json::to_vec_pretty(record)?;

        let written = self
            .objects
            .put_if_absent(&self.bucket, &key, body)
            .await
            .map_err(|e| storage_error("write", &key, e))?;

        if !written {
            let existing = self.read(&key).await?;
            if &existing != record {
                return Err(FleetError::DuplicateRecord(key));
            }
            debug!(key = %key, "Record already stored, skipping write");
            return Ok(key);
        }

        info!("Deployment record saved to {}/{}", self.bucket, key);
        Ok(key)
    }

    /// Up to `limit` deployment records, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<DeploymentRecord>, FleetError> {
        self.recent_of(RecordKind::Deploy, limit).await
    }

    /// Up to `limit` records of one kind, newest first.
    ///
    /// Objects that cannot be read or parsed are logged and skipped.
    pub async fn recent_of(
        &self,
        kind: RecordKind,
        limit: usize,
    ) -> Result<Vec<DeploymentRecord>, FleetError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut listing = self.list_all(kind.prefix()).await?;
        if listing.is_empty() {
            debug!(prefix = kind.prefix(), "No history found");
            return Ok(Vec::new());
        }

        listing.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| b.key.cmp(&a.key))
        });
        listing.truncate(limit);

        let mut records = Vec::with_capacity(listing.len());
        for object in &listing {
            match self.read(&object.key).await {
                Ok(record) => records.push(record),
                Err(e) => warn!("Failed to read {}: {}", object.key, e),
            }
        }

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    /// Newest deployment record within the last `search_limit` that matches
    pub async fn find_latest<P>(
        &self,
        search_limit: usize,
        predicate: P,
    ) -> Result<Option<DeploymentRecord>, FleetError>
    where
        P: Fn(&DeploymentRecord) -> bool,
    {
        let records = self.recent(search_limit).await?;
        Ok(records.into_iter().find(|record| predicate(record)))
    }

    /// Newest successful deployment within the last `search_limit` records
    pub async fn find_latest_successful(
        &self,
        search_limit: usize,
    ) -> Result<Option<DeploymentRecord>, FleetError> {
        let found = self
            .find_latest(search_limit, DeploymentRecord::is_success)
            .await?;

        match &found {
            Some(record) => info!(
                version = %record.version,
                image = %record.image,
                timestamp = %record.timestamp,
                "Found previous successful deployment"
            ),
            None => warn!(
                "No successful deployment in the last {} records",
                search_limit
            ),
        }
        Ok(found)
    }

    async fn list_all(&self, prefix: &str) -> Result<Vec<ObjectMeta>, FleetError> {
        let mut objects = Vec::new();
        let mut token = None;

        loop {
            let page = self
                .objects
                .list_page(&self.bucket, prefix, token)
                .await
                .map_err(|e| storage_error("list", prefix, e))?;
            objects.extend(page.objects);

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(objects)
    }

    async fn read(&self, key: &str) -> Result<DeploymentRecord, FleetError> {
        let bytes = self
            .objects
            .get(&self.bucket, key)
            .await
            .map_err(|e| storage_error("read", key, e))?;
        let record = serde_json::from_slice(&bytes)?;
        Ok(record)
    }
}

fn storage_error(action: &str, key: &str, err: FleetError) -> FleetError {
    match err {
        FleetError::StorageError(_) => err,
        other => FleetError::StorageError(format!("Failed to {} {}: {}", action, key, other)),
    }
}
