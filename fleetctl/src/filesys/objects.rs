//! Object store on a local directory
//!
//! Objects live at `<root>/<bucket>/<key>`; keys containing `/` map to
//! nested directories.

use std::path::{Component, Path};

use async_trait::async_trait;

use crate::cloud::{ObjectMeta, ObjectPage, ObjectStore};
use crate::errors::FleetError;
use crate::filesys::dir::Dir;

/// File-backed implementation of [`ObjectStore`]
#[derive(Debug, Clone)]
pub struct FileObjectStore {
    root: Dir,
}

impl FileObjectStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub async fn new(root: impl Into<std::path::PathBuf>) -> Result<Self, FleetError> {
        let root = Dir::new(root);
        root.create().await?;
        Ok(Self { root })
    }

    fn bucket_dir(&self, bucket: &str) -> Result<Dir, FleetError> {
        validate_relative(bucket)?;
        Ok(self.root.subdir(bucket))
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn put_if_absent(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<bool, FleetError> {
        validate_relative(key)?;
        let file = self.bucket_dir(bucket)?.file(key);
        file.write_new(&body).await
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        _continuation_token: Option<String>,
    ) -> Result<ObjectPage, FleetError> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.exists().await {
            return Ok(ObjectPage::default());
        }

        let mut objects = Vec::new();
        for path in dir.list_files_recursive().await? {
            let Some(key) = object_key(dir.path(), &path) else {
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }
            let last_modified = crate::filesys::file::File::new(&path).modified().await?;
            objects.push(ObjectMeta { key, last_modified });
        }

        Ok(ObjectPage {
            objects,
            next_token: None,
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FleetError> {
        validate_relative(key)?;
        let file = self.bucket_dir(bucket)?.file(key);
        if !file.exists().await {
            return Err(FleetError::StorageError(format!(
                "No such object: {}/{}",
                bucket, key
            )));
        }
        file.read_bytes().await
    }
}

/// Reject empty, absolute and parent-escaping paths
fn validate_relative(name: &str) -> Result<(), FleetError> {
    let path = Path::new(name);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if name.is_empty() || escapes {
        return Err(FleetError::ValidationError(format!(
            "Invalid object path: {:?}",
            name
        )));
    }
    Ok(())
}

fn object_key(bucket_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(bucket_dir).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}
