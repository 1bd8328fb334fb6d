//! S3-backed artifact store.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectCannedAcl, ObjectIdentifier};
use tracing::{debug, info};

use super::{Artifact, ArtifactStore};
use crate::error::{Result, UploadError};

/// Deployment bucket access through the S3 API.
#[derive(Debug, Clone)]
pub struct S3ArtifactStore {
    client: Client,
}

impl S3ArtifactStore {
    /// Creates a store from a loaded SDK config.
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Deletes one page worth of keys.
    async fn delete_batch(&self, bucket: &str, keys: &[&str]) -> Result<usize> {
        let objects = keys
            .iter()
            .map(|key| {
                ObjectIdentifier::builder()
                    .key(*key)
                    .build()
                    .map_err(|e| UploadError::request(bucket, *key, e.to_string()))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| UploadError::request(bucket, "*", e.to_string()))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| UploadError::request(bucket, "*", DisplayErrorContext(&e).to_string()))?;

        if let Some(failed) = output.errors().first() {
            return Err(UploadError::request(
                bucket,
                failed.key().unwrap_or_default(),
                failed.message().unwrap_or("delete failed"),
            )
            .into());
        }
        Ok(keys.len())
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn upload(&self, bucket: &str, artifact: &Artifact) -> Result<String> {
        if !artifact.source.exists() {
            return Err(UploadError::SourceMissing {
                path: artifact.source.clone(),
            }
            .into());
        }

        info!(
            "Uploading {} to s3://{bucket}/{}",
            artifact.source.display(),
            artifact.key
        );

        let body = ByteStream::from_path(&artifact.source)
            .await
            .map_err(|e| UploadError::request(bucket, &artifact.key, e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(&artifact.key)
            .acl(ObjectCannedAcl::BucketOwnerFullControl)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                UploadError::request(bucket, &artifact.key, DisplayErrorContext(&e).to_string())
            })?;

        Ok(artifact.key.clone())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        debug!("Deleting s3://{bucket}/{key}");

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| UploadError::request(bucket, key, DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }

    async fn empty_bucket(&self, bucket: &str) -> Result<usize> {
        let mut removed = 0;
        let mut continuation: Option<String> = None;

        loop {
            let page = match self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation.take())
                .send()
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    let service = err.into_service_error();
                    if service.is_no_such_bucket() {
                        debug!("Bucket {bucket} does not exist");
                        return Ok(removed);
                    }
                    return Err(UploadError::request(
                        bucket,
                        "*",
                        DisplayErrorContext(&service).to_string(),
                    )
                    .into());
                }
            };

            let keys: Vec<&str> = page.contents().iter().filter_map(|o| o.key()).collect();
            if !keys.is_empty() {
                removed += self.delete_batch(bucket, &keys).await?;
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        info!("Removed {removed} objects from {bucket}");
        Ok(removed)
    }
}
