//! Object storage access
//!
//! The sync and event jobs both talk to S3-compatible OSS buckets. The
//! `ObjectStore` trait is the seam: production code uses `OssStore` over the
//! AWS SDK with a custom endpoint, tests substitute an in-memory map.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tracing::debug;

use crate::config::StorageCredentials;
use crate::error::{BridgeError, Result};

/// Minimal bucket operations needed by both jobs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's bytes; `None` when the key does not exist
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put_object(&self, key: &str, data: &[u8]) -> Result<()>;

    async fn delete_object(&self, key: &str) -> Result<()>;
}

/// S3-compatible client bound to one bucket on one endpoint
pub struct OssStore {
    client: S3Client,
    bucket: String,
}

impl OssStore {
    /// Connect to an explicit endpoint (the pull job's configured bucket)
    pub fn connect(endpoint: &str, bucket: &str, credentials: &StorageCredentials) -> Self {
        let provider = Credentials::new(
            credentials.access_key_id.clone(),
            credentials.access_key_secret.clone(),
            credentials.security_token.clone(),
            None,
            "wikibridge",
        );

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .endpoint_url(endpoint)
            .credentials_provider(provider)
            .force_path_style(false)
            .build();

        Self {
            client: S3Client::from_conf(config),
            bucket: bucket.to_string(),
        }
    }

    /// Connect to the regional endpoint named by a storage-change event
    pub fn for_region(region: &str, bucket: &str, credentials: &StorageCredentials) -> Self {
        let endpoint = format!("https://oss-{}.aliyuncs.com", region);
        Self::connect(&endpoint, bucket, credentials)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for OssStore {
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => {
                let data = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| BridgeError::Storage(e.to_string()))?
                    .into_bytes()
                    .to_vec();
                debug!("fetched {} bytes from {}/{}", data.len(), self.bucket, key);
                Ok(Some(data))
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(BridgeError::Storage(service_error.to_string()))
                }
            }
        }
    }

    async fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| BridgeError::Storage(e.into_service_error().to_string()))?;
        debug!("uploaded {} bytes to {}/{}", data.len(), self.bucket, key);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| BridgeError::Storage(e.into_service_error().to_string()))?;
        debug!("deleted {}/{}", self.bucket, key);
        Ok(())
    }
}
