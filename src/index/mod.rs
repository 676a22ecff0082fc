//! Document index access
//!
//! The knowledge base ingests documents asynchronously: an upload submits a
//! chunking/embedding job and returns a job id, a delete removes every chunk
//! filed under a file name. `DocumentIndex` is the seam the event router
//! depends on; `KnowledgeBase` is the HTTP implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use tracing::{error, info};

use crate::config::IndexerConfig;
use crate::error::{BridgeError, Result};

/// Chunking parameters for ingestion jobs
pub const CHUNK_SIZE: u32 = 500;
pub const CHUNK_OVERLAP: u32 = 50;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const DELETE_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Index operations keyed by file name
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Submit an async ingestion job; returns the job id
    async fn upload_document(
        &self,
        file_name: &str,
        content: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<String>;

    /// Remove the index entry for a file name; `false` when the service
    /// reports a non-success status
    async fn delete_document(&self, file_name: &str) -> Result<bool>;
}

#[derive(Deserialize)]
struct JobResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    job_id: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: String,
}

/// HTTP client for the managed knowledge base service
pub struct KnowledgeBase {
    client: reqwest::Client,
    config: IndexerConfig,
}

impl KnowledgeBase {
    pub fn new(config: IndexerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }

    fn request_body(&self, file_name: &str) -> serde_json::Map<String, serde_json::Value> {
        let mut body = serde_json::Map::new();
        body.insert("instance_id".into(), self.config.instance_id.clone().into());
        body.insert("region_id".into(), self.config.region_id.clone().into());
        body.insert("collection".into(), self.config.collection.clone().into());
        body.insert("namespace".into(), self.config.namespace.clone().into());
        body.insert(
            "namespace_password".into(),
            self.config.namespace_password.clone().into(),
        );
        body.insert("file_name".into(), file_name.into());
        body
    }
}

#[async_trait]
impl DocumentIndex for KnowledgeBase {
    async fn upload_document(
        &self,
        file_name: &str,
        content: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<String> {
        let url = format!("{}/v1/documents:uploadAsync", self.config.endpoint);

        let mut body = self.request_body(file_name);
        body.insert("content".into(), BASE64.encode(content).into());
        body.insert("chunk_size".into(), CHUNK_SIZE.into());
        body.insert("chunk_overlap".into(), CHUNK_OVERLAP.into());
        body.insert(
            "metadata".into(),
            serde_json::to_value(metadata)?,
        );

        info!(
            "submitting ingestion job: {} ({} bytes)",
            file_name,
            content.len()
        );

        let response = self
            .client
            .post(&url)
            .timeout(UPLOAD_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BridgeError::Index(format!(
                "upload failed with HTTP {}: {}",
                status, text
            )));
        }

        let job: JobResponse = response.json().await?;
        if job.status != "success" {
            return Err(BridgeError::Index(format!(
                "upload job rejected: {}",
                job.message
            )));
        }

        info!("ingestion job submitted: {} -> {}", file_name, job.job_id);
        Ok(job.job_id)
    }

    async fn delete_document(&self, file_name: &str) -> Result<bool> {
        let url = format!("{}/v1/documents:delete", self.config.endpoint);
        let body = self.request_body(file_name);

        let response = self
            .client
            .post(&url)
            .timeout(DELETE_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BridgeError::Index(format!(
                "delete failed with HTTP {}: {}",
                status, text
            )));
        }

        let result: StatusResponse = response.json().await?;
        if result.status == "success" {
            info!("index entry deleted: {}", file_name);
            Ok(true)
        } else {
            error!(
                "index delete reported status '{}' for {}",
                result.status, file_name
            );
            Ok(false)
        }
    }
}
