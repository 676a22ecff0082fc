//! Event routing
//!
//! One storage-change event in, one structured outcome out. Skips and
//! business failures are outcomes, not errors; only parse/config/transport
//! failures escape to the invocation wrapper.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::StorageCredentials;
use crate::error::{BridgeError, Result};
use crate::event::filter::{classify_object_key, FileClassification};
use crate::event::notification::{classify_event, EventKind, StorageChangeEvent};
use crate::index::DocumentIndex;
use crate::storage::{ObjectStore, OssStore};

/// Largest object the index accepts
pub const MAX_OBJECT_SIZE: u64 = 200 * 1024 * 1024;

/// Downloads an object from the bucket/region named by an event
#[async_trait]
pub trait ObjectSource: Send + Sync {
    async fn download(&self, bucket: &str, key: &str, region: &str) -> Result<Vec<u8>>;
}

/// Production source: one regional S3-compatible client per download
pub struct OssObjectSource {
    credentials: StorageCredentials,
}

impl OssObjectSource {
    pub fn new(credentials: StorageCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl ObjectSource for OssObjectSource {
    async fn download(&self, bucket: &str, key: &str, region: &str) -> Result<Vec<u8>> {
        let store = OssStore::for_region(region, bucket, &self.credentials);
        store
            .get_object(key)
            .await?
            .ok_or_else(|| BridgeError::Storage(format!("object not found: {}/{}", bucket, key)))
    }
}

/// Structured outcome of one handled event
#[derive(Debug, Clone, Serialize)]
pub struct HandlerOutcome {
    pub action: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}

impl HandlerOutcome {
    fn new(action: &str, status: &str) -> Self {
        Self {
            action: action.to_string(),
            status: status.to_string(),
            reason: None,
            file_name: None,
            job_id: None,
            delete_success: None,
            file_size: None,
            metadata: None,
            error: None,
            event_name: None,
        }
    }

    fn skip(action: &str, file_name: &str, reason: &str) -> Self {
        let mut outcome = Self::new(action, "skipped");
        outcome.file_name = Some(file_name.to_string());
        outcome.reason = Some(reason.to_string());
        outcome
    }

    fn failed(action: &str, file_name: &str, error: &BridgeError) -> Self {
        let mut outcome = Self::new(action, "failed");
        outcome.file_name = Some(file_name.to_string());
        outcome.error = Some(error.to_string());
        outcome
    }

    fn unsupported(event_name: &str) -> Self {
        let mut outcome = Self::new("unsupported", "skipped");
        outcome.event_name = Some(event_name.to_string());
        outcome
    }
}

/// Derive index metadata from an object key's path segments
pub fn metadata_from_path(object_key: &str) -> HashMap<String, String> {
    let parts: Vec<&str> = object_key.split('/').collect();

    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), "wiki_sync".to_string());
    metadata.insert(
        "sync_timestamp".to_string(),
        Utc::now().timestamp().to_string(),
    );
    metadata.insert("full_path".to_string(), object_key.to_string());

    if parts.len() >= 2 {
        metadata.insert("space".to_string(), parts[1].to_string());
    }

    if let Some(file_name) = parts.last() {
        if let Some((stem, ext)) = file_name.rsplit_once('.') {
            metadata.insert("title".to_string(), stem.to_string());
            metadata.insert("file_type".to_string(), ext.to_string());
        } else {
            metadata.insert("title".to_string(), file_name.to_string());
        }
    }

    if parts.len() > 2 {
        metadata.insert(
            "directories".to_string(),
            parts[1..parts.len() - 1].join("/"),
        );
    }

    metadata
}

/// Dispatches classified events to the create/update/delete handlers
pub struct EventRouter {
    source: Arc<dyn ObjectSource>,
    index: Arc<dyn DocumentIndex>,
    prefix_filter: String,
}

impl EventRouter {
    pub fn new(
        source: Arc<dyn ObjectSource>,
        index: Arc<dyn DocumentIndex>,
        prefix_filter: &str,
    ) -> Self {
        Self {
            source,
            index,
            prefix_filter: prefix_filter.to_string(),
        }
    }

    /// Route one event to its handler; always produces an outcome
    pub async fn handle(&self, event: &StorageChangeEvent) -> HandlerOutcome {
        match classify_event(&event.event_name) {
            EventKind::Created => self.handle_create(event).await,
            EventKind::Modified => self.handle_update(event).await,
            EventKind::Removed => self.handle_delete(event).await,
            EventKind::Unsupported => {
                warn!("unsupported event type: {}", event.event_name);
                HandlerOutcome::unsupported(&event.event_name)
            }
        }
    }

    async fn handle_create(&self, event: &StorageChangeEvent) -> HandlerOutcome {
        info!("handling create event for {}", event.object_key);
        if let FileClassification::Skip(reason) =
            classify_object_key(&event.object_key, &self.prefix_filter)
        {
            return HandlerOutcome::skip("upload", &event.file_name, &reason);
        }

        match self.ingest(event, "create").await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("create handler failed for {}: {}", event.object_key, e);
                HandlerOutcome::failed("upload", &event.file_name, &e)
            }
        }
    }

    async fn handle_update(&self, event: &StorageChangeEvent) -> HandlerOutcome {
        info!("handling update event for {}", event.object_key);
        if let FileClassification::Skip(reason) =
            classify_object_key(&event.object_key, &self.prefix_filter)
        {
            return HandlerOutcome::skip("update", &event.file_name, &reason);
        }

        // Best-effort removal of the stale entry; a failure here must never
        // leave the document un-indexed.
        let delete_success = match self.index.delete_document(&event.file_name).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(
                    "stale index delete failed for {}, re-uploading anyway: {}",
                    event.file_name, e
                );
                false
            }
        };

        match self.ingest(event, "update").await {
            Ok(mut outcome) => {
                outcome.action = "update".to_string();
                outcome.delete_success = Some(delete_success);
                outcome
            }
            Err(e) => {
                error!("update handler failed for {}: {}", event.object_key, e);
                let mut outcome = HandlerOutcome::failed("update", &event.file_name, &e);
                outcome.delete_success = Some(delete_success);
                outcome
            }
        }
    }

    async fn handle_delete(&self, event: &StorageChangeEvent) -> HandlerOutcome {
        info!("handling delete event for {}", event.object_key);
        if let FileClassification::Skip(reason) =
            classify_object_key(&event.object_key, &self.prefix_filter)
        {
            return HandlerOutcome::skip("delete", &event.file_name, &reason);
        }

        match self.index.delete_document(&event.file_name).await {
            Ok(true) => {
                let mut outcome = HandlerOutcome::new("delete", "success");
                outcome.file_name = Some(event.file_name.clone());
                outcome
            }
            Ok(false) => {
                let mut outcome = HandlerOutcome::new("delete", "failed");
                outcome.file_name = Some(event.file_name.clone());
                outcome
            }
            Err(e) => {
                error!("delete handler failed for {}: {}", event.file_name, e);
                HandlerOutcome::failed("delete", &event.file_name, &e)
            }
        }
    }

    /// Shared download/size-check/metadata/submit sequence for create and
    /// update events
    async fn ingest(&self, event: &StorageChangeEvent, event_type: &str) -> Result<HandlerOutcome> {
        let content = self
            .source
            .download(&event.bucket_name, &event.object_key, &event.region)
            .await?;

        if content.len() as u64 > MAX_OBJECT_SIZE {
            return Err(BridgeError::Oversize {
                size: content.len() as u64,
                limit: MAX_OBJECT_SIZE,
            });
        }

        let mut metadata = metadata_from_path(&event.object_key);
        metadata.insert("event_type".to_string(), event_type.to_string());

        let job_id = self
            .index
            .upload_document(&event.file_name, &content, &metadata)
            .await?;

        let mut outcome = HandlerOutcome::new("upload", "success");
        outcome.file_name = Some(event.file_name.clone());
        outcome.job_id = Some(job_id);
        outcome.file_size = Some(content.len());
        outcome.metadata = Some(metadata);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_from_nested_path() {
        let metadata = metadata_from_path("wiki/Eng/guides/Setup.md");
        assert_eq!(metadata["space"], "Eng");
        assert_eq!(metadata["title"], "Setup");
        assert_eq!(metadata["file_type"], "md");
        assert_eq!(metadata["directories"], "Eng/guides");
        assert_eq!(metadata["full_path"], "wiki/Eng/guides/Setup.md");
    }

    #[test]
    fn test_metadata_from_shallow_path() {
        let metadata = metadata_from_path("wiki/Notes.md");
        assert_eq!(metadata["space"], "Notes.md");
        assert_eq!(metadata["title"], "Notes");
        assert!(!metadata.contains_key("directories"));
    }
}
