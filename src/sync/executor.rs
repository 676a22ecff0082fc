//! Sync executor
//!
//! Runs the per-document sync procedure over a small bounded worker pool.
//! A document's failure is isolated to that document: the pool keeps
//! draining, the run reports aggregate counts.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use md5::{Digest, Md5};
use tracing::{error, info, warn};

use crate::error::{BridgeError, Result};
use crate::ledger::SyncLedger;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::storage::ObjectStore;
use crate::sync::classifier::needs_sync;
use crate::sync::path::{object_path, staging_path};
use crate::types::{StagedMeta, SyncRecord, WikiNode};
use crate::wiki::ContentSource;

/// Default worker-pool width, kept low to respect upstream rate limits
pub const DEFAULT_WORKERS: usize = 2;

/// Per-batch counts from one executor pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounts {
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Drives the per-document sync procedure for one run
pub struct SyncExecutor {
    source: Arc<dyn ContentSource>,
    store: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
    oss_prefix: String,
    space_label: String,
    staging_dir: PathBuf,
    workers: usize,
}

impl SyncExecutor {
    pub fn new(
        source: Arc<dyn ContentSource>,
        store: Arc<dyn ObjectStore>,
        retry: RetryPolicy,
        oss_prefix: &str,
        space_label: &str,
        staging_dir: PathBuf,
        workers: usize,
    ) -> Self {
        Self {
            source,
            store,
            retry,
            oss_prefix: oss_prefix.to_string(),
            space_label: space_label.to_string(),
            staging_dir,
            workers: workers.max(1),
        }
    }

    /// Classify the document nodes against the ledger and sync the ones that
    /// need it, bounded by the worker pool.
    pub async fn sync_documents(&self, ledger: &SyncLedger, nodes: &[WikiNode]) -> BatchCounts {
        let doc_nodes: Vec<&WikiNode> = nodes.iter().filter(|n| n.is_document()).collect();

        let mut to_sync = Vec::new();
        let mut skipped = 0usize;
        for node in doc_nodes {
            if needs_sync(node, ledger) {
                to_sync.push(node);
            } else {
                skipped += 1;
            }
        }

        info!(
            "documents to sync: {}, skipped: {}, workers: {}",
            to_sync.len(),
            skipped,
            self.workers
        );

        let results: Vec<bool> = stream::iter(to_sync)
            .map(|node| self.sync_single(ledger, node))
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let successful = results.iter().filter(|ok| **ok).count();
        BatchCounts {
            successful,
            failed: results.len() - successful,
            skipped,
        }
    }

    async fn sync_single(&self, ledger: &SyncLedger, node: &WikiNode) -> bool {
        match self.sync_document(ledger, node).await {
            Ok(()) => true,
            Err(e) => {
                error!("sync failed for '{}': {}", node.title, e);
                false
            }
        }
    }

    /// The per-document procedure: fetch, rename handling, stage, upload,
    /// ledger upsert. Any failure before the upsert leaves the ledger entry
    /// untouched.
    async fn sync_document(&self, ledger: &SyncLedger, node: &WikiNode) -> Result<()> {
        let content = retry_with_backoff(&self.retry, "content fetch", || {
            self.source.document_content(&node.obj_token, &node.obj_type)
        })
        .await?
        .ok_or_else(|| BridgeError::EmptyDocument(node.obj_token.clone()))?;

        let oss_path = object_path(&self.oss_prefix, &self.space_label, &node.title);

        if let Some(old) = ledger.get(&node.obj_token) {
            if old.title != node.title {
                info!("document renamed: {} -> {}", old.oss_path, oss_path);
                if let Err(e) = self.store.delete_object(&old.oss_path).await {
                    warn!("failed to delete old object {}: {}", old.oss_path, e);
                }
            }
        }

        let content_hash = hex::encode(Md5::digest(content.as_bytes()));
        let now = Utc::now().timestamp();

        let local_path = staging_path(&self.staging_dir, &self.space_label, &node.title);
        let meta = StagedMeta {
            node_token: node.node_token.clone(),
            obj_token: node.obj_token.clone(),
            obj_type: node.obj_type.clone(),
            title: node.title.clone(),
            space_id: node.space_id.clone(),
            obj_edit_time: node.obj_edit_time.clone(),
            sync_timestamp: now,
            content_hash: content_hash.clone(),
            local_path: local_path.display().to_string(),
            oss_path: oss_path.clone(),
        };
        self.stage(&local_path, &content, &meta).await?;

        retry_with_backoff(&self.retry, "storage upload", || async {
            self.store.put_object(&oss_path, content.as_bytes()).await
        })
        .await?;

        ledger.upsert(SyncRecord {
            obj_token: node.obj_token.clone(),
            title: node.title.clone(),
            oss_path: oss_path.clone(),
            content_hash,
            last_sync: now,
            obj_edit_time: node.obj_edit_time.clone(),
            obj_type: node.obj_type.clone(),
        });

        info!("document synced: {} -> {}", node.title, oss_path);
        Ok(())
    }

    /// Write the document and its `.meta.json` sidecar to local staging
    async fn stage(&self, local_path: &std::path::Path, content: &str, meta: &StagedMeta) -> Result<()> {
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, content).await?;

        let meta_path = local_path.with_extension("md.meta.json");
        tokio::fs::write(&meta_path, serde_json::to_vec_pretty(meta)?).await?;
        Ok(())
    }
}
