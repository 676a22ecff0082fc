//! Scheduled pull job: wiki -> object storage
//!
//! One run: resolve the space, walk the node tree, classify against the
//! ledger, sync what changed over a bounded pool, reconcile deletions, and
//! persist the ledger. Per-document failures surface only in the counts.

pub mod classifier;
pub mod executor;
pub mod path;
pub mod reconciler;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::ledger::{ledger_key, SyncLedger};
use crate::retry::retry_with_backoff;
use crate::storage::{ObjectStore, OssStore};
use crate::types::SyncReport;
use crate::wiki::WikiClient;

pub use classifier::needs_sync;
pub use executor::{BatchCounts, SyncExecutor, DEFAULT_WORKERS};
pub use reconciler::reconcile_deletions;

/// Run one complete sync of the configured wiki space.
///
/// Local staging is cleaned up whether the run succeeds or not.
pub async fn run_sync(config: &SyncConfig) -> Result<SyncReport> {
    let result = run_sync_inner(config).await;
    cleanup_staging(config).await;
    result
}

async fn run_sync_inner(config: &SyncConfig) -> Result<SyncReport> {
    let wiki = WikiClient::new(
        &config.api_base,
        &config.app_id,
        &config.app_secret,
        config.retry,
    );
    let store: Arc<dyn ObjectStore> = Arc::new(OssStore::connect(
        &config.oss_endpoint,
        &config.oss_bucket,
        &config.credentials,
    ));

    // Preflight: token exchange and space listing both exercise the scopes
    // the rest of the run depends on.
    wiki.tenant_access_token().await?;

    let space_id = match &config.space_id {
        Some(id) => {
            info!("using configured space id: {}", id);
            id.clone()
        }
        None => {
            let name = config.space_name.as_deref().unwrap_or_default();
            wiki.resolve_space_id(name).await?
        }
    };

    let nodes = wiki.list_space_nodes(&space_id).await?;
    if nodes.is_empty() {
        warn!("no nodes found in space {}", space_id);
        let mut report = SyncReport::aborted("no document nodes found");
        report.code = 1;
        report.space_id = Some(space_id);
        report.space_name = config.space_name.clone();
        report.oss_prefix = config.oss_prefix.clone();
        return Ok(report);
    }

    let key = ledger_key(&config.oss_prefix);
    let ledger = SyncLedger::load(store.as_ref(), &key).await?;

    // Live-set snapshot before the pool starts; the reconciler must not see
    // a token vanish mid-run.
    let live_tokens: HashSet<String> = nodes
        .iter()
        .filter(|n| n.is_document())
        .map(|n| n.obj_token.clone())
        .collect();
    let doc_nodes = live_tokens.len();

    let space_label = config
        .space_name
        .clone()
        .unwrap_or_else(|| space_id.clone());
    let executor = SyncExecutor::new(
        Arc::new(wiki),
        Arc::clone(&store),
        config.retry,
        &config.oss_prefix,
        &space_label,
        config.staging_dir.clone(),
        config.workers,
    );

    let counts = executor.sync_documents(&ledger, &nodes).await;
    let deleted = reconcile_deletions(store.as_ref(), &ledger, &live_tokens).await;

    retry_with_backoff(&config.retry, "ledger persist", || {
        ledger.persist(store.as_ref(), &key)
    })
    .await?;

    info!(
        "sync complete - successful: {}, failed: {}, skipped: {}, deleted: {}",
        counts.successful, counts.failed, counts.skipped, deleted
    );

    Ok(SyncReport {
        code: 0,
        message: "sync complete".to_string(),
        space_id: Some(space_id),
        space_name: config.space_name.clone(),
        total_nodes: nodes.len(),
        doc_nodes,
        successful: counts.successful,
        failed: counts.failed,
        skipped: counts.skipped,
        deleted,
        oss_prefix: config.oss_prefix.clone(),
        sync_records_count: ledger.len(),
        api_calls_saved: counts.skipped,
    })
}

async fn cleanup_staging(config: &SyncConfig) {
    if let Err(e) = tokio::fs::remove_dir_all(&config.staging_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(
                "failed to clean staging dir {}: {}",
                config.staging_dir.display(),
                e
            );
        }
    }
}
