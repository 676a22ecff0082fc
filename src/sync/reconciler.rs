//! Deletion reconciliation
//!
//! Ledger entries with no corresponding live document are cleaned up after
//! the executor pool drains. The storage delete is best-effort: the ledger
//! entry is removed either way, otherwise stale entries would accumulate
//! across runs.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::ledger::SyncLedger;
use crate::storage::ObjectStore;

/// Remove ledger entries (and their storage objects) for documents absent
/// from the live set. Returns the number of entries removed.
pub async fn reconcile_deletions(
    store: &dyn ObjectStore,
    ledger: &SyncLedger,
    live_tokens: &HashSet<String>,
) -> usize {
    let stale: Vec<String> = ledger
        .tokens()
        .into_iter()
        .filter(|token| !live_tokens.contains(token))
        .collect();

    let mut deleted = 0usize;
    for token in stale {
        let Some(record) = ledger.get(&token) else {
            continue;
        };

        if let Err(e) = store.delete_object(&record.oss_path).await {
            warn!(
                "failed to delete storage object {} for removed document '{}': {}",
                record.oss_path, record.title, e
            );
        }

        ledger.remove(&token);
        deleted += 1;
        info!("removed deleted document: {} ({})", record.title, record.oss_path);
    }

    if deleted > 0 {
        info!("reconciled {} deleted documents", deleted);
    }
    deleted
}
