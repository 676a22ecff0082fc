//! Change classification
//!
//! Decides from ledger state alone whether a document needs a content fetch.
//! This runs before any fetch; the fetch is the expensive, rate-limited call
//! the whole sync pipeline exists to minimize.

use tracing::{debug, info};

use crate::ledger::SyncLedger;
use crate::types::WikiNode;

/// Whether `node` must be re-synced: new to the ledger, retitled, or edited
/// since the last sync.
pub fn needs_sync(node: &WikiNode, ledger: &SyncLedger) -> bool {
    let Some(record) = ledger.get(&node.obj_token) else {
        info!("new document needs sync: {}", node.title);
        return true;
    };

    if record.title != node.title {
        info!("document title changed: {} -> {}", record.title, node.title);
        return true;
    }

    if record.obj_edit_time != node.obj_edit_time {
        info!(
            "document edit time changed: {} -> {} ({})",
            record.obj_edit_time, node.obj_edit_time, node.title
        );
        return true;
    }

    debug!("document unchanged, skipping: {}", node.title);
    false
}
