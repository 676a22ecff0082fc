//! Core types for wikibridge

use serde::{Deserialize, Serialize};

/// Node type that carries fetchable document content
pub const DOCUMENT_TYPE: &str = "docx";

/// One node discovered during a wiki tree walk.
///
/// Decoded directly from the platform's node listing; unknown fields are
/// ignored, records missing required fields fail individually at the boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct WikiNode {
    pub node_token: String,
    pub obj_token: String,
    pub obj_type: String,
    pub title: String,
    /// Not part of the listing payload; filled in by the walker.
    #[serde(default)]
    pub space_id: String,
    #[serde(default)]
    pub obj_edit_time: String,
    #[serde(skip)]
    pub parent_node_token: Option<String>,
    #[serde(default)]
    pub has_child: bool,
    #[serde(default)]
    pub node_create_time: Option<String>,
    #[serde(default)]
    pub obj_create_time: Option<String>,
}

impl WikiNode {
    /// Whether this node is a syncable document (as opposed to a sheet,
    /// mindnote, or bare folder node).
    pub fn is_document(&self) -> bool {
        self.obj_type == DOCUMENT_TYPE
    }
}

/// Last-known sync state of one document, persisted in the ledger.
///
/// Field names are the ledger's on-disk JSON format; do not rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub obj_token: String,
    pub title: String,
    pub oss_path: String,
    /// Hex MD5 of the synced markdown, kept for integrity/audit.
    pub content_hash: String,
    /// Unix seconds of the last successful sync.
    pub last_sync: i64,
    #[serde(default)]
    pub obj_edit_time: String,
    #[serde(default = "default_obj_type")]
    pub obj_type: String,
}

fn default_obj_type() -> String {
    DOCUMENT_TYPE.to_string()
}

/// Sidecar metadata written next to every staged document.
#[derive(Debug, Clone, Serialize)]
pub struct StagedMeta {
    pub node_token: String,
    pub obj_token: String,
    pub obj_type: String,
    pub title: String,
    pub space_id: String,
    pub obj_edit_time: String,
    pub sync_timestamp: i64,
    pub content_hash: String,
    pub local_path: String,
    pub oss_path: String,
}

/// Aggregate outcome of one scheduled sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_name: Option<String>,
    pub total_nodes: usize,
    pub doc_nodes: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub oss_prefix: String,
    pub sync_records_count: usize,
    /// Content fetches avoided by the edit-time check; equals `skipped`.
    pub api_calls_saved: usize,
}

impl SyncReport {
    /// Report for a run that aborted before any document work.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            code: -1,
            message: message.into(),
            space_id: None,
            space_name: None,
            total_nodes: 0,
            doc_nodes: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            deleted: 0,
            oss_prefix: String::new(),
            sync_records_count: 0,
            api_calls_saved: 0,
        }
    }
}
