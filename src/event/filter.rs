//! In-scope filtering for storage objects
//!
//! Every rejection is a normal, logged no-op with a human-readable reason,
//! never an error: housekeeping files, out-of-prefix keys, directory markers,
//! and unsupported extensions all flow through the same skip path.

use tracing::info;

use crate::ledger::LEDGER_FILE_NAME;

/// File names never indexed, ledger included
const IGNORED_FILES: [&str; 5] = [
    LEDGER_FILE_NAME,
    ".DS_Store",
    "Thumbs.db",
    ".gitkeep",
    ".gitignore",
];

const IGNORED_PREFIXES: [&str; 4] = [".", "~", "_tmp_", "temp_"];
const IGNORED_SUFFIXES: [&str; 4] = [".tmp", ".bak", ".swp", "~"];

/// Extensions the document index can chunk
const SUPPORTED_EXTENSIONS: [&str; 29] = [
    "md", "txt", "pdf", "docx", "doc", "html", "htm", "json", "csv", "py", "java", "cpp", "c",
    "h", "js", "ts", "jsx", "tsx", "go", "rs", "rb", "php", "xml", "yaml", "yml", "toml", "sh",
    "bash", "sql",
];

/// Outcome of the in-scope decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileClassification {
    Process,
    Skip(String),
}

impl FileClassification {
    pub fn should_process(&self) -> bool {
        matches!(self, FileClassification::Process)
    }

    pub fn reason(&self) -> &str {
        match self {
            FileClassification::Process => "file is in scope",
            FileClassification::Skip(reason) => reason,
        }
    }
}

fn ignored_name_reason(file_name: &str) -> Option<String> {
    if IGNORED_FILES.contains(&file_name) {
        return Some(format!("file name is in the ignore list: {}", file_name));
    }
    for prefix in IGNORED_PREFIXES {
        if file_name.starts_with(prefix) {
            return Some(format!("file name starts with ignored prefix: {}", prefix));
        }
    }
    for suffix in IGNORED_SUFFIXES {
        if file_name.ends_with(suffix) {
            return Some(format!("file name ends with ignored suffix: {}", suffix));
        }
    }
    None
}

/// Decide whether an object key is in scope for indexing
pub fn classify_object_key(object_key: &str, prefix_filter: &str) -> FileClassification {
    let file_name = object_key.rsplit('/').next().unwrap_or("");

    if let Some(reason) = ignored_name_reason(file_name) {
        info!("skipping {}: {}", object_key, reason);
        return FileClassification::Skip(reason);
    }

    if !object_key.starts_with(prefix_filter) {
        let reason = format!("object key is outside prefix filter: {}", prefix_filter);
        info!("skipping {}: {}", object_key, reason);
        return FileClassification::Skip(reason);
    }

    if object_key.ends_with('/') {
        let reason = "object is a directory marker, not a file".to_string();
        info!("skipping {}: {}", object_key, reason);
        return FileClassification::Skip(reason);
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(stem, ext)| (stem, ext.to_lowercase()));
    match extension {
        None | Some(("", _)) => {
            let reason = "file has no extension".to_string();
            info!("skipping {}: {}", object_key, reason);
            FileClassification::Skip(reason)
        }
        Some((_, ext)) if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => {
            let reason = format!("unsupported file type: .{}", ext);
            info!("skipping {}: {}", object_key, reason);
            FileClassification::Skip(reason)
        }
        Some(_) => FileClassification::Process,
    }
}
