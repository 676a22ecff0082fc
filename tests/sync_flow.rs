//! End-to-end sync flow over in-memory fakes
//!
//! Exercises the classifier, executor, reconciler, and ledger together the
//! way one scheduled run composes them.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use wikibridge::error::{BridgeError, Result};
use wikibridge::ledger::{ledger_key, SyncLedger};
use wikibridge::retry::RetryPolicy;
use wikibridge::storage::ObjectStore;
use wikibridge::sync::{reconcile_deletions, SyncExecutor};
use wikibridge::types::{SyncRecord, WikiNode};
use wikibridge::wiki::ContentSource;

#[derive(Default)]
struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    fail_deletes: bool,
}

impl MemoryStore {
    fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Default::default()
        }
    }

    fn has(&self, key: &str) -> bool {
        self.objects.lock().contains_key(key)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.lock().get(key).cloned())
    }

    async fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes {
            return Err(BridgeError::Storage("delete refused".to_string()));
        }
        self.objects.lock().remove(key);
        Ok(())
    }
}

struct FixedSource {
    contents: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl FixedSource {
    fn new(contents: &[(&str, &str)]) -> Self {
        Self {
            contents: contents
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ContentSource for FixedSource {
    async fn document_content(&self, obj_token: &str, _obj_type: &str) -> Result<Option<String>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.contents.get(obj_token).cloned())
    }
}

fn node(token: &str, title: &str, edit_time: &str) -> WikiNode {
    WikiNode {
        node_token: format!("n-{}", token),
        obj_token: token.to_string(),
        obj_type: "docx".to_string(),
        title: title.to_string(),
        space_id: "space-1".to_string(),
        obj_edit_time: edit_time.to_string(),
        parent_node_token: None,
        has_child: false,
        node_create_time: None,
        obj_create_time: None,
    }
}

fn executor(
    source: Arc<FixedSource>,
    store: Arc<MemoryStore>,
    staging: &std::path::Path,
) -> SyncExecutor {
    let retry = RetryPolicy {
        max_retries: 0,
        base_delay: Duration::from_millis(1),
    };
    SyncExecutor::new(source, store, retry, "wiki/", "Eng", staging.to_path_buf(), 2)
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let staging = tempfile::tempdir().unwrap();
    let source = Arc::new(FixedSource::new(&[("a", "# Alpha"), ("b", "# Beta")]));
    let store = Arc::new(MemoryStore::default());
    let ledger = SyncLedger::new();
    let nodes = vec![node("a", "Alpha", "100"), node("b", "Beta", "200")];

    let exec = executor(Arc::clone(&source), Arc::clone(&store), staging.path());

    let first = exec.sync_documents(&ledger, &nodes).await;
    assert_eq!(first.successful, 2);
    assert_eq!(first.skipped, 0);
    assert!(store.has("wiki/Eng/Alpha.md"));
    assert!(store.has("wiki/Eng/Beta.md"));

    let puts_after_first = store.puts.load(Ordering::SeqCst);
    let fetches_after_first = source.fetches.load(Ordering::SeqCst);

    let second = exec.sync_documents(&ledger, &nodes).await;
    assert_eq!(second.successful, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(store.puts.load(Ordering::SeqCst), puts_after_first);
    // The skip happens before any content fetch.
    assert_eq!(source.fetches.load(Ordering::SeqCst), fetches_after_first);
}

#[tokio::test]
async fn test_rename_deletes_old_path_and_records_new_one() {
    let staging = tempfile::tempdir().unwrap();
    let source = Arc::new(FixedSource::new(&[("a", "# Alpha")]));
    let store = Arc::new(MemoryStore::default());
    let ledger = SyncLedger::new();

    let exec = executor(Arc::clone(&source), Arc::clone(&store), staging.path());

    let counts = exec
        .sync_documents(&ledger, &[node("a", "Alpha", "100")])
        .await;
    assert_eq!(counts.successful, 1);
    assert!(store.has("wiki/Eng/Alpha.md"));

    let counts = exec
        .sync_documents(&ledger, &[node("a", "Alpha Renamed", "101")])
        .await;
    assert_eq!(counts.successful, 1);
    assert!(!store.has("wiki/Eng/Alpha.md"));
    assert!(store.has("wiki/Eng/Alpha Renamed.md"));

    let record = ledger.get("a").unwrap();
    assert_eq!(record.oss_path, "wiki/Eng/Alpha Renamed.md");
    assert_eq!(record.title, "Alpha Renamed");
}

#[tokio::test]
async fn test_missing_content_fails_only_that_document() {
    let staging = tempfile::tempdir().unwrap();
    let source = Arc::new(FixedSource::new(&[("a", "# Alpha")]));
    let store = Arc::new(MemoryStore::default());
    let ledger = SyncLedger::new();

    let exec = executor(Arc::clone(&source), Arc::clone(&store), staging.path());

    let counts = exec
        .sync_documents(&ledger, &[node("a", "Alpha", "100"), node("gone", "Gone", "100")])
        .await;
    assert_eq!(counts.successful, 1);
    assert_eq!(counts.failed, 1);
    assert!(ledger.get("a").is_some());
    assert!(ledger.get("gone").is_none());
}

#[tokio::test]
async fn test_non_document_nodes_are_not_synced() {
    let staging = tempfile::tempdir().unwrap();
    let source = Arc::new(FixedSource::new(&[("f", "unused")]));
    let store = Arc::new(MemoryStore::default());
    let ledger = SyncLedger::new();

    let mut folder = node("f", "Folder", "100");
    folder.obj_type = "folder".to_string();
    folder.has_child = true;

    let exec = executor(Arc::clone(&source), Arc::clone(&store), staging.path());
    let counts = exec.sync_documents(&ledger, &[folder]).await;

    assert_eq!(counts.successful, 0);
    assert_eq!(counts.skipped, 0);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reconciler_removes_stale_entries() {
    let store = Arc::new(MemoryStore::default());
    store
        .put_object("wiki/Eng/Old.md", b"# Old")
        .await
        .unwrap();

    let ledger = SyncLedger::new();
    ledger.upsert(SyncRecord {
        obj_token: "old".to_string(),
        title: "Old".to_string(),
        oss_path: "wiki/Eng/Old.md".to_string(),
        content_hash: "00".to_string(),
        last_sync: 1,
        obj_edit_time: "1".to_string(),
        obj_type: "docx".to_string(),
    });

    let live: HashSet<String> = ["kept".to_string()].into();
    let deleted = reconcile_deletions(store.as_ref(), &ledger, &live).await;

    assert_eq!(deleted, 1);
    assert!(!store.has("wiki/Eng/Old.md"));
    assert!(ledger.get("old").is_none());
}

#[tokio::test]
async fn test_reconciler_removes_ledger_entry_even_when_delete_fails() {
    let store = Arc::new(MemoryStore::failing_deletes());
    let ledger = SyncLedger::new();
    ledger.upsert(SyncRecord {
        obj_token: "old".to_string(),
        title: "Old".to_string(),
        oss_path: "wiki/Eng/Old.md".to_string(),
        content_hash: "00".to_string(),
        last_sync: 1,
        obj_edit_time: "1".to_string(),
        obj_type: "docx".to_string(),
    });

    let live = HashSet::new();
    let deleted = reconcile_deletions(store.as_ref(), &ledger, &live).await;

    assert_eq!(deleted, 1);
    assert_eq!(store.deletes.load(Ordering::SeqCst), 1);
    assert!(ledger.get("old").is_none());
}

#[tokio::test]
async fn test_ledger_round_trips_through_storage() {
    let store = MemoryStore::default();
    let key = ledger_key("wiki/");

    let ledger = SyncLedger::new();
    ledger.upsert(SyncRecord {
        obj_token: "a".to_string(),
        title: "Alpha".to_string(),
        oss_path: "wiki/Eng/Alpha.md".to_string(),
        content_hash: "9e107d9d372bb6826bd81d3542a419d6".to_string(),
        last_sync: 1_700_000_000,
        obj_edit_time: "1699999999".to_string(),
        obj_type: "docx".to_string(),
    });

    ledger.persist(&store, &key).await.unwrap();
    assert!(store.has("wiki/sync_records.json"));

    let reloaded = SyncLedger::load(&store, &key).await.unwrap();
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.get("a").unwrap(), ledger.get("a").unwrap());
}
