//! Sync ledger: the sole cross-run state
//!
//! A JSON object keyed by document token, stored in the same bucket the
//! documents are mirrored into. Loaded once at run start, mutated in memory
//! during the run, persisted once at run end.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::Result;
use crate::storage::ObjectStore;
use crate::types::SyncRecord;

/// File name of the persisted ledger inside the storage prefix.
///
/// Also in the event filter's ignore set: the push job must never index the
/// ledger itself.
pub const LEDGER_FILE_NAME: &str = "sync_records.json";

/// Storage key of the ledger under the given prefix
pub fn ledger_key(prefix: &str) -> String {
    format!("{}{}", prefix, LEDGER_FILE_NAME)
}

/// In-memory view of the persisted sync state, keyed by document token.
///
/// Interior mutability lets pool workers upsert disjoint keys concurrently.
pub struct SyncLedger {
    records: Mutex<HashMap<String, SyncRecord>>,
}

impl SyncLedger {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_records(records: HashMap<String, SyncRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Load the ledger from object storage.
    ///
    /// A missing ledger object is a normal first-run condition and yields an
    /// empty ledger. A record that fails to decode is dropped with a warning;
    /// the rest of the ledger still loads.
    pub async fn load(store: &dyn ObjectStore, key: &str) -> Result<Self> {
        let Some(data) = store.get_object(key).await? else {
            info!("no ledger found at {}, starting with an empty one", key);
            return Ok(Self::new());
        };

        let raw: HashMap<String, serde_json::Value> = serde_json::from_slice(&data)?;
        let mut records = HashMap::with_capacity(raw.len());
        for (token, value) in raw {
            match serde_json::from_value::<SyncRecord>(value) {
                Ok(record) => {
                    records.insert(token, record);
                }
                Err(e) => warn!("dropping malformed ledger record {}: {}", token, e),
            }
        }

        info!("loaded {} sync records from {}", records.len(), key);
        Ok(Self::from_records(records))
    }

    /// Serialize and write the ledger back to object storage.
    pub async fn persist(&self, store: &dyn ObjectStore, key: &str) -> Result<()> {
        let data = {
            let records = self.records.lock();
            serde_json::to_vec_pretty(&*records)?
        };
        store.put_object(key, &data).await?;
        info!("persisted {} sync records to {}", self.len(), key);
        Ok(())
    }

    pub fn get(&self, obj_token: &str) -> Option<SyncRecord> {
        self.records.lock().get(obj_token).cloned()
    }

    pub fn upsert(&self, record: SyncRecord) {
        self.records.lock().insert(record.obj_token.clone(), record);
    }

    pub fn remove(&self, obj_token: &str) -> Option<SyncRecord> {
        self.records.lock().remove(obj_token)
    }

    /// Snapshot of all document tokens currently in the ledger
    pub fn tokens(&self) -> Vec<String> {
        self.records.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Default for SyncLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(token: &str, title: &str) -> SyncRecord {
        SyncRecord {
            obj_token: token.to_string(),
            title: title.to_string(),
            oss_path: format!("wiki/Eng/{}.md", title),
            content_hash: "00".to_string(),
            last_sync: 1,
            obj_edit_time: "1".to_string(),
            obj_type: "docx".to_string(),
        }
    }

    #[test]
    fn test_upsert_get_remove() {
        let ledger = SyncLedger::new();
        assert!(ledger.is_empty());

        ledger.upsert(record("a", "Alpha"));
        ledger.upsert(record("b", "Beta"));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get("a").unwrap().title, "Alpha");

        ledger.upsert(record("a", "Alpha v2"));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get("a").unwrap().title, "Alpha v2");

        assert!(ledger.remove("a").is_some());
        assert!(ledger.get("a").is_none());
        assert!(ledger.remove("a").is_none());
    }

    #[test]
    fn test_malformed_record_is_dropped_not_fatal() {
        let json = r#"{
            "good": {"obj_token":"good","title":"G","oss_path":"wiki/S/G.md",
                     "content_hash":"00","last_sync":1,"obj_edit_time":"1","obj_type":"docx"},
            "bad": {"title":"missing required fields"}
        }"#;

        let raw: HashMap<String, serde_json::Value> = serde_json::from_str(json).unwrap();
        let mut records = HashMap::new();
        for (token, value) in raw {
            if let Ok(r) = serde_json::from_value::<SyncRecord>(value) {
                records.insert(token, r);
            }
        }
        let ledger = SyncLedger::from_records(records);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.get("good").is_some());
        assert!(ledger.get("bad").is_none());
    }

    #[test]
    fn test_ledger_key() {
        assert_eq!(ledger_key("wiki/"), "wiki/sync_records.json");
    }
}
