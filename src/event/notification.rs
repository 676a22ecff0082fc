//! Storage-change notification parsing
//!
//! The hosting platform delivers one notification per invocation, sometimes
//! base64-wrapped. Parsing pulls out the first event record; a payload with
//! no event records is a fatal parse error for the invocation.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{BridgeError, Result};

/// One storage-change event, normalized for routing
#[derive(Debug, Clone, Serialize)]
pub struct StorageChangeEvent {
    pub bucket_name: String,
    /// URL-decoded object key
    pub object_key: String,
    /// Final path segment of the key
    pub file_name: String,
    pub event_name: String,
    /// Region id with the provider's `oss-` prefix stripped
    pub region: String,
}

/// Event category derived from the event name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Modified,
    Removed,
    Unsupported,
}

/// Decoded notification body; opaque outside this module
#[derive(Deserialize)]
pub struct NotificationPayload {
    #[serde(default)]
    events: Vec<EventRecord>,
}

#[derive(Deserialize)]
struct EventRecord {
    #[serde(rename = "eventName", default)]
    event_name: String,
    #[serde(default)]
    region: Option<String>,
    oss: Option<OssSection>,
}

#[derive(Deserialize)]
struct OssSection {
    bucket: Option<NamedEntity>,
    object: Option<KeyedEntity>,
}

#[derive(Deserialize)]
struct NamedEntity {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct KeyedEntity {
    #[serde(default)]
    key: String,
}

/// Decode a raw payload that may be plain JSON or base64-wrapped JSON
pub fn decode_payload(raw: &[u8]) -> Result<NotificationPayload> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| BridgeError::Notification("payload is not UTF-8".to_string()))?;
    let text = text.trim();

    if let Ok(decoded) = BASE64.decode(text) {
        if let Ok(payload) = serde_json::from_slice::<NotificationPayload>(&decoded) {
            return Ok(payload);
        }
    }

    serde_json::from_str::<NotificationPayload>(text)
        .map_err(|e| BridgeError::Notification(format!("payload is not notification JSON: {}", e)))
}

/// Extract the first event record from a decoded payload
pub fn parse_event(payload: &NotificationPayload) -> Result<StorageChangeEvent> {
    let record = payload
        .events
        .first()
        .ok_or_else(|| BridgeError::Notification("no events in payload".to_string()))?;

    let oss = record
        .oss
        .as_ref()
        .ok_or_else(|| BridgeError::Notification("event carries no oss section".to_string()))?;

    let bucket_name = oss
        .bucket
        .as_ref()
        .map(|b| b.name.clone())
        .unwrap_or_default();
    let raw_key = oss.object.as_ref().map(|o| o.key.as_str()).unwrap_or("");
    let object_key = urlencoding::decode(raw_key)
        .map_err(|e| BridgeError::Notification(format!("object key is not URL-encoded UTF-8: {}", e)))?
        .into_owned();

    let region = record
        .region
        .clone()
        .unwrap_or_else(|| "oss-cn-hangzhou".to_string());
    let region = region.strip_prefix("oss-").unwrap_or(&region).to_string();

    let file_name = object_key.rsplit('/').next().unwrap_or("").to_string();

    let event = StorageChangeEvent {
        bucket_name,
        object_key,
        file_name,
        event_name: record.event_name.clone(),
        region,
    };

    info!(
        "storage event: {} {}/{} (region {})",
        event.event_name, event.bucket_name, event.object_key, event.region
    );
    Ok(event)
}

/// Classify an event name by its well-known substrings
pub fn classify_event(event_name: &str) -> EventKind {
    if event_name.contains("ObjectCreated") {
        EventKind::Created
    } else if event_name.contains("ObjectModified") || event_name.contains("ObjectOverwrote") {
        EventKind::Modified
    } else if event_name.contains("ObjectRemoved") {
        EventKind::Removed
    } else {
        EventKind::Unsupported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "events": [{
            "eventName": "ObjectCreated:PutObject",
            "region": "oss-cn-hangzhou",
            "oss": {
                "bucket": {"name": "docs-bucket"},
                "object": {"key": "wiki/Eng/Design%20Notes.md"}
            }
        }]
    }"#;

    #[test]
    fn test_parse_plain_json_payload() {
        let payload = decode_payload(PAYLOAD.as_bytes()).unwrap();
        let event = parse_event(&payload).unwrap();
        assert_eq!(event.bucket_name, "docs-bucket");
        assert_eq!(event.object_key, "wiki/Eng/Design Notes.md");
        assert_eq!(event.file_name, "Design Notes.md");
        assert_eq!(event.region, "cn-hangzhou");
    }

    #[test]
    fn test_parse_base64_wrapped_payload() {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;
        let wrapped = STANDARD.encode(PAYLOAD);
        let payload = decode_payload(wrapped.as_bytes()).unwrap();
        let event = parse_event(&payload).unwrap();
        assert_eq!(event.event_name, "ObjectCreated:PutObject");
    }

    #[test]
    fn test_empty_events_is_parse_error() {
        let payload = decode_payload(br#"{"events": []}"#).unwrap();
        assert!(parse_event(&payload).is_err());
    }

    #[test]
    fn test_garbage_payload_is_parse_error() {
        assert!(decode_payload(b"not json at all").is_err());
    }

    #[test]
    fn test_classify_by_substring() {
        assert_eq!(classify_event("ObjectCreated:PutObject"), EventKind::Created);
        assert_eq!(classify_event("ObjectCreated:PostObject"), EventKind::Created);
        assert_eq!(
            classify_event("ObjectModified:AppendObject"),
            EventKind::Modified
        );
        assert_eq!(
            classify_event("ObjectOverwrote:PutObject"),
            EventKind::Modified
        );
        assert_eq!(
            classify_event("ObjectRemoved:DeleteObject"),
            EventKind::Removed
        );
        assert_eq!(classify_event("BucketCreated"), EventKind::Unsupported);
    }
}
