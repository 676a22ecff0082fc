//! Event-driven push job: object storage -> document index
//!
//! One invocation handles one storage-change notification and always returns
//! a structured response; skips and business failures are 200-class outcomes,
//! only parse/config/transport failures produce a 500.

pub mod filter;
pub mod notification;
pub mod router;

use std::sync::Arc;

use serde::Serialize;
use tracing::error;

use crate::config::IndexerConfig;
use crate::index::KnowledgeBase;

pub use filter::{classify_object_key, FileClassification};
pub use notification::{
    classify_event, decode_payload, parse_event, EventKind, StorageChangeEvent,
};
pub use router::{metadata_from_path, EventRouter, HandlerOutcome, ObjectSource, OssObjectSource};

/// Structured invocation response, serialized to stdout by the binary
#[derive(Debug, Serialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: ResponseBody,
}

#[derive(Debug, Serialize)]
pub struct ResponseBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_info: Option<StorageChangeEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<HandlerOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvocationResponse {
    pub fn handled(event: StorageChangeEvent, outcome: HandlerOutcome) -> Self {
        Self {
            status_code: 200,
            body: ResponseBody {
                success: true,
                message: "storage event handled".to_string(),
                event_name: Some(event.event_name.clone()),
                file_info: Some(event),
                result: Some(outcome),
                error: None,
            },
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            status_code: 500,
            body: ResponseBody {
                success: false,
                message: "storage event handling failed".to_string(),
                event_name: None,
                file_info: None,
                result: None,
                error: Some(message.to_string()),
            },
        }
    }
}

/// Handle one raw notification payload end to end.
///
/// The top-level catch-all: every failure path still produces a response
/// object rather than a propagated error.
pub async fn handle_notification(raw: &[u8], config: &IndexerConfig) -> InvocationResponse {
    let event = match decode_payload(raw).and_then(|payload| parse_event(&payload)) {
        Ok(event) => event,
        Err(e) => {
            error!("notification parse failed: {}", e);
            return InvocationResponse::failure(&e.to_string());
        }
    };

    let index = match KnowledgeBase::new(config.clone()) {
        Ok(kb) => Arc::new(kb),
        Err(e) => {
            error!("knowledge base client init failed: {}", e);
            return InvocationResponse::failure(&e.to_string());
        }
    };
    let source = Arc::new(OssObjectSource::new(config.credentials.clone()));
    let router = EventRouter::new(source, index, &config.prefix_filter);

    let outcome = router.handle(&event).await;
    InvocationResponse::handled(event, outcome)
}
