//! Wiki open-platform API client
//!
//! Speaks the Lark-style open API: tenant token exchange, paginated space and
//! node listings, markdown content export. Every response is wrapped in a
//! `{code, msg, data}` envelope; nonzero codes are platform errors, two of
//! which are rate limits.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::types::WikiNode;

/// Platform error codes that signal throttling
const RATE_LIMIT_CODES: [i64; 2] = [131001, 131007];

/// Page size for space and node listings
const PAGE_SIZE: u32 = 50;

const LIST_TIMEOUT: Duration = Duration::from_secs(10);
const CONTENT_TIMEOUT: Duration = Duration::from_secs(30);

/// One wiki space from the space listing
#[derive(Debug, Clone, Deserialize)]
pub struct WikiSpace {
    pub space_id: String,
    pub name: String,
}

/// Source of document content, seam for the sync executor
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Markdown export of one document; `None` when the platform returns an
    /// empty body for it
    async fn document_content(&self, obj_token: &str, obj_type: &str) -> Result<Option<String>>;
}

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Deserialize)]
struct PageData {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    page_token: Option<String>,
}

#[derive(Deserialize)]
struct ContentData {
    #[serde(default)]
    content: String,
}

/// Client for the wiki open API, one bearer token cached per invocation
pub struct WikiClient {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    retry: RetryPolicy,
    token: Mutex<Option<String>>,
}

impl WikiClient {
    pub fn new(base_url: &str, app_id: &str, app_secret: &str, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            app_secret: app_secret.to_string(),
            retry,
            token: Mutex::new(None),
        }
    }

    /// Exchange app credentials for a tenant access token, cached for the
    /// rest of the invocation.
    pub async fn tenant_access_token(&self) -> Result<String> {
        if let Some(token) = self.token.lock().clone() {
            return Ok(token);
        }

        let token = retry_with_backoff(&self.retry, "tenant token exchange", || {
            self.fetch_token()
        })
        .await?;

        *self.token.lock() = Some(token.clone());
        Ok(token)
    }

    async fn fetch_token(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct TokenResponse {
            code: i64,
            #[serde(default)]
            msg: String,
            #[serde(default)]
            tenant_access_token: String,
        }

        let url = format!("{}/auth/v3/tenant_access_token/internal", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(LIST_TIMEOUT)
            .json(&serde_json::json!({
                "app_id": self.app_id,
                "app_secret": self.app_secret,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(transport_error(status, response.text().await.unwrap_or_default()));
        }

        let body: TokenResponse = response.json().await?;
        if body.code != 0 {
            return Err(platform_error(body.code, &body.msg, "token exchange"));
        }

        info!("obtained tenant access token");
        Ok(body.tenant_access_token)
    }

    /// All wiki spaces visible to the app
    pub async fn list_spaces(&self) -> Result<Vec<WikiSpace>> {
        let url = format!("{}/wiki/v2/spaces", self.base_url);
        let mut spaces = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = retry_with_backoff(&self.retry, "space listing", || {
                self.fetch_page(&url, &[], page_token.as_deref())
            })
            .await?;

            for item in &page.items {
                match serde_json::from_value::<WikiSpace>(item.clone()) {
                    Ok(space) => spaces.push(space),
                    Err(e) => warn!("skipping undecodable space record: {}", e),
                }
            }

            if !page.has_more {
                break;
            }
            page_token = page.page_token;
        }

        info!("found {} wiki spaces", spaces.len());
        Ok(spaces)
    }

    /// Resolve a space display name to its id
    pub async fn resolve_space_id(&self, name: &str) -> Result<String> {
        let spaces = self.list_spaces().await?;
        if let Some(space) = spaces.iter().find(|s| s.name == name) {
            info!("resolved wiki space '{}' to {}", name, space.space_id);
            return Ok(space.space_id.clone());
        }

        let available: Vec<&str> = spaces.iter().map(|s| s.name.as_str()).collect();
        warn!("available wiki spaces: {:?}", available);
        Err(BridgeError::SpaceNotFound(name.to_string()))
    }

    /// Walk the complete node tree of a space.
    ///
    /// Explicit work queue of pending parent nodes rather than recursion; a
    /// failed child listing is logged and skipped so the rest of the tree
    /// still comes back. Only a failure at the root aborts the walk.
    pub async fn list_space_nodes(&self, space_id: &str) -> Result<Vec<WikiNode>> {
        let mut pending: VecDeque<Option<String>> = VecDeque::new();
        pending.push_back(None);

        let mut nodes = Vec::new();
        while let Some(parent) = pending.pop_front() {
            match self.list_children(space_id, parent.as_deref()).await {
                Ok(children) => {
                    for node in children {
                        if node.has_child {
                            pending.push_back(Some(node.node_token.clone()));
                        }
                        nodes.push(node);
                    }
                }
                Err(e) if parent.is_none() => return Err(e),
                Err(e) => warn!(
                    "failed to list children of node {}: {}",
                    parent.as_deref().unwrap_or("?"),
                    e
                ),
            }
        }

        info!("walked {} nodes in space {}", nodes.len(), space_id);
        Ok(nodes)
    }

    /// One level of children under `parent`, all pages
    async fn list_children(&self, space_id: &str, parent: Option<&str>) -> Result<Vec<WikiNode>> {
        let url = format!("{}/wiki/v2/spaces/{}/nodes", self.base_url, space_id);
        let mut extra: Vec<(&str, &str)> = Vec::new();
        if let Some(parent) = parent {
            extra.push(("parent_node_token", parent));
        }

        let mut nodes = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = retry_with_backoff(&self.retry, "node listing", || {
                self.fetch_page(&url, &extra, page_token.as_deref())
            })
            .await?;

            for item in &page.items {
                match serde_json::from_value::<WikiNode>(item.clone()) {
                    Ok(mut node) => {
                        node.space_id = space_id.to_string();
                        node.parent_node_token = parent.map(str::to_string);
                        nodes.push(node);
                    }
                    Err(e) => warn!("skipping undecodable node record: {}", e),
                }
            }

            if !page.has_more {
                break;
            }
            page_token = page.page_token;
        }

        debug!(
            "listed {} nodes under {}",
            nodes.len(),
            parent.unwrap_or("root")
        );
        Ok(nodes)
    }

    async fn fetch_page(
        &self,
        url: &str,
        extra: &[(&str, &str)],
        page_token: Option<&str>,
    ) -> Result<PageData> {
        let token = self.tenant_access_token().await?;

        let mut query: Vec<(&str, String)> = vec![("page_size", PAGE_SIZE.to_string())];
        if let Some(page_token) = page_token {
            query.push(("page_token", page_token.to_string()));
        }
        for &(k, v) in extra {
            query.push((k, v.to_string()));
        }

        let response = self
            .client
            .get(url)
            .bearer_auth(&token)
            .timeout(LIST_TIMEOUT)
            .query(&query)
            .send()
            .await?;

        decode_envelope(response, "listing").await
    }
}

#[async_trait]
impl ContentSource for WikiClient {
    async fn document_content(&self, obj_token: &str, obj_type: &str) -> Result<Option<String>> {
        let url = format!("{}/docs/v1/content", self.base_url);
        let token = self.tenant_access_token().await?;

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .timeout(CONTENT_TIMEOUT)
            .query(&[
                ("doc_token", obj_token),
                ("doc_type", obj_type),
                ("content_type", "markdown"),
                ("lang", "zh"),
            ])
            .send()
            .await?;

        let data: ContentData = decode_envelope(response, "content export").await?;
        if data.content.is_empty() {
            warn!("document has empty content: {}", obj_token);
            return Ok(None);
        }

        debug!(
            "fetched document content: {} ({} chars)",
            obj_token,
            data.content.len()
        );
        Ok(Some(data.content))
    }
}

/// Unwrap the platform `{code, msg, data}` envelope, translating nonzero
/// codes and transport failures into the error taxonomy.
async fn decode_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        #[derive(Deserialize)]
        struct ErrEnvelope {
            code: i64,
            #[serde(default)]
            msg: String,
        }
        if let Ok(envelope) = serde_json::from_str::<ErrEnvelope>(&body) {
            return Err(platform_error(envelope.code, &envelope.msg, what));
        }
        return Err(transport_error(status, body));
    }

    let envelope: ApiEnvelope<T> = response.json().await?;
    if envelope.code != 0 {
        return Err(platform_error(envelope.code, &envelope.msg, what));
    }
    envelope.data.ok_or_else(|| BridgeError::WikiApi {
        code: 0,
        message: format!("{}: response carried no data", what),
    })
}

fn platform_error(code: i64, msg: &str, what: &str) -> BridgeError {
    if RATE_LIMIT_CODES.contains(&code) {
        BridgeError::RateLimited(format!("{} throttled ({}): {}", what, code, msg))
    } else {
        BridgeError::WikiApi {
            code,
            message: format!("{}: {}", what, msg),
        }
    }
}

fn transport_error(status: reqwest::StatusCode, body: String) -> BridgeError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        BridgeError::RateLimited(format!("HTTP {}", status))
    } else {
        BridgeError::Transport(format!("HTTP {}: {}", status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_codes_map_to_rate_limited() {
        assert!(platform_error(131001, "busy", "listing").is_rate_limit());
        assert!(platform_error(131007, "busy", "listing").is_rate_limit());
        assert!(!platform_error(230002, "no permission", "listing").is_rate_limit());
    }

    #[test]
    fn test_http_429_maps_to_rate_limited() {
        let e = transport_error(reqwest::StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(e.is_rate_limit());

        let e = transport_error(reqwest::StatusCode::BAD_GATEWAY, String::new());
        assert!(!e.is_rate_limit());
        assert!(e.is_retryable());
    }

    #[test]
    fn test_platform_error_is_not_retryable() {
        let e = platform_error(230002, "no permission", "listing");
        assert!(!e.is_retryable());
    }
}
