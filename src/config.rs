//! Environment-driven configuration
//!
//! Both jobs are stateless process activations configured entirely from
//! environment variables. Missing required variables are a fatal startup
//! error reported together, before any network call is made.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::retry::RetryPolicy;

/// Default wiki open-platform API base URL
pub const DEFAULT_API_BASE: &str = "https://open.feishu.cn/open-apis";

/// Cloud credentials for object storage, static keys or STS session
#[derive(Debug, Clone)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub access_key_secret: String,
    /// Present when running on short-lived STS credentials
    pub security_token: Option<String>,
}

impl StorageCredentials {
    pub fn from_env() -> Result<Self> {
        let mut missing = Vec::new();
        let access_key_id = env_or_track("ALIBABA_CLOUD_ACCESS_KEY_ID", &mut missing);
        let access_key_secret = env_or_track("ALIBABA_CLOUD_ACCESS_KEY_SECRET", &mut missing);
        fail_on_missing(&missing)?;

        Ok(Self {
            access_key_id,
            access_key_secret,
            security_token: env_opt("ALIBABA_CLOUD_SECURITY_TOKEN"),
        })
    }
}

/// Configuration for the scheduled pull job (wiki -> object storage)
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub app_id: String,
    pub app_secret: String,
    /// Wiki space display name, resolved to an id at run start
    pub space_name: Option<String>,
    /// Wiki space id; takes precedence over `space_name`
    pub space_id: Option<String>,
    pub api_base: String,
    pub oss_endpoint: String,
    pub oss_bucket: String,
    pub oss_prefix: String,
    pub credentials: StorageCredentials,
    pub retry: RetryPolicy,
    pub workers: usize,
    pub staging_dir: PathBuf,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        let mut missing = Vec::new();
        let app_id = env_or_track("WIKI_APP_ID", &mut missing);
        let app_secret = env_or_track("WIKI_APP_SECRET", &mut missing);
        let oss_endpoint = env_or_track("OSS_ENDPOINT", &mut missing);
        let oss_bucket = env_or_track("OSS_BUCKET_NAME", &mut missing);
        fail_on_missing(&missing)?;

        let space_name = env_opt("WIKI_SPACE_NAME");
        let space_id = env_opt("WIKI_SPACE_ID");
        if space_name.is_none() && space_id.is_none() {
            return Err(BridgeError::Config(
                "either WIKI_SPACE_NAME or WIKI_SPACE_ID must be set".to_string(),
            ));
        }

        let staging_dir = env_opt("LOCAL_STAGING_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("wiki_docs"));

        Ok(Self {
            app_id,
            app_secret,
            space_name,
            space_id,
            api_base: env_opt("WIKI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            oss_endpoint,
            oss_bucket,
            oss_prefix: env_opt("OSS_PREFIX").unwrap_or_else(|| "wiki/".to_string()),
            credentials: StorageCredentials::from_env()?,
            retry: retry_policy_from_env()?,
            workers: env_parsed("SYNC_WORKERS", 2)?,
            staging_dir,
        })
    }
}

/// Configuration for the event-driven push job (object storage -> document index)
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub endpoint: String,
    pub instance_id: String,
    pub region_id: String,
    pub collection: String,
    pub namespace: String,
    pub namespace_password: String,
    /// Only object keys under this prefix are indexed
    pub prefix_filter: String,
    pub credentials: StorageCredentials,
}

impl IndexerConfig {
    pub fn from_env() -> Result<Self> {
        let mut missing = Vec::new();
        let endpoint = env_or_track("KB_ENDPOINT", &mut missing);
        let instance_id = env_or_track("KB_INSTANCE_ID", &mut missing);
        let namespace_password = env_or_track("KB_NAMESPACE_PASSWORD", &mut missing);
        fail_on_missing(&missing)?;

        Ok(Self {
            endpoint,
            instance_id,
            region_id: env_opt("KB_REGION_ID").unwrap_or_else(|| "cn-hangzhou".to_string()),
            collection: env_opt("KB_COLLECTION").unwrap_or_else(|| "document".to_string()),
            namespace: env_opt("KB_NAMESPACE").unwrap_or_else(|| "public".to_string()),
            namespace_password,
            prefix_filter: env_opt("OSS_PREFIX_FILTER").unwrap_or_else(|| "wiki/".to_string()),
            credentials: StorageCredentials::from_env()?,
        })
    }
}

fn retry_policy_from_env() -> Result<RetryPolicy> {
    let max_retries = env_parsed("MAX_RETRIES", 3u32)?;
    let base_secs = env_parsed("RETRY_DELAY_BASE", 1.0f64)?;
    Ok(RetryPolicy {
        max_retries,
        base_delay: Duration::from_secs_f64(base_secs),
    })
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_or_track(name: &'static str, missing: &mut Vec<&'static str>) -> String {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => v,
        _ => {
            missing.push(name);
            String::new()
        }
    }
}

fn fail_on_missing(missing: &[&'static str]) -> Result<()> {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(BridgeError::Config(format!(
            "missing required environment variables: {}",
            missing.join(", ")
        )))
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env_opt(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| BridgeError::Config(format!("invalid value for {}: {}", name, raw))),
        None => Ok(default),
    }
}
